use crate::bookings::{BookingBoard, BookingSource, BookingUpdate};
use crate::chat::{ChatMessage, MessageLog, StreamAggregator, Transcript, TurnOutcome, TurnStatus};
use crate::gate::{BusyGate, GateState};
use crate::identity::ConversationId;
use crate::llm::{ChatService, ChatStream, StreamEvent};
use crate::refresh::RefreshCoordinator;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::sync::mpsc::error::TryRecvError;

/// What happened to a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A stream was opened for it
    Accepted,
    /// A turn is already in flight; the text was dropped
    Busy,
    /// Nothing but whitespace
    Blank,
}

/// The stream currently being folded into the log
struct ActiveTurn {
    aggregator: StreamAggregator,
    events: ChatStream,
}

/// One operator's console session.
///
/// All state is owned here and mutated only by the task driving the session,
/// one event at a time. The UI loop calls [`Session::pump`] between frames;
/// headless callers await [`Session::await_turn`] and
/// [`Session::await_refreshes`] instead.
pub struct Session {
    conversation: ConversationId,
    log: MessageLog,
    gate: BusyGate,
    chat: Arc<dyn ChatService>,
    turn: Option<ActiveTurn>,
    refresh: RefreshCoordinator,
    updates: mpsc::UnboundedReceiver<BookingUpdate>,
    updates_received: usize,
    board: BookingBoard,
}

impl Session {
    /// Start a session. Issues the first booking fetch, so this must run
    /// inside a tokio runtime.
    pub fn new(
        chat: Arc<dyn ChatService>,
        bookings: Arc<dyn BookingSource>,
        welcome: impl Into<String>,
    ) -> Self {
        let conversation = ConversationId::generate();
        let mut gate = BusyGate::new();
        let (refresh, updates) = RefreshCoordinator::attach(&mut gate, bookings);
        tracing::info!(%conversation, "session started");

        Self {
            conversation,
            log: MessageLog::seeded(ChatMessage::assistant(welcome)),
            gate,
            chat,
            turn: None,
            refresh,
            updates,
            updates_received: 0,
            board: BookingBoard::new(),
        }
    }

    /// Send `text` to the assistant, unless a turn is already in flight
    pub fn submit(&mut self, text: &str) -> SubmitOutcome {
        if self.gate.is_working() {
            tracing::debug!("submission dropped: a turn is in flight");
            return SubmitOutcome::Busy;
        }
        if text.trim().is_empty() {
            return SubmitOutcome::Blank;
        }

        self.gate.acquire();
        self.log.append(ChatMessage::user(text));
        let events = self.chat.open_stream(&self.conversation, text);
        self.turn = Some(ActiveTurn {
            aggregator: StreamAggregator::new(),
            events,
        });
        SubmitOutcome::Accepted
    }

    /// Apply every stream event and booking update that is already waiting.
    /// Returns true if anything was applied.
    pub fn pump(&mut self) -> bool {
        let streamed = self.drain_turn();
        let refreshed = self.drain_updates();
        streamed || refreshed
    }

    /// Wait for the active turn to end. Returns `None` when no turn is in flight.
    pub async fn await_turn(&mut self) -> Option<TurnOutcome> {
        let turn = self.turn.as_mut()?;
        let outcome = turn.aggregator.consume(&mut turn.events, &mut self.log).await;
        self.finish_turn(outcome.clone());
        Some(outcome)
    }

    /// Wait until every booking fetch issued so far has been applied
    pub async fn await_refreshes(&mut self) {
        while self.updates_received < self.refresh.issued() {
            match self.updates.recv().await {
                Some(update) => self.apply_update(update),
                None => break,
            }
        }
    }

    pub fn conversation(&self) -> &ConversationId {
        &self.conversation
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn is_working(&self) -> bool {
        self.gate.is_working()
    }

    pub fn transcript(&self) -> Transcript {
        self.log.snapshot()
    }

    /// Observe transcript changes
    pub fn subscribe_transcript(&self) -> watch::Receiver<Transcript> {
        self.log.subscribe()
    }

    pub fn board(&self) -> &BookingBoard {
        &self.board
    }

    /// Number of booking fetches issued since the session started
    pub fn fetches_issued(&self) -> usize {
        self.refresh.issued()
    }

    fn drain_turn(&mut self) -> bool {
        let Some(turn) = self.turn.as_mut() else {
            return false;
        };

        let mut progressed = false;
        let outcome = loop {
            let event = match turn.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => break None,
                Err(TryRecvError::Disconnected) => StreamEvent::disconnected(),
            };
            progressed = true;
            if let Some(outcome) = turn.aggregator.apply(event, &mut self.log) {
                break Some(outcome);
            }
        };

        if let Some(outcome) = outcome {
            self.finish_turn(outcome);
        }
        progressed
    }

    fn drain_updates(&mut self) -> bool {
        let mut applied = false;
        while let Ok(update) = self.updates.try_recv() {
            self.apply_update(update);
            applied = true;
        }
        applied
    }

    fn finish_turn(&mut self, outcome: TurnOutcome) {
        self.turn = None;
        match &outcome.status {
            TurnStatus::Completed => tracing::info!(
                chunks = outcome.chunks,
                characters = outcome.characters,
                reply = outcome.reply_created,
                "assistant turn completed"
            ),
            TurnStatus::Failed(reason) => tracing::warn!(
                chunks = outcome.chunks,
                characters = outcome.characters,
                reply = outcome.reply_created,
                reason = %reason,
                "assistant turn failed"
            ),
        }
        // releasing notifies the refresh coordinator
        self.gate.release();
    }

    fn apply_update(&mut self, update: BookingUpdate) {
        self.updates_received += 1;
        let generation = update.generation;
        let rows = update.records.len();
        if self.board.apply(update) {
            tracing::debug!(generation, rows, "booking board refreshed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookings::BookingRecord;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Hands out streams whose sending side the test keeps
    #[derive(Default)]
    struct ManualChat {
        senders: Mutex<Vec<mpsc::Sender<StreamEvent>>>,
    }

    impl ManualChat {
        fn sender(&self, index: usize) -> mpsc::Sender<StreamEvent> {
            self.senders.lock().unwrap()[index].clone()
        }

        fn opened(&self) -> usize {
            self.senders.lock().unwrap().len()
        }
    }

    impl ChatService for ManualChat {
        fn open_stream(&self, _conversation: &ConversationId, _message: &str) -> ChatStream {
            let (tx, rx) = mpsc::channel(16);
            self.senders.lock().unwrap().push(tx);
            rx
        }
    }

    struct NoBookings;

    #[async_trait]
    impl BookingSource for NoBookings {
        async fn fetch_bookings(&self) -> Result<Vec<Option<BookingRecord>>> {
            Ok(Vec::new())
        }
    }

    fn session(chat: Arc<ManualChat>) -> Session {
        Session::new(chat, Arc::new(NoBookings), "Welcome")
    }

    #[tokio::test]
    async fn pump_folds_whatever_has_arrived() {
        let chat = Arc::new(ManualChat::default());
        let mut session = session(Arc::clone(&chat));

        assert_eq!(session.submit("Hi"), SubmitOutcome::Accepted);
        let tx = chat.sender(0);
        tx.send(StreamEvent::Chunk("Hel".into())).await.unwrap();

        assert!(session.pump());
        assert!(session.is_working());
        assert_eq!(session.transcript().last(), Some(&ChatMessage::assistant("Hel")));

        tx.send(StreamEvent::Chunk("lo!".into())).await.unwrap();
        tx.send(StreamEvent::Completed).await.unwrap();
        session.pump();

        assert_eq!(session.gate_state(), GateState::Idle);
        assert_eq!(session.transcript().last(), Some(&ChatMessage::assistant("Hello!")));
    }

    #[tokio::test]
    async fn pump_releases_the_gate_when_the_stream_vanishes() {
        let chat = Arc::new(ManualChat::default());
        let mut session = session(Arc::clone(&chat));

        session.submit("Hi");
        chat.senders.lock().unwrap().clear();

        assert!(session.pump());
        assert!(!session.is_working());
        assert_eq!(session.transcript().len(), 2);
    }

    #[tokio::test]
    async fn blank_and_busy_submissions_change_nothing() {
        let chat = Arc::new(ManualChat::default());
        let mut session = session(Arc::clone(&chat));

        assert_eq!(session.submit("   "), SubmitOutcome::Blank);
        assert!(!session.is_working());

        session.submit("first");
        assert_eq!(session.submit("second"), SubmitOutcome::Busy);

        assert_eq!(chat.opened(), 1);
        assert_eq!(session.transcript().len(), 2);
    }

    #[tokio::test]
    async fn await_turn_without_a_turn_returns_none() {
        let mut session = session(Arc::new(ManualChat::default()));
        assert_eq!(session.await_turn().await, None);
    }

    #[tokio::test]
    async fn conversation_id_is_stable_across_turns() {
        let chat = Arc::new(ManualChat::default());
        let mut session = session(Arc::clone(&chat));
        let id = session.conversation().clone();

        session.submit("one");
        chat.sender(0).send(StreamEvent::Completed).await.unwrap();
        session.await_turn().await;
        session.submit("two");

        assert_eq!(session.conversation(), &id);
    }
}
