use strum::Display;

/// Whether a turn is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum GateState {
    Idle,
    Working,
}

impl GateState {
    pub fn is_idle(self) -> bool {
        self == GateState::Idle
    }
}

type Observer = Box<dyn FnMut(GateState) + Send>;

/// Serializes turns: at most one stream may be open at a time.
///
/// Observers are called synchronously on every state change, in
/// registration order. Redundant transitions (idle to idle, working to
/// working) are refused and notify nobody.
pub struct BusyGate {
    state: GateState,
    observers: Vec<Observer>,
}

impl BusyGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Idle,
            observers: Vec::new(),
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_working(&self) -> bool {
        self.state == GateState::Working
    }

    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(GateState) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Idle to working. Returns false if a turn is already in flight.
    pub fn acquire(&mut self) -> bool {
        self.transition(GateState::Working)
    }

    /// Working to idle. Returns false if the gate was already idle.
    pub fn release(&mut self) -> bool {
        self.transition(GateState::Idle)
    }

    fn transition(&mut self, next: GateState) -> bool {
        if self.state == next {
            return false;
        }

        tracing::debug!(from = %self.state, to = %next, "busy gate transition");
        self.state = next;
        for observer in &mut self.observers {
            observer(next);
        }
        true
    }
}

impl Default for BusyGate {
    fn default() -> Self {
        Self::new()
    }
}
