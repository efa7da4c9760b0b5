//! Refetches bookings whenever the busy gate returns to idle.
//!
//! The coordinator is registered as a gate observer, so a fetch is issued
//! synchronously inside the idle transition itself and never while a turn is
//! in flight. The fetch is polled once right there, so the source is called
//! before the gate can turn busy again; whatever is left to wait for runs on a
//! spawned task. The result comes back to the session as a [`BookingUpdate`].

use crate::bookings::{BookingRecord, BookingSource, BookingUpdate};
use crate::gate::BusyGate;
use anyhow::Result;
use futures::task::noop_waker_ref;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

struct Shared {
    source: Arc<dyn BookingSource>,
    updates: mpsc::UnboundedSender<BookingUpdate>,
    generation: AtomicU64,
    issued: AtomicUsize,
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    shared: Arc<Shared>,
}

impl RefreshCoordinator {
    /// Subscribe to `gate` and issue the first fetch if it is idle.
    ///
    /// Must be called inside a tokio runtime.
    pub fn attach(
        gate: &mut BusyGate,
        source: Arc<dyn BookingSource>,
    ) -> (Self, mpsc::UnboundedReceiver<BookingUpdate>) {
        let (updates, receiver) = mpsc::unbounded_channel();
        let coordinator = Self {
            shared: Arc::new(Shared {
                source,
                updates,
                generation: AtomicU64::new(0),
                issued: AtomicUsize::new(0),
            }),
        };

        let observer = coordinator.clone();
        gate.subscribe(move |state| {
            if state.is_idle() {
                observer.issue();
            }
        });

        if !gate.is_working() {
            coordinator.issue();
        }

        (coordinator, receiver)
    }

    /// Number of fetches issued so far
    pub fn issued(&self) -> usize {
        self.shared.issued.load(Ordering::SeqCst)
    }

    fn issue(&self) {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.issued.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(generation, "issuing booking fetch");

        let source = Arc::clone(&self.shared.source);
        let mut fetch = Box::pin(async move { source.fetch_bookings().await });

        // The first poll runs here, inside the idle transition, so the source
        // is reached before the next turn can make the gate busy again.
        let mut cx = Context::from_waker(noop_waker_ref());
        match fetch.as_mut().poll(&mut cx) {
            Poll::Ready(result) => self.shared.deliver(generation, result),
            Poll::Pending => {
                let shared = Arc::clone(&self.shared);
                tokio::spawn(async move {
                    let result = fetch.await;
                    shared.deliver(generation, result);
                });
            }
        }
    }
}

impl Shared {
    fn deliver(&self, generation: u64, result: Result<Vec<Option<BookingRecord>>>) {
        let records = match result {
            Ok(entries) => {
                let received = entries.len();
                let records: Vec<_> = entries.into_iter().flatten().collect();
                if records.len() < received {
                    tracing::debug!(
                        generation,
                        dropped = received - records.len(),
                        "dropped unusable booking entries"
                    );
                }
                records
            }
            Err(e) => {
                tracing::warn!(generation, error = %e, "booking fetch failed; showing no bookings this cycle");
                Vec::new()
            }
        };

        let _ = self.updates.send(BookingUpdate {
            generation,
            records,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;

    struct FixedSource(Vec<Option<BookingRecord>>);

    #[async_trait]
    impl BookingSource for FixedSource {
        async fn fetch_bookings(&self) -> Result<Vec<Option<BookingRecord>>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl BookingSource for BrokenSource {
        async fn fetch_bookings(&self) -> Result<Vec<Option<BookingRecord>>> {
            Err(anyhow!("connection refused"))
        }
    }

    fn record(number: &str) -> BookingRecord {
        serde_json::from_value(serde_json::json!({ "bookingNumber": number })).unwrap()
    }

    #[tokio::test]
    async fn fetches_once_on_attach_and_on_each_idle_transition() {
        let mut gate = BusyGate::new();
        let (coordinator, mut updates) =
            RefreshCoordinator::attach(&mut gate, Arc::new(FixedSource(vec![Some(record("1"))])));
        assert_eq!(coordinator.issued(), 1);

        gate.acquire();
        assert_eq!(coordinator.issued(), 1);
        gate.release();
        assert_eq!(coordinator.issued(), 2);

        let first = updates.recv().await.unwrap();
        let second = updates.recv().await.unwrap();
        let mut generations = [first.generation, second.generation];
        generations.sort();
        assert_eq!(generations, [1, 2]);
    }

    #[derive(Default)]
    struct CountingSource(AtomicUsize);

    #[async_trait]
    impl BookingSource for CountingSource {
        async fn fetch_bookings(&self) -> Result<Vec<Option<BookingRecord>>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn source_is_called_inside_the_idle_transition() {
        let mut gate = BusyGate::new();
        let source = Arc::new(CountingSource::default());
        let (_coordinator, mut updates) = RefreshCoordinator::attach(&mut gate, source.clone());
        assert_eq!(source.0.load(Ordering::SeqCst), 1);

        gate.acquire();
        gate.release();
        // no await between the release and this check
        assert_eq!(source.0.load(Ordering::SeqCst), 2);
        gate.acquire();
        assert_eq!(source.0.load(Ordering::SeqCst), 2);

        assert_eq!(updates.try_recv().unwrap().generation, 1);
        assert_eq!(updates.try_recv().unwrap().generation, 2);
    }

    #[tokio::test]
    async fn attaching_to_a_working_gate_waits_for_idle() {
        let mut gate = BusyGate::new();
        gate.acquire();

        let (coordinator, _updates) =
            RefreshCoordinator::attach(&mut gate, Arc::new(FixedSource(Vec::new())));

        assert_eq!(coordinator.issued(), 0);
        gate.release();
        assert_eq!(coordinator.issued(), 1);
    }

    #[tokio::test]
    async fn unusable_entries_are_filtered() {
        let mut gate = BusyGate::new();
        let source = FixedSource(vec![Some(record("1")), None, Some(record("3"))]);
        let (_coordinator, mut updates) = RefreshCoordinator::attach(&mut gate, Arc::new(source));

        let update = updates.recv().await.unwrap();
        let numbers: Vec<_> = update.records.iter().map(|r| r.booking_number.as_str()).collect();
        assert_eq!(numbers, ["1", "3"]);
    }

    #[tokio::test]
    async fn failed_fetch_yields_an_empty_list() {
        let mut gate = BusyGate::new();
        let (_coordinator, mut updates) = RefreshCoordinator::attach(&mut gate, Arc::new(BrokenSource));

        let update = updates.recv().await.unwrap();
        assert!(update.records.is_empty());
    }
}
