/// Typed event stream for the serving layer
///
/// The pipeline's streaming variant produces a sequence of typed events a
/// transport can frame as Server-Sent Events. Every event carries a
/// monotonically increasing id; a bounded replay buffer lets a reconnecting
/// consumer resume from its last seen id. Cancellation closes the channel.

use crate::trades::types::{TradeSummary, TradeWire};
use crate::transactions::CancelFlag;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Events replayable after a reconnect
const REPLAY_BUFFER_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Connected,
    Progress {
        message: String,
        percentage: f64,
        step: String,
    },
    Trades {
        batch: Vec<TradeWire>,
    },
    Metadata {
        wallet: String,
        total_signatures: usize,
    },
    Complete {
        summary: TradeSummary,
    },
    Error {
        message: String,
        code: String,
    },
}

/// An event plus its stream-unique, monotonically increasing id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: u64,
    #[serde(flatten)]
    pub event: StreamEvent,
}

type ReplayBuffer = Arc<Mutex<VecDeque<EventEnvelope>>>;

/// Producer half held by the pipeline task
pub struct StreamProducer {
    tx: mpsc::UnboundedSender<EventEnvelope>,
    next_id: AtomicU64,
    replay: ReplayBuffer,
}

impl StreamProducer {
    /// Emit one event; ids are assigned here, in order. Returns false when
    /// the consumer is gone and the producer should wind down.
    pub fn emit(&self, event: StreamEvent) -> bool {
        let envelope = EventEnvelope {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            event,
        };

        {
            let mut replay = self.replay.lock();
            if replay.len() >= REPLAY_BUFFER_CAPACITY {
                replay.pop_front();
            }
            replay.push_back(envelope.clone());
        }

        self.tx.send(envelope).is_ok()
    }
}

/// Consumer half handed to the serving layer
pub struct StreamHandle {
    pub events: mpsc::UnboundedReceiver<EventEnvelope>,
    pub cancel: CancelFlag,
    replay: ReplayBuffer,
}

impl StreamHandle {
    /// Events emitted after `last_event_id`, for "last event id" resumption
    pub fn replay_since(&self, last_event_id: u64) -> Vec<EventEnvelope> {
        self.replay
            .lock()
            .iter()
            .filter(|e| e.id > last_event_id)
            .cloned()
            .collect()
    }
}

/// Build a connected producer/consumer pair sharing a replay buffer
pub fn event_channel(cancel: CancelFlag) -> (StreamProducer, StreamHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    let replay: ReplayBuffer = Arc::new(Mutex::new(VecDeque::new()));

    (
        StreamProducer {
            tx,
            next_id: AtomicU64::new(0),
            replay: replay.clone(),
        },
        StreamHandle {
            events: rx,
            cancel,
            replay,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let (producer, mut handle) = event_channel(CancelFlag::new());

        producer.emit(StreamEvent::Connected);
        producer.emit(StreamEvent::Progress {
            message: "working".to_string(),
            percentage: 50.0,
            step: "fetch".to_string(),
        });

        let first = handle.events.recv().await.unwrap();
        let second = handle.events.recv().await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn test_replay_since() {
        let (producer, handle) = event_channel(CancelFlag::new());

        for _ in 0..5 {
            producer.emit(StreamEvent::Connected);
        }

        let replayed = handle.replay_since(3);
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed[0].id, 4);
        assert_eq!(replayed[1].id, 5);
    }

    #[tokio::test]
    async fn test_emit_reports_closed_consumer() {
        let (producer, handle) = event_channel(CancelFlag::new());
        drop(handle);
        assert!(!producer.emit(StreamEvent::Connected));
    }

    #[test]
    fn test_event_serialization_shape() {
        let envelope = EventEnvelope {
            id: 7,
            event: StreamEvent::Progress {
                message: "batch 2/4".to_string(),
                percentage: 40.0,
                step: "transactions".to_string(),
            },
        };

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["type"], "progress");
        assert_eq!(json["percentage"], 40.0);
    }
}
