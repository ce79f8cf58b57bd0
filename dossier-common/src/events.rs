//! Event types for the Dossier event system
//!
//! Provides shared event definitions and EventBus for all Dossier modules.
//! Events are broadcast via EventBus and can be serialized for SSE
//! transmission; all events use this central enum for type safety and
//! exhaustive matching.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Dossier event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResearchEvent {
    /// Research run started
    ///
    /// Triggers:
    /// - SSE: Show run progress UI
    RunStarted {
        /// Research run UUID
        run_id: Uuid,
        /// Subject being researched (display name)
        subject: String,
        /// When run started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run entered a new phase
    ///
    /// Triggers:
    /// - SSE: Update phase indicator
    PhaseStarted {
        /// Research run UUID
        run_id: Uuid,
        /// Phase name ("identify", "enrich", "perspectives", "synthesize")
        phase: String,
        /// When phase started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Phase finished (all sub-tasks reached a terminal state)
    PhaseCompleted {
        /// Research run UUID
        run_id: Uuid,
        /// Phase name
        phase: String,
        /// Blocks completed without an error marker
        blocks_ok: usize,
        /// Blocks recorded with an error marker
        blocks_failed: usize,
        /// When phase completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A single report block completed
    BlockCompleted {
        /// Research run UUID
        run_id: Uuid,
        /// Phase the block belongs to
        phase: String,
        /// Block name (e.g., "profile", "news", "competitors", "swot")
        block: String,
        /// When block completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A single report block failed; the run continues
    BlockFailed {
        /// Research run UUID
        run_id: Uuid,
        /// Phase the block belongs to
        phase: String,
        /// Block name
        block: String,
        /// Error marker recorded in the block's slot
        error: String,
        /// When block failed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run completed (possibly degraded, with per-block error markers)
    ///
    /// Triggers:
    /// - SSE: Show completion notification
    RunCompleted {
        /// Research run UUID
        run_id: Uuid,
        /// Continuous quality signal (0.0-1.0)
        quality_score: f64,
        /// Run duration in seconds
        duration_seconds: u64,
        /// When run completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run failed: the subject could not be identified by any provider
    ///
    /// Triggers:
    /// - SSE: Show error notification
    RunFailed {
        /// Research run UUID
        run_id: Uuid,
        /// Error message details
        error: String,
        /// Per-provider failure reasons from the identification attempt
        attempts: Vec<String>,
        /// When run failed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run cancelled by the caller
    RunCancelled {
        /// Research run UUID
        run_id: Uuid,
        /// When run was cancelled
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ResearchEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            ResearchEvent::RunStarted { .. } => "RunStarted",
            ResearchEvent::PhaseStarted { .. } => "PhaseStarted",
            ResearchEvent::PhaseCompleted { .. } => "PhaseCompleted",
            ResearchEvent::BlockCompleted { .. } => "BlockCompleted",
            ResearchEvent::BlockFailed { .. } => "BlockFailed",
            ResearchEvent::RunCompleted { .. } => "RunCompleted",
            ResearchEvent::RunFailed { .. } => "RunFailed",
            ResearchEvent::RunCancelled { .. } => "RunCancelled",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ResearchEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Returns a receiver that will receive all events emitted after
    /// subscription. Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ResearchEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ResearchEvent,
    ) -> Result<usize, broadcast::error::SendError<ResearchEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Useful for progress events where it's acceptable if no component is
    /// currently listening.
    pub fn emit_lossy(&self, event: ResearchEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> ResearchEvent {
        ResearchEvent::RunStarted {
            run_id: Uuid::new_v4(),
            subject: "Acme Corp".to_string(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(10);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_eventbus_emit() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        bus.emit(sample_event()).expect("emit should succeed");

        let received = rx.try_recv().expect("Should receive event");
        assert_eq!(received.event_type(), "RunStarted");
    }

    #[test]
    fn test_eventbus_emit_lossy() {
        let bus = EventBus::new(2); // Small capacity
        let mut _rx = bus.subscribe(); // Subscribe but don't receive

        // Fill the channel past capacity; should not panic
        for _ in 0..10 {
            bus.emit_lossy(sample_event());
        }

        assert_eq!(bus.capacity(), 2);
    }

    #[test]
    fn test_eventbus_multiple_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(sample_event()).expect("emit should succeed");

        assert_eq!(rx1.try_recv().unwrap().event_type(), "RunStarted");
        assert_eq!(rx2.try_recv().unwrap().event_type(), "RunStarted");
    }

    #[test]
    fn test_event_serialization_tag() {
        let event = ResearchEvent::BlockFailed {
            run_id: Uuid::new_v4(),
            phase: "perspectives".to_string(),
            block: "swot".to_string(),
            error: "analysis output could not be parsed".to_string(),
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"BlockFailed\""));
        assert!(json.contains("\"block\":\"swot\""));

        let back: ResearchEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type(), "BlockFailed");
    }

    #[test]
    fn test_event_type_method() {
        let events = vec![
            (sample_event(), "RunStarted"),
            (
                ResearchEvent::RunCancelled {
                    run_id: Uuid::new_v4(),
                    timestamp: chrono::Utc::now(),
                },
                "RunCancelled",
            ),
            (
                ResearchEvent::RunCompleted {
                    run_id: Uuid::new_v4(),
                    quality_score: 0.8,
                    duration_seconds: 12,
                    timestamp: chrono::Utc::now(),
                },
                "RunCompleted",
            ),
        ];

        for (event, expected_type) in events {
            assert_eq!(event.event_type(), expected_type);
        }
    }
}
