//! Structured progress events.
//!
//! The executor reports what it does through an [`EventSink`] handed to it
//! explicitly. A sink is either disabled (events are dropped) or backed by an
//! unbounded channel whose receiver the caller drains, e.g. to print JSON
//! lines.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Executor phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Inventory,
    CreateTables,
    AddForeignKeys,
    DisableConstraints,
    LoadData,
    EnableConstraints,
}

/// Progress update emitted while a script is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MigrationEvent {
    PhaseStarted {
        phase: Phase,
    },
    TableCreated {
        table: String,
        without_foreign_keys: bool,
    },
    TableAlreadyPresent {
        table: String,
    },
    TableFailed {
        table: String,
        error: String,
    },
    ForeignKeyAdded {
        table: String,
        references: String,
    },
    ForeignKeyFailed {
        table: String,
        references: String,
        error: String,
    },
    TableLoaded {
        table: String,
        succeeded: usize,
        duplicates: usize,
        failed: usize,
        repaired: usize,
    },
    TableSkipped {
        table: String,
        statements: usize,
    },
    Warning {
        message: String,
    },
}

/// Where events go.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<MigrationEvent>>,
}

impl EventSink {
    /// A sink that drops every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// A sink feeding the returned receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MigrationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Send an event. A closed receiver is not an error.
    pub fn emit(&self, event: MigrationEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_sink_drops_events() {
        let sink = EventSink::disabled();
        assert!(!sink.is_enabled());
        sink.emit(MigrationEvent::Warning {
            message: "ignored".to_string(),
        });
    }

    #[test]
    fn test_channel_delivers_in_order() {
        let (sink, mut rx) = EventSink::channel();
        sink.emit(MigrationEvent::PhaseStarted {
            phase: Phase::Inventory,
        });
        sink.emit(MigrationEvent::TableAlreadyPresent {
            table: "users".to_string(),
        });

        assert_eq!(
            rx.try_recv().unwrap(),
            MigrationEvent::PhaseStarted {
                phase: Phase::Inventory
            }
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            MigrationEvent::TableAlreadyPresent { .. }
        ));
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(MigrationEvent::Warning {
            message: "nobody listening".to_string(),
        });
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_string(&MigrationEvent::TableLoaded {
            table: "orders".to_string(),
            succeeded: 10,
            duplicates: 1,
            failed: 0,
            repaired: 2,
        })
        .unwrap();
        assert!(json.starts_with(r#"{"event":"table_loaded","table":"orders""#));

        let json = serde_json::to_string(&MigrationEvent::PhaseStarted {
            phase: Phase::LoadData,
        })
        .unwrap();
        assert_eq!(json, r#"{"event":"phase_started","phase":"load_data"}"#);
    }
}
