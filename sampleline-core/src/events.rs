//! Event types broadcast by the engine.

use serde::{Deserialize, Serialize};

use crate::{engine::producer::ProducerSnapshot, render::RenderSnapshot};

/// Emitted whenever the engine changes state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Created, `start()` not yet called.
    Idle,
    /// Producer and output stream active.
    Running,
    /// Running, but the output is silent and the producer is held.
    Paused,
    /// Stopped; may be restarted.
    Stopped,
    /// Failed to start or lost the output device.
    Error,
}

/// Combined counters from both sides of the ring, for periodic logging.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    pub render: RenderSnapshot,
    pub producer: ProducerSnapshot,
    /// Samples buffered in the ring when the report was taken.
    pub buffered: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_event_serializes_with_lowercase_status() {
        let event = EngineStatusEvent {
            status: EngineStatus::Running,
            detail: Some("device: default".into()),
        };

        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "running");
        assert_eq!(json["detail"], "device: default");

        let round_trip: EngineStatusEvent =
            serde_json::from_value(json).expect("deserialize status event");
        assert_eq!(round_trip.status, EngineStatus::Running);
    }

    #[test]
    fn status_rejects_other_casing() {
        assert!(serde_json::from_str::<EngineStatus>(r#""Running""#).is_err());
    }

    #[test]
    fn report_uses_camel_case_fields() {
        let report = DiagnosticsReport {
            render: RenderSnapshot {
                underrun_samples: 5,
                ..Default::default()
            },
            producer: ProducerSnapshot::default(),
            buffered: 12,
        };
        let json = serde_json::to_value(report).expect("serialize report");
        assert_eq!(json["render"]["underrunSamples"], 5);
        assert_eq!(json["buffered"], 12);
    }
}
