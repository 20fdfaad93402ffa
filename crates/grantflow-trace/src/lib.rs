//! # grantflow-trace
//!
//! Sequenced, in-memory lifecycle trace for the grantflow coordinator.
//!
//! [`InMemoryTrace`] implements [`TraceSink`](grantflow_core::traits::TraceSink).
//! While a coordinator's logging toggle is on, every `Requested`,
//! `Coalesced`, `BatchSent`, `Resolved` and `Abandoned` event is appended
//! here with a sequence number. [`TraceLog`] is the exported, JSON-ready
//! snapshot.

pub mod event;
pub mod memory;

pub use event::{TraceEvent, TraceLog};
pub use memory::InMemoryTrace;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::thread;

    use grantflow_contracts::{
        batch::BatchId,
        capability::CapabilityKey,
        lifecycle::{LifecycleRecord, LifecycleStage},
    };
    use grantflow_core::traits::TraceSink;

    use crate::{InMemoryTrace, TraceLog};

    fn record(name: &str, stage: LifecycleStage) -> LifecycleRecord {
        LifecycleRecord::now(CapabilityKey::new(name), stage)
    }

    #[test]
    fn records_are_sequenced_in_arrival_order() {
        let trace = InMemoryTrace::new("coalescing");
        let batch = BatchId::new();

        trace.record(record("camera", LifecycleStage::Requested));
        trace.record(record("camera", LifecycleStage::BatchSent { batch }));
        trace.record(record("camera", LifecycleStage::Resolved { granted: true }));

        let log = trace.export_log();
        assert_eq!(log.session, "coalescing");
        let sequences: Vec<u64> = log.events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(log.events[1].record.stage, LifecycleStage::BatchSent { batch });
    }

    #[test]
    fn clones_share_one_buffer() {
        let trace = InMemoryTrace::new("shared");
        let handle = trace.clone();

        handle.record(record("camera", LifecycleStage::Requested));

        assert_eq!(trace.len(), 1);
        assert!(!trace.is_empty());
    }

    #[test]
    fn clear_keeps_sequence_running() {
        let trace = InMemoryTrace::new("clear");
        trace.record(record("camera", LifecycleStage::Requested));
        trace.clear();
        assert!(trace.is_empty());

        trace.record(record("camera", LifecycleStage::Coalesced));
        assert_eq!(trace.export_log().events[0].sequence, 1);
    }

    #[test]
    fn concurrent_writers_get_unique_sequences() {
        let trace = InMemoryTrace::new("threads");
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let trace = trace.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        trace.record(record(&format!("key-{i}"), LifecycleStage::Requested));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut sequences: Vec<u64> = trace.export_log().events.iter().map(|e| e.sequence).collect();
        sequences.sort_unstable();
        assert_eq!(sequences, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn events_for_filters_by_key() {
        let trace = InMemoryTrace::new("filter");
        trace.record(record("camera", LifecycleStage::Requested));
        trace.record(record("microphone", LifecycleStage::Requested));
        trace.record(record("camera", LifecycleStage::Abandoned));

        let log = trace.export_log();
        let camera = CapabilityKey::new("camera");
        let stages: Vec<_> = log.events_for(&camera).map(|e| e.record.stage.clone()).collect();
        assert_eq!(stages, vec![LifecycleStage::Requested, LifecycleStage::Abandoned]);
    }

    #[test]
    fn log_exports_as_json() {
        let trace = InMemoryTrace::new("json");
        trace.record(record("camera", LifecycleStage::Resolved { granted: false }));

        let json = trace.export_log().to_json().unwrap();
        assert!(json.contains("\"session\": \"json\""), "json was: {json}");
        assert!(json.contains("camera"));

        let parsed: TraceLog = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.events.len(), 1);
    }
}
