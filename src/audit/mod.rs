//! Structured run events.
//!
//! This module provides functions for emitting structured harvest events
//! using the `tracing` crate under the `roster_harvest::audit` target.
//! Events can be captured by any tracing subscriber (JSON file, log
//! shipper, etc.) to keep a record of what each session did.

mod events;

pub use events::{
    emit_enrichment_completed, emit_harvest_report, emit_partition_finished, emit_session_aborted,
    emit_session_started, PartitionSummary,
};
