//! Ingestion pipeline for the Solar Index Spain series.
//!
//! The [`orchestrator::Ingestor`] takes one period from raw values to a
//! persisted pair of rows, then fans out to the CSV exporter and the bulletin
//! draft collaborator. Data sources, exporters and draft sinks are traits so
//! each stage can be swapped in tests.

#![allow(async_fn_in_trait)]

pub mod activity;
pub mod drafts;
pub mod error;
pub mod export;
pub mod orchestrator;
pub mod redata;
pub mod retry;

pub use activity::ActivityLog;
pub use error::{DraftError, ExportError, FailureKind, FetchError, IngestError, Result};
pub use orchestrator::{BackfillSummary, IngestReport, Ingestor, StopSignal};
