//! # Pipeline runtime
//!
//! Orchestration for the streaming sentiment pipeline.
//!
//! ## Module Organization
//!
//! - `config` - Environment-driven runtime configuration
//! - `ingestion` - Source loop and the extract → score → match worker pool
//! - `engine` - Stage wiring, shutdown cascade, final report
//! - `stats` - Counters shared by every stage

pub mod config;
pub mod engine;
pub mod ingestion;
pub mod stats;

pub use config::{ConfigError, PipelineConfig, SourceKind};
pub use engine::{Pipeline, PipelineError, PipelineHandle, PipelineReport, ShutdownTrigger};
pub use ingestion::ArticleProcessor;
pub use stats::{PipelineStats, StatsSnapshot};
