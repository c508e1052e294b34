//! # mathz-intake: Problem Intake for MATHZ
//!
//! Composes the deterministic core (`mathz-core`) with the generation layer
//! (`mathz-llm`) into one pipeline, and ships the `mathz` command-line tool.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │               mathz (CLI)                 │
//! │  ┌─────────────────────────────────────┐  │
//! │  │          IntakePipeline             │  │
//! │  │  ┌──────────────┐ ┌──────────────┐  │  │
//! │  │  │  mathz-core  │ │  mathz-llm   │  │  │
//! │  │  │ classifier   │ │ orchestrator │  │  │
//! │  │  │ collections  │ │ prompts      │  │  │
//! │  │  │ sqlite store │ │ validator    │  │  │
//! │  │  └──────────────┘ └──────────────┘  │  │
//! │  └─────────────────────────────────────┘  │
//! └───────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: `AppConfig`, one TOML file for every crate
//! - `pipeline`: classify → explain → persist
//! - `telemetry`: tracing subscriber setup
//! - `error`: `IntakeError`

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod pipeline;
pub mod telemetry;

pub use config::AppConfig;
pub use error::IntakeError;
pub use pipeline::{IntakePipeline, Submission};
