//! `safaa`: separate genuine copyright notices from false positives, and
//! strip genuine notices down to their meaningful entities.
//!
//! # Flow
//! 1. Resolve and load the model directory ([`config::AgentConfig`], [`agent::SafaaAgent::new`]).
//! 2. Mask holder entities and normalize the text ([`preprocess`]).
//! 3. Vectorize and label each item `t`/`f` ([`classifier`]).
//! 4. Reduce genuine notices to their entity spans ([`agent::SafaaAgent::declutter`]).
//!
//! Entity models and their training hooks live in [`ner`].

pub mod agent;
pub mod classifier;
pub mod config;
pub mod error;
pub mod models;
pub mod ner;
pub mod preprocess;
pub mod report;

pub use agent::{SafaaAgent, SaveOutcome};
pub use error::{Result, SafaaError};
pub use models::{Label, TextSource};
