//! examprep-core — Exam session engine, scoring, and analytics.
//!
//! This crate defines the data model, the collaborator traits, the timed
//! session state machine, and the pure scoring and analytics rules that the
//! rest of examprep builds on.

pub mod analytics;
pub mod category;
pub mod config;
pub mod error;
pub mod generation;
pub mod history;
pub mod model;
pub mod parser;
pub mod runner;
pub mod scoring;
pub mod session;
pub mod submission;
pub mod traits;
