//! Core data model types for mail messages and run reports.

pub mod message;
pub mod report;
