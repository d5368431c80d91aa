//! `mailharvest` — deduplicated, resumable mail ingestion.
//!
//! This crate provides the core library for querying a mailbox, routing
//! messages into folders by subject keyword, saving attachments and body
//! text, and recording processed ids so a rerun never repeats work.

pub mod config;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod model;
pub mod pipeline;
pub mod query;
pub mod route;
pub mod service;
