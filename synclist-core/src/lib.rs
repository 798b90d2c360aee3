//! SyncList core library: record store, checklist domain access, and configuration.
//!
//! The main entry point is [`service::ChecklistService`], which expresses
//! categories, checklists, and items over a [`store::RecordStore`].

pub mod config;
pub mod error;
pub mod service;
pub mod store;
pub mod types;
