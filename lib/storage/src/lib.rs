//! # facereg Storage
//!
//! Durable storage for face records: one image file per identity key plus
//! two whole-file JSON mappings (`users.json` and `embeddings.json`) cached
//! in memory by [`RecordStore`].

pub mod store;
mod transaction;

pub use store::RecordStore;
