//! # facereg
//!
//! A small face identity registry. A face is registered together with
//! contact details under a key derived from the person's name; later, an
//! image is recognized by linear nearest-neighbor search over the stored
//! embeddings with a configurable distance threshold.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! facereg --data-dir ./data --http-port 8000 --embedder-url http://127.0.0.1:5005/represent
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use facereg::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let store = Arc::new(RecordStore::open("./data").unwrap());
//! let embedder = Arc::new(
//!     RemoteEmbedder::new("http://127.0.0.1:5005/represent", Duration::from_secs(30)).unwrap(),
//! );
//! let service = RegistryService::new(store, embedder, RegistryConfig::default());
//!
//! let profile = service.profile(Some("Ana_Gomez.png"));
//! ```
//!
//! ## Crate Structure
//!
//! - `facereg-core` - keys, profiles, embeddings, matcher, extraction seam
//! - `facereg-storage` - the record store and its transactional commits
//! - `facereg-registry` - request orchestration and the HTTP embedder
//! - `facereg-api` - REST routes

// Re-export core types
pub use facereg_core::{
    derive_key, normalize_key, Embedding, EmbeddingMap, Error, Extraction, FaceEmbedder,
    MatchOutcome, Matcher, Profile, ProfileMap, Result, DEFAULT_THRESHOLD,
};

// Re-export storage
pub use facereg_storage::RecordStore;

// Re-export registry
pub use facereg_registry::{
    DeleteRequest, EditRequest, RecognizeRequest, Recognition, RegisterRequest, RegistryConfig,
    RegistryService, RemoteEmbedder,
};

// Re-export API
pub use facereg_api::RestApi;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        derive_key, normalize_key, Embedding, Error, Extraction, FaceEmbedder, MatchOutcome,
        Matcher, Profile, RecordStore, Recognition, RegistryConfig, RegistryService,
        RemoteEmbedder, RestApi, Result,
    };
}
