//! # facereg Core
//!
//! Core types for the facereg identity registry.
//!
//! - [`derive_key`] / [`normalize_key`] - identity keys from first and last name
//! - [`Profile`] - contact details stored per identity
//! - [`Embedding`] - a face embedding vector
//! - [`Matcher`] - linear nearest-neighbor search with an acceptance threshold
//! - [`FaceEmbedder`] - the extraction model seam
//!
//! ## Example
//!
//! ```rust
//! use facereg_core::{derive_key, Embedding, EmbeddingMap, Matcher, MatchOutcome};
//!
//! let mut embeddings = EmbeddingMap::new();
//! embeddings.insert(derive_key("Ana", "Gomez"), Embedding::new(vec![0.0, 1.0]));
//!
//! let outcome = Matcher::new(9.5)
//!     .find(&Embedding::new(vec![0.0, 1.0]), &embeddings)
//!     .unwrap();
//! assert!(matches!(outcome, MatchOutcome::Matched { .. }));
//! ```

pub mod embedder;
pub mod embedding;
pub mod error;
pub mod key;
pub mod matcher;
pub mod profile;

pub use embedder::{Extraction, FaceEmbedder};
pub use embedding::Embedding;
pub use error::{Error, Result};
pub use key::{derive_key, is_image_file, is_safe_file_name, normalize_key, IMAGE_EXTENSION};
pub use matcher::{EmbeddingMap, MatchOutcome, Matcher, DEFAULT_THRESHOLD};
pub use profile::Profile;

/// Key → profile, in insertion order.
pub type ProfileMap = indexmap::IndexMap<String, Profile>;
