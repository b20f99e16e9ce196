//! # facereg Registry
//!
//! The request-level operations of the face registry: register, recognize,
//! edit, delete and lookup, built on [`facereg_storage::RecordStore`] and
//! [`facereg_core::Matcher`]. Embedding extraction is delegated to a
//! [`facereg_core::FaceEmbedder`]; [`RemoteEmbedder`] calls an HTTP model
//! service.

pub mod image;
pub mod remote;
pub mod service;

pub use remote::RemoteEmbedder;
pub use service::{
    DeleteRequest, EditRequest, RecognizeRequest, Recognition, RegisterRequest, RegistryConfig,
    RegistryService,
};
