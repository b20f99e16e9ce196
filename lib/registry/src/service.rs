//! Registry Service - orchestration of the face registry
//!
//! Validates requests, runs extraction, derives keys, and drives the record
//! store and the matcher.

use std::sync::Arc;

use facereg_core::{
    derive_key, normalize_key, Error, Extraction, FaceEmbedder, MatchOutcome, Matcher, Profile,
    Result, DEFAULT_THRESHOLD,
};
use facereg_storage::RecordStore;
use serde::Deserialize;
use tracing::{info, warn};

use crate::image::{decode_base64_image, decode_image};

/// Registry settings
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Distances strictly below this are accepted as a match.
    pub threshold: f32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(rename = "nombre")]
    pub first_name: Option<String>,
    #[serde(rename = "apellido")]
    pub last_name: Option<String>,
    /// Older clients send `apellidos`; used when `apellido` is blank.
    #[serde(rename = "apellidos")]
    pub last_names: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
    /// Base64 image, optionally as a data URL
    #[serde(rename = "imagen")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecognizeRequest {
    #[serde(rename = "imagen")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditRequest {
    #[serde(rename = "filename")]
    pub key: Option<String>,
    #[serde(rename = "nombre")]
    pub first_name: Option<String>,
    #[serde(rename = "apellido")]
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteRequest {
    #[serde(rename = "filename")]
    pub key: Option<String>,
}

/// Outcome of a recognition query.
#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    Recognized {
        key: String,
        profile: Profile,
        distance: f32,
    },
    /// `distance` is infinite when nothing is registered.
    Unrecognized { distance: f32 },
}

pub struct RegistryService {
    store: Arc<RecordStore>,
    embedder: Arc<dyn FaceEmbedder>,
    matcher: Matcher,
}

impl RegistryService {
    pub fn new(store: Arc<RecordStore>, embedder: Arc<dyn FaceEmbedder>, config: RegistryConfig) -> Self {
        Self {
            store,
            embedder,
            matcher: Matcher::new(config.threshold),
        }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Register a face with its contact details. Returns the stored key.
    ///
    /// Nothing is written unless a face is found.
    pub fn register(&self, request: RegisterRequest) -> Result<String> {
        let first_name = name_field(request.first_name, "nombre")?;
        let last_name = non_blank(request.last_name).or(request.last_names);
        let last_name = name_field(last_name, "apellido")?;
        let email = required(request.email, "email")?;
        let phone = required(request.phone, "telefono")?;
        let encoded = required(request.image, "imagen")?;

        let image_bytes = decode_base64_image(&encoded)?;
        let embedding = match self.extract(&image_bytes)? {
            Some(embedding) => embedding,
            None => return Err(Error::NoFaceDetected),
        };

        let key = derive_key(&first_name, &last_name);
        let profile = Profile::new(first_name, last_name, email, phone);
        self.store.put(&key, &image_bytes, embedding, profile)?;

        info!("Registered {}", key);
        Ok(key)
    }

    /// Identify the face in an image against every registered embedding.
    pub fn recognize(&self, request: RecognizeRequest) -> Result<Recognition> {
        let encoded = required(request.image, "imagen")?;
        let image_bytes = decode_base64_image(&encoded)?;
        let query = self.extract(&image_bytes)?.ok_or(Error::NoFaceDetected)?;

        let outcome = self
            .store
            .with_embeddings(|embeddings| self.matcher.find(&query, embeddings))?;

        match outcome {
            MatchOutcome::Matched { key, distance } => {
                let profile = self.store.get_profile(&key).map_err(|e| {
                    warn!("Embedding {} has no profile", key);
                    e
                })?;
                info!("Recognized {} ({}) at distance {}", profile.full_name(), key, distance);
                Ok(Recognition::Recognized {
                    key,
                    profile,
                    distance,
                })
            }
            MatchOutcome::NoMatch { distance } => {
                info!("No match, nearest distance {}", distance);
                Ok(Recognition::Unrecognized { distance })
            }
        }
    }

    /// Replace the profile of an existing record. Returns the key it is
    /// stored under afterwards, which changes with the name.
    pub fn edit(&self, request: EditRequest) -> Result<String> {
        let key = normalize_key(&required(request.key, "filename")?);
        let first_name = name_field(request.first_name, "nombre")?;
        let last_name = name_field(request.last_name, "apellido")?;
        let email = required(request.email, "email")?;
        let phone = required(request.phone, "telefono")?;

        if !self.store.contains(&key) {
            return Err(Error::NotFound(key));
        }

        let new_key = derive_key(&first_name, &last_name);
        let profile = Profile::new(first_name, last_name, email, phone);
        self.store.rename(&key, &new_key, profile)?;
        Ok(new_key)
    }

    /// Delete a record. Unknown keys are not an error.
    pub fn delete(&self, request: DeleteRequest) -> Result<String> {
        let key = normalize_key(&required(request.key, "filename")?);
        self.store.delete(&key)?;
        Ok(key)
    }

    pub fn profile(&self, raw_key: Option<&str>) -> Result<Profile> {
        let key = normalize_key(&required(raw_key.map(str::to_string), "filename")?);
        self.store.get_profile(&key)
    }

    pub fn list_images(&self) -> Result<Vec<String>> {
        self.store.list_images()
    }

    fn extract(&self, image_bytes: &[u8]) -> Result<Option<facereg_core::Embedding>> {
        let image = decode_image(image_bytes)?;
        match self.embedder.extract(&image) {
            Extraction::Detected(embedding) => Ok(Some(embedding)),
            Extraction::NotDetected => Ok(None),
            Extraction::Failed(cause) => Err(Error::Extraction(cause)),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    non_blank(value).ok_or_else(|| Error::Validation(format!("missing field: {}", field)))
}

/// A name becomes part of a file name, so it may not carry path separators.
fn name_field(value: Option<String>, field: &str) -> Result<String> {
    let name = required(value, field)?;
    if name.contains(['/', '\\', '\0']) {
        return Err(Error::Validation(format!("invalid characters in {}", field)));
    }
    Ok(name)
}
