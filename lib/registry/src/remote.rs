//! Embedding extraction over HTTP.
//!
//! The extraction model runs as a separate service. Each image is posted as
//! base64 PNG and the service answers with the embedding of the single face
//! it found, or `null` when there is none.

use crate::image::encode_png;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use facereg_core::{Embedding, Extraction, FaceEmbedder};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct ExtractRequest<'a> {
    image: &'a str,
}

#[derive(Deserialize)]
struct ExtractResponse {
    embedding: Option<Vec<f32>>,
}

pub struct RemoteEmbedder {
    client: reqwest::blocking::Client,
    url: String,
}

impl RemoteEmbedder {
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request(&self, image: &DynamicImage) -> Result<Option<Vec<f32>>, String> {
        let png = encode_png(image).map_err(|e| e.to_string())?;
        let encoded = STANDARD.encode(png);
        let response: ExtractResponse = self
            .client
            .post(&self.url)
            .json(&ExtractRequest { image: &encoded })
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| e.to_string())?;
        Ok(response.embedding)
    }
}

impl FaceEmbedder for RemoteEmbedder {
    fn extract(&self, image: &DynamicImage) -> Extraction {
        match self.request(image) {
            Ok(Some(vector)) if !vector.is_empty() => Extraction::Detected(Embedding::new(vector)),
            Ok(_) => Extraction::NotDetected,
            Err(e) => {
                debug!("Extraction request to {} failed: {}", self.url, e);
                Extraction::Failed(e)
            }
        }
    }
}
