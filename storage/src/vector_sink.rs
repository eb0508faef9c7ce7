//! Thin adapter around `qdrant-client`, mirroring the shape of the
//! teacher's own Qdrant facade: a struct holding the client and the target
//! collection name, with the builder verbosity hidden behind a couple of
//! narrow methods.
//!
//! No embedding model is in scope for this crate (§9 lists the language
//! model provider SDKs as a collaborator contract, not something `storage`
//! owns), so points are indexed under a small deterministic vector derived
//! from the text itself. That is enough to prove the integration is wired
//! correctly; swapping in real embeddings later only touches `embed_text`.

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{CreateCollectionBuilder, Distance, PointStruct, UpsertPointsBuilder, VectorParamsBuilder};
use tracing::{debug, info, warn};

use crate::errors::{Result, StorageError};

const VECTOR_SIZE: u64 = 32;

pub struct VectorSink {
    client: Qdrant,
    collection: String,
}

impl VectorSink {
    /// Connects and ensures the collection exists. Returns `None` on any
    /// failure so a missing or unreachable Qdrant instance disables the
    /// sink rather than failing startup.
    pub async fn connect(url: &str, api_key: Option<&str>, collection: &str) -> Option<Self> {
        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = match builder.build() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "vector sink disabled: could not build client");
                return None;
            }
        };

        let sink = Self {
            client,
            collection: collection.to_string(),
        };
        if let Err(e) = sink.ensure_collection().await {
            warn!(error = %e, "vector sink disabled: could not ensure collection");
            return None;
        }
        info!(collection, "vector sink connected");
        Some(sink)
    }

    async fn ensure_collection(&self) -> Result<()> {
        if self.client.collection_info(&self.collection).await.is_ok() {
            debug!(collection = %self.collection, "vector collection already exists");
            return Ok(());
        }
        self.client
            .create_collection(CreateCollectionBuilder::new(&self.collection).vectors_config(VectorParamsBuilder::new(VECTOR_SIZE, Distance::Cosine)))
            .await
            .map_err(|e| StorageError::Qdrant(e.to_string()))?;
        info!(collection = %self.collection, "vector collection created");
        Ok(())
    }

    pub async fn upsert(&self, id: u64, text: &str, payload: &serde_json::Value) -> Result<()> {
        let vector = embed_text(text);
        let mut point_payload: qdrant_client::Payload = payload.clone().try_into().map_err(|e: serde_json::Error| StorageError::Serde(e))?;
        point_payload.insert("text", text);
        let point = PointStruct::new(id, vector, point_payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]))
            .await
            .map_err(|e| StorageError::Qdrant(e.to_string()))?;
        debug!(id, "vector sink upsert");
        Ok(())
    }
}

/// Deterministic bag-of-bytes pseudo-embedding: folds the text into
/// `VECTOR_SIZE` buckets and normalizes. Not semantically meaningful, only
/// stable and collection-shaped.
fn embed_text(text: &str) -> Vec<f32> {
    let mut buckets = vec![0f32; VECTOR_SIZE as usize];
    for (i, byte) in text.bytes().enumerate() {
        buckets[i % VECTOR_SIZE as usize] += byte as f32;
    }
    let norm = buckets.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for b in &mut buckets {
            *b /= norm;
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_text_is_deterministic_and_normalized() {
        let a = embed_text("hello world");
        let b = embed_text("hello world");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn embed_text_differs_for_different_inputs() {
        assert_ne!(embed_text("a"), embed_text("b"));
    }
}
