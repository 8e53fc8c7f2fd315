//! Función de embedding: texto → vector de dimensión fija.
//!
//! El modelo es una caja negra determinista para una versión dada; si cambia
//! el modelo hay que volver a embeber todo el corpus.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::config::{AppConfig, LlmProvider};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Dimensión de los vectores que produce.
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f64>>;
}

/// Embeddings vía Rig (sólo OpenAI por ahora).
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    provider: LlmProvider,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            provider: cfg.llm_provider.clone(),
            model: cfg.llm_embedding_model.clone(),
            dimensions: cfg.embedding_dimensions,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        use rig::client::EmbeddingsClient as _;
        use rig::embeddings::EmbeddingModel as _;
        use rig::providers::openai::{self, TEXT_EMBEDDING_3_SMALL};

        if self.provider != LlmProvider::OpenAI {
            return Err(anyhow!(
                "Proveedor LLM {:?} aún no implementado para embeddings",
                self.provider
            ));
        }

        let client = openai::Client::from_env();
        let model_name = if self.model.is_empty() {
            TEXT_EMBEDDING_3_SMALL
        } else {
            self.model.as_str()
        };

        // Los modelos text-embedding-3 admiten reducir la dimensión en origen.
        let embedding_model = client.embedding_model_with_ndims(model_name, self.dimensions);
        let embeddings = embedding_model.embed_texts(vec![text.to_string()]).await?;
        let vector = embeddings
            .into_iter()
            .next()
            .map(|e| e.vec)
            .ok_or_else(|| anyhow!("El proveedor no devolvió ningún embedding"))?;

        ensure_dimensions(&vector, self.dimensions)?;
        Ok(vector)
    }
}

/// Comprueba que un vector tenga la dimensión esperada por el índice.
pub fn ensure_dimensions(vector: &[f64], expected: usize) -> Result<()> {
    if vector.len() != expected {
        return Err(anyhow!(
            "Dimensión de embedding inesperada: {} (se esperaba {})",
            vector.len(),
            expected
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_check() {
        assert!(ensure_dimensions(&[0.0; 384], 384).is_ok());
        let err = ensure_dimensions(&[0.0; 3], 384).unwrap_err();
        assert!(err.to_string().contains("384"));
    }
}
