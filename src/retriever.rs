//! Recuperación por categoría: para cada categoría pedida se embebe
//! `"<prompt> <categoría>"`, se busca en el vector store filtrando por la
//! categoría y se queda el mejor resultado.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use futures::future::try_join_all;
use tracing::{info, warn};

use crate::config::{MissingCategoryPolicy, RetrievalMode};
use crate::embedding::Embedder;
use crate::models::RetrievalResult;
use crate::vector_store::ComponentStore;

/// Candidatos pedidos al store por categoría; sólo se usa el primero.
const CANDIDATES_PER_CATEGORY: usize = 2;

#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn ComponentStore>,
    supported_categories: Vec<String>,
    policy: MissingCategoryPolicy,
    mode: RetrievalMode,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn ComponentStore>,
        supported_categories: Vec<String>,
        policy: MissingCategoryPolicy,
        mode: RetrievalMode,
    ) -> Self {
        Self {
            embedder,
            store,
            supported_categories,
            policy,
            mode,
        }
    }

    /// Resuelve un componente por categoría, respetando orden y duplicados.
    /// Las categorías sin resultados se omiten o hacen fallar la petición
    /// según la política configurada.
    pub async fn retrieve(
        &self,
        prompt: &str,
        categories: &[String],
    ) -> Result<Vec<RetrievalResult>> {
        let per_category: Vec<Option<RetrievalResult>> = match self.mode {
            RetrievalMode::Sequential => {
                let mut results = Vec::with_capacity(categories.len());
                for category in categories {
                    results.push(self.retrieve_one(prompt, category).await?);
                }
                results
            }
            RetrievalMode::Concurrent => {
                try_join_all(categories.iter().map(|c| self.retrieve_one(prompt, c))).await?
            }
        };

        let mut selected = Vec::new();
        for (category, result) in categories.iter().zip(per_category) {
            match result {
                Some(result) => {
                    info!(
                        "Recuperado {} para '{}' (similitud: {:.3})",
                        result.component_id, category, result.similarity
                    );
                    selected.push(result);
                }
                None => match self.policy {
                    MissingCategoryPolicy::Skip => {
                        warn!("Sin componentes para la categoría '{category}'; se omite.");
                    }
                    MissingCategoryPolicy::Fail => {
                        return Err(anyhow!(
                            "No hay ningún componente para la categoría '{category}'"
                        ));
                    }
                },
            }
        }

        Ok(selected)
    }

    async fn retrieve_one(&self, prompt: &str, category: &str) -> Result<Option<RetrievalResult>> {
        if !self.supported_categories.iter().any(|c| c == category) {
            warn!("Categoría no soportada en este despliegue: '{category}'");
            return Ok(None);
        }

        let search_text = format!("{prompt} {category}");
        let vector = self.embedder.embed(&search_text).await?;
        let hits = self
            .store
            .search(&vector, Some(category), CANDIDATES_PER_CATEGORY)
            .await?;

        Ok(hits.into_iter().next().map(|hit| RetrievalResult {
            category: category.to_string(),
            component_id: hit.record.metadata.id.clone(),
            similarity: hit.similarity,
            record: hit.record,
        }))
    }
}
