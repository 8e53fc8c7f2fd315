//! Vector store de componentes.
//!
//! API pública:
//!   - `ComponentStore::upsert(record)`: inserta o reemplaza por `id`.
//!   - `ComponentStore::search(vector, categoría?, límite)`: vecinos más
//!     cercanos por similitud coseno descendente.
//!
//! Los empates quedan a criterio del store y no son estables entre versiones.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neo4rs::{query, Graph, Row};

use crate::models::{ComponentMetadata, ComponentRecord, SearchHit};
use crate::neo4j_client::COMPONENT_VECTOR_INDEX;

#[async_trait]
pub trait ComponentStore: Send + Sync {
    /// Inserta o reemplaza por completo el registro con el mismo `id`.
    async fn upsert(&self, record: &ComponentRecord) -> Result<()>;

    /// Devuelve como mucho `limit` componentes ordenados por similitud
    /// descendente, filtrando por categoría si se indica.
    async fn search(
        &self,
        query_vector: &[f64],
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    async fn count(&self) -> Result<usize>;

    /// Comprueba que el store responde.
    async fn ping(&self) -> Result<()>;
}

/// Similitud coseno en [-1, 1]. Un vector nulo tiene similitud 0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(anyhow!(
            "Dimensiones distintas: {} frente a {}",
            a.len(),
            b.len()
        ));
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

// ---------------------------------------------------------------------
// EN MEMORIA
// ---------------------------------------------------------------------

/// Store en proceso con búsqueda exacta (recorrido completo).
#[derive(Debug, Default)]
pub struct InMemoryComponentStore {
    records: RwLock<HashMap<String, ComponentRecord>>,
}

impl InMemoryComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<ComponentRecord> {
        self.records
            .read()
            .ok()
            .and_then(|records| records.get(id).cloned())
    }
}

#[async_trait]
impl ComponentStore for InMemoryComponentStore {
    async fn upsert(&self, record: &ComponentRecord) -> Result<()> {
        let mut stored = record.clone();
        stored.updated_at = Some(Utc::now());
        self.records
            .write()
            .map_err(|_| anyhow!("Store en memoria envenenado"))?
            .insert(stored.metadata.id.clone(), stored);
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f64],
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("Store en memoria envenenado"))?;

        let mut hits = Vec::new();
        for record in records.values() {
            if category.is_some_and(|c| record.category() != c) {
                continue;
            }
            let similarity = cosine_similarity(query_vector, &record.embedding)?;
            hits.push(SearchHit {
                record: record.clone(),
                similarity,
            });
        }

        // Desempate por id para que el orden no dependa del HashMap.
        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.record.id().cmp(b.record.id()))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self
            .records
            .read()
            .map_err(|_| anyhow!("Store en memoria envenenado"))?
            .len())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------
// NEO4J
// ---------------------------------------------------------------------

/// Store respaldado por nodos `(:Component)` con índice vectorial coseno.
#[derive(Clone)]
pub struct Neo4jComponentStore {
    graph: Arc<Graph>,
}

const RETURN_COMPONENT: &str = "
RETURN c.id AS id, c.filename AS filename, c.category AS category,
       c.style_tags AS style_tags, c.color_scheme AS color_scheme,
       c.complexity AS complexity, c.props_schema AS props_schema,
       c.dependencies AS dependencies, c.description AS description,
       c.source AS source, c.code AS code, c.embedding AS embedding,
       toString(c.updated_at) AS updated_at, score
ORDER BY score DESC";

impl Neo4jComponentStore {
    pub fn new(graph: Arc<Graph>) -> Self {
        Self { graph }
    }
}

/// Neo4j normaliza la puntuación coseno a [0, 1] como (1 + cos) / 2.
fn neo4j_score_to_cosine(score: f64) -> f64 {
    (2.0 * score - 1.0).clamp(-1.0, 1.0)
}

fn hit_from_row(row: &Row) -> Result<SearchHit> {
    let field = |name: &str| anyhow!("Falta campo '{name}' en resultado de Neo4j");

    let props_schema: String = row.get("props_schema").ok_or_else(|| field("props_schema"))?;
    let metadata = ComponentMetadata {
        id: row.get("id").ok_or_else(|| field("id"))?,
        filename: row.get("filename").ok_or_else(|| field("filename"))?,
        category: row.get("category").ok_or_else(|| field("category"))?,
        style_tags: row.get("style_tags").unwrap_or_default(),
        color_scheme: row.get("color_scheme").unwrap_or_default(),
        complexity: row.get("complexity").ok_or_else(|| field("complexity"))?,
        props_schema: serde_json::from_str(&props_schema)
            .context("props_schema almacenado no es JSON válido")?,
        dependencies: row.get("dependencies").unwrap_or_default(),
        description: row.get("description").ok_or_else(|| field("description"))?,
        source: row.get("source").ok_or_else(|| field("source"))?,
    };
    let updated_at = row
        .get::<String>("updated_at")
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let score: f64 = row.get("score").ok_or_else(|| field("score"))?;

    Ok(SearchHit {
        record: ComponentRecord {
            metadata,
            code: row.get("code").ok_or_else(|| field("code"))?,
            embedding: row.get("embedding").ok_or_else(|| field("embedding"))?,
            updated_at,
        },
        similarity: neo4j_score_to_cosine(score),
    })
}

#[async_trait]
impl ComponentStore for Neo4jComponentStore {
    async fn upsert(&self, record: &ComponentRecord) -> Result<()> {
        let meta = &record.metadata;
        self.graph
            .run(
                query(
                    "MERGE (c:Component {id: $id})
                     SET c.filename = $filename, c.category = $category,
                         c.style_tags = $style_tags, c.color_scheme = $color_scheme,
                         c.complexity = $complexity, c.props_schema = $props_schema,
                         c.dependencies = $dependencies, c.description = $description,
                         c.source = $source, c.code = $code, c.embedding = $embedding,
                         c.updated_at = datetime()",
                )
                .param("id", meta.id.clone())
                .param("filename", meta.filename.clone())
                .param("category", meta.category.clone())
                .param("style_tags", meta.style_tags.clone())
                .param("color_scheme", meta.color_scheme.clone())
                .param("complexity", meta.complexity.clone())
                .param("props_schema", meta.props_schema.to_string())
                .param("dependencies", meta.dependencies.clone())
                .param("description", meta.description.clone())
                .param("source", meta.source.clone())
                .param("code", record.code.clone())
                .param("embedding", record.embedding.clone()),
            )
            .await?;
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f64],
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // Con filtro se recorre la categoría completa: el índice devolvería
        // los k globales y el filtro posterior podría dejarlos en nada.
        let q = match category {
            Some(category) => query(&format!(
                "MATCH (c:Component {{category: $category}})
                 WITH c, vector.similarity.cosine(c.embedding, $embedding) AS score
                 {RETURN_COMPONENT}
                 LIMIT $k"
            ))
            .param("category", category.to_string()),
            None => query(&format!(
                "CALL db.index.vector.queryNodes($index_name, $k, $embedding)
                 YIELD node AS c, score
                 {RETURN_COMPONENT}"
            ))
            .param("index_name", COMPONENT_VECTOR_INDEX),
        }
        .param("k", limit as i64)
        .param("embedding", query_vector.to_vec());

        let mut cursor = self.graph.execute(q).await?;
        let mut hits = Vec::new();
        while let Some(row) = cursor.next().await? {
            hits.push(hit_from_row(&row)?);
        }
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let mut cursor = self
            .graph
            .execute(query("MATCH (c:Component) RETURN count(c) AS n"))
            .await?;
        let n: i64 = match cursor.next().await? {
            Some(row) => row.get("n").unwrap_or(0),
            None => 0,
        };
        Ok(n as usize)
    }

    async fn ping(&self) -> Result<()> {
        self.graph.run(query("RETURN 1")).await?;
        Ok(())
    }
}
