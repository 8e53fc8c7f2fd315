use crate::config::AppConfig;
use anyhow::Result;
use neo4rs::{query, Graph};
use tracing::info;
use url::Url;

/// Nombre del índice vectorial sobre `:Component(embedding)`.
pub const COMPONENT_VECTOR_INDEX: &str = "componentEmbeddingIndex";

pub async fn connect_from_config(cfg: &AppConfig) -> Result<Graph> {
    let url = Url::parse(&cfg.neo4j_uri)?;
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(7687);
    let addr = format!("{host}:{port}");

    info!("Conectando a Neo4j en {addr}...");
    let graph = Graph::new(&addr, &cfg.neo4j_user, &cfg.neo4j_password).await?;
    info!("Conexión a Neo4j OK");
    Ok(graph)
}

/// Crea el constraint de unicidad, el índice por categoría y el índice
/// vectorial (coseno) para los `:Component`.
pub async fn ensure_schema(graph: &Graph, dimensions: usize) -> Result<()> {
    let statements = [
        "CREATE CONSTRAINT component_id IF NOT EXISTS
         FOR (c:Component)
         REQUIRE c.id IS UNIQUE"
            .to_string(),
        "CREATE INDEX component_category IF NOT EXISTS
         FOR (c:Component)
         ON (c.category)"
            .to_string(),
        format!(
            "\
CREATE VECTOR INDEX {index_name} IF NOT EXISTS
FOR (c:Component)
ON (c.embedding)
OPTIONS {{
  indexConfig: {{
    `vector.dimensions`: {dimensions},
    `vector.similarity_function`: 'cosine'
  }}
}}",
            index_name = COMPONENT_VECTOR_INDEX,
            dimensions = dimensions
        ),
    ];

    for stmt in &statements {
        graph.run(query(stmt)).await?;
    }

    info!("Esquema de Neo4j asegurado (constraint, índice de categoría e índice vectorial de {dimensions} dimensiones).");
    Ok(())
}
