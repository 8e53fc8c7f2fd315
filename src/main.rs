// Módulos de la aplicación
mod api;
mod app_state;
mod config;
mod embedding;
mod ingest;
mod llm;
mod models;
mod neo4j_client;
mod pipeline;
mod prompts;
mod retriever;
mod sanitizer;
#[cfg(test)]
mod testing;
mod vector_store;

use crate::app_state::{AppState, Status};
use crate::config::{AppConfig, StoreBackend};
use crate::embedding::{Embedder, OpenAiEmbedder};
use crate::llm::RigChatModel;
use crate::pipeline::{GenerationSettings, PageGenerator};
use crate::retriever::Retriever;
use crate::vector_store::{ComponentStore, InMemoryComponentStore, Neo4jComponentStore};
use anyhow::{Context, Result};
use axum::Router;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = AppConfig::from_env().context("Error al cargar la configuración")?;

    // 3. Dependencias externas: embedder, vector store y LLM
    let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::from_config(&cfg));
    let store = build_store(&cfg).await?;

    // Modo offline: `<bin> ingest [directorio]` ingiere el corpus y termina.
    let mut args = std::env::args().skip(1);
    if args.next().as_deref() == Some("ingest") {
        let root = args.next().map(PathBuf::from).unwrap_or_else(|| cfg.components_dir.clone());
        let summary = ingest::ingest_directory(
            store.as_ref(),
            embedder.as_ref(),
            &root,
            &cfg.supported_categories,
            None,
        )
        .await?;
        println!("{summary}");
        return Ok(());
    }

    if cfg.store_backend == StoreBackend::Memory {
        // El store en memoria arranca vacío: se rellena con el corpus local.
        match ingest::ingest_directory(
            store.as_ref(),
            embedder.as_ref(),
            &cfg.components_dir,
            &cfg.supported_categories,
            None,
        )
        .await
        {
            Ok(summary) => info!("Corpus cargado en memoria. {summary}"),
            Err(err) => warn!("No se pudo cargar el corpus en memoria: {err:#}"),
        }
    }

    match store.count().await {
        Ok(n) => info!("Vector store con {n} componentes."),
        Err(err) => warn!("No se pudo contar los componentes: {err:#}"),
    }

    // 4. Retriever y orquestador con las dependencias inyectadas
    let retriever = Retriever::new(
        embedder.clone(),
        store.clone(),
        cfg.supported_categories.clone(),
        cfg.missing_category_policy,
        cfg.retrieval_mode,
    );
    let generator = PageGenerator::new(
        Arc::new(RigChatModel::from_config(&cfg)),
        retriever,
        GenerationSettings::from_config(&cfg),
    );

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 5. Crear estado compartido de la aplicación
    let app_state = AppState {
        config: cfg.clone(),
        store,
        embedder,
        generator,
        status: Arc::new(Mutex::new(Status {
            is_busy: false,
            message: "Servidor listo.".to_string(),
            progress: 0.0,
        })),
        shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
    };

    // 6. Configurar el router de la API
    let app = Router::new()
        .merge(api::create_router(app_state.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 7. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {server_addr}"))?;
    info!("🚀 Servidor escuchando en http://{}", server_addr);

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}

/// Conecta con el backend configurado y asegura su esquema.
async fn build_store(cfg: &AppConfig) -> Result<Arc<dyn ComponentStore>> {
    match cfg.store_backend {
        StoreBackend::Neo4j => {
            let graph = neo4j_client::connect_from_config(cfg)
                .await
                .context("Error conectando a Neo4j")?;
            neo4j_client::ensure_schema(&graph, cfg.embedding_dimensions)
                .await
                .context("Error asegurando el esquema de Neo4j")?;
            Ok(Arc::new(Neo4jComponentStore::new(Arc::new(graph))))
        }
        StoreBackend::Memory => {
            info!("Usando vector store en memoria.");
            Ok(Arc::new(InMemoryComponentStore::new()))
        }
    }
}
