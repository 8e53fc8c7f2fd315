use std::path::PathBuf;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::spawn;
use tracing::{error, info};

use crate::{
    app_state::{AppState, Status},
    ingest,
    models::SearchHit,
    pipeline::GeneratedPage,
};

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(code: StatusCode, message: String) -> ApiError {
    (code, Json(json!({ "error": message })))
}

// --- Payloads y Respuestas de la API ---

fn default_limit() -> usize {
    5
}

#[derive(Deserialize)]
pub struct SearchPayload {
    query: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentResult {
    id: String,
    category: String,
    description: String,
    similarity: f64,
    style_tags: Vec<String>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    query: String,
    results: Vec<ComponentResult>,
    count: usize,
}

#[derive(Deserialize)]
pub struct GeneratePayload {
    prompt: String,
}

#[derive(Deserialize, Default)]
pub struct IngestPayload {
    #[serde(default)]
    path: Option<String>,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/search", post(search_handler))
        .route("/api/generate", post(generate_handler))
        .route("/api/ingest", post(ingest_handler))
        .route("/api/status", get(status_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

// --- Handlers ---

#[axum::debug_handler]
async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "name": "RAG Page Builder API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /health",
            "search": "POST /api/search",
            "generate": "POST /api/generate",
            "ingest": "POST /api/ingest",
            "status": "GET /api/status",
            "shutdown": "POST /api/shutdown"
        }
    }))
}

/// Siempre responde 200; el estado degradado va en el cuerpo.
#[axum::debug_handler]
async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.store.ping().await {
        Ok(()) => Json(json!({ "status": "healthy", "database": "connected" })),
        Err(e) => {
            error!("Error en el health check del vector store: {}", e);
            Json(json!({ "status": "unhealthy", "database": "disconnected" }))
        }
    }
}

#[axum::debug_handler]
async fn search_handler(
    State(state): State<AppState>,
    Json(payload): Json<SearchPayload>,
) -> Result<Json<SearchResponse>, ApiError> {
    match search_components(&state, &payload).await {
        Ok(hits) => {
            let results: Vec<ComponentResult> = hits
                .into_iter()
                .map(|hit| ComponentResult {
                    id: hit.record.metadata.id,
                    category: hit.record.metadata.category,
                    description: hit.record.metadata.description,
                    similarity: hit.similarity,
                    style_tags: hit.record.metadata.style_tags,
                })
                .collect();
            Ok(Json(SearchResponse {
                query: payload.query,
                count: results.len(),
                results,
            }))
        }
        Err(e) => {
            error!("Error en la búsqueda de componentes: {e:#}");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")))
        }
    }
}

async fn search_components(state: &AppState, payload: &SearchPayload) -> anyhow::Result<Vec<SearchHit>> {
    let vector = state.embedder.embed(&payload.query).await?;
    state
        .store
        .search(&vector, payload.category.as_deref(), payload.limit)
        .await
}

#[axum::debug_handler]
async fn generate_handler(
    State(state): State<AppState>,
    Json(payload): Json<GeneratePayload>,
) -> Result<Json<GeneratedPage>, ApiError> {
    state
        .generator
        .generate(&payload.prompt)
        .await
        .map(Json)
        .map_err(|failure| api_error(StatusCode::INTERNAL_SERVER_ERROR, failure.to_string()))
}

#[axum::debug_handler]
async fn ingest_handler(
    State(state): State<AppState>,
    payload: Option<Json<IngestPayload>>,
) -> Result<StatusCode, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let root_dir = payload
        .path
        .map(PathBuf::from)
        .unwrap_or_else(|| state.config.components_dir.clone());

    if !root_dir.is_dir() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("La ruta no es un directorio válido: {}", root_dir.display()),
        ));
    }

    {
        let mut status = state
            .status
            .lock()
            .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Estado corrupto".to_string()))?;
        if status.is_busy {
            return Err(api_error(
                StatusCode::CONFLICT,
                "Ya hay una ingesta en curso.".to_string(),
            ));
        }
        status.is_busy = true;
        status.message = "Iniciando indexación...".to_string();
        status.progress = 0.0;
    }

    spawn(async move {
        let result = ingest::ingest_directory(
            state.store.as_ref(),
            state.embedder.as_ref(),
            &root_dir,
            &state.config.supported_categories,
            Some(state.status.clone()),
        )
        .await;

        if let Ok(mut status) = state.status.lock() {
            status.is_busy = false;
            status.progress = 0.0;
            match result {
                Ok(summary) => {
                    status.message = format!("¡Indexación completada! {}", summary);
                }
                Err(err) => {
                    status.message = format!("Error en la indexación: {:#}", err);
                    error!("Error de ingesta: {:#}", err);
                }
            }
        }
    });

    Ok(StatusCode::ACCEPTED)
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<Status> {
    let status = state
        .status
        .lock()
        .map(|s| s.clone())
        .unwrap_or_default();
    Json(status)
}

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> StatusCode {
    info!("Petición de apagado recibida.");
    if let Ok(mut sender) = state.shutdown_sender.lock() {
        if let Some(sender) = sender.take() {
            let _ = sender.send(());
        }
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::config::{AppConfig, MissingCategoryPolicy, RetrievalMode};
    use crate::pipeline::{GenerationSettings, PageGenerator};
    use crate::retriever::Retriever;
    use crate::testing::{seeded_store, HashingEmbedder, ScriptedChatModel};
    use crate::vector_store::ComponentStore;

    async fn test_state(intent: &str) -> AppState {
        let config = AppConfig::from_lookup(|key| match key {
            "VECTOR_STORE" => Some("memory".to_string()),
            _ => None,
        })
        .unwrap();
        let embedder = Arc::new(HashingEmbedder::default());
        let store: Arc<dyn ComponentStore> = seeded_store(embedder.as_ref()).await;
        let retriever = Retriever::new(
            embedder.clone(),
            store.clone(),
            config.supported_categories.clone(),
            MissingCategoryPolicy::Skip,
            RetrievalMode::Sequential,
        );
        let generator = PageGenerator::new(
            Arc::new(ScriptedChatModel::with_intent(intent)),
            retriever,
            GenerationSettings::from_config(&config),
        );
        AppState {
            config,
            store,
            embedder,
            generator,
            status: Arc::new(Mutex::new(Status::default())),
            shutdown_sender: Arc::new(Mutex::new(None)),
        }
    }

    #[tokio::test]
    async fn search_filters_by_category_with_default_limit() {
        let state = test_state("{}").await;
        let payload: SearchPayload =
            serde_json::from_value(json!({"query": "dark navbar with search", "category": "navigation"}))
                .unwrap();
        assert_eq!(payload.limit, 5);

        let Json(response) = search_handler(State(state), Json(payload)).await.unwrap();
        assert_eq!(response.count, 2);
        assert!(response.results.iter().all(|r| r.category == "navigation"));
        assert_eq!(response.results[0].id, "navigation-search");

        let body = serde_json::to_value(&response).unwrap();
        assert!(body["results"][0]["styleTags"].is_array());
    }

    #[tokio::test]
    async fn generate_returns_code_and_components() {
        let state = test_state(r#"{"requiredComponents":["navigation","hero","footer"]}"#).await;
        let payload = GeneratePayload {
            prompt: "saas landing".to_string(),
        };

        let Json(page) = generate_handler(State(state), Json(payload)).await.unwrap();
        let body = serde_json::to_value(&page).unwrap();
        assert_eq!(body["componentsUsed"].as_array().unwrap().len(), 3);
        assert!(body["code"].as_str().unwrap().starts_with("import "));
        assert!(body["generationTimeMs"].is_u64());
    }

    #[tokio::test]
    async fn generate_failure_is_a_server_error_with_message() {
        let state = test_state("not json").await;
        let payload = GeneratePayload {
            prompt: "saas landing".to_string(),
        };

        let (code, Json(body)) = generate_handler(State(state), Json(payload)).await.unwrap_err();
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("ParsingIntent"));
    }

    #[tokio::test]
    async fn health_reports_connected_store() {
        let state = test_state("{}").await;
        let Json(body) = health_handler(State(state)).await;
        assert_eq!(body, json!({"status": "healthy", "database": "connected"}));
    }

    #[tokio::test]
    async fn second_ingest_while_busy_is_rejected() {
        let state = test_state("{}").await;
        state.status.lock().unwrap().is_busy = true;
        let dir = tempfile::tempdir().unwrap();
        let payload = IngestPayload {
            path: Some(dir.path().display().to_string()),
        };

        let Err((code, _)) = ingest_handler(State(state), Some(Json(payload))).await else {
            panic!("se esperaba un conflicto");
        };
        assert_eq!(code, StatusCode::CONFLICT);
    }
}
