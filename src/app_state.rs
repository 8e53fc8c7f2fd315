use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use crate::{
    config::AppConfig, embedding::Embedder, pipeline::PageGenerator,
    vector_store::ComponentStore,
};

/// Estado compartido por los handlers. Todas las dependencias externas se
/// construyen en `main` y se inyectan aquí.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn ComponentStore>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: PageGenerator,
    pub status: Arc<Mutex<Status>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

/// Estado de la ingesta en segundo plano.
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub is_busy: bool,
    pub message: String,
    pub progress: f32, // Valor entre 0.0 y 1.0
}
