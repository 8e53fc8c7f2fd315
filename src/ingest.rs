//! Ingesta del corpus de componentes: recorre el directorio, empareja cada
//! `<nombre>.json` con su `<nombre>.tsx`, embebe el texto sintetizado y
//! persiste el registro en el vector store.
//!
//! Es idempotente: volver a ingerir el mismo corpus reemplaza cada registro
//! por id con los mismos valores.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Context, Result};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::{
    app_state::Status,
    embedding::{ensure_dimensions, Embedder},
    models::{ComponentMetadata, ComponentRecord},
    vector_store::ComponentStore,
};

/// Resumen de los resultados de una operación de ingesta.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestionSummary {
    pub files_scanned: u32,
    pub components_ingested: u32,
    /// Metadatos sin fichero de código emparejado.
    pub components_skipped: u32,
    /// Metadatos mal formados, con categoría no soportada o con un `id`
    /// ya visto en esta ingesta.
    pub components_failed: u32,
}

impl std::fmt::Display for IngestionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Resumen: {} metadatos escaneados, {} componentes ingeridos, {} omitidos, {} con errores.",
            self.files_scanned, self.components_ingested, self.components_skipped, self.components_failed
        )
    }
}

/// Par metadatos + código listo para embeber.
#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub metadata: ComponentMetadata,
    pub code: String,
}

enum EntryOutcome {
    Ready(CorpusEntry),
    MissingSource(PathBuf),
}

fn update_status(status: Option<&Arc<Mutex<Status>>>, message: String, progress: f32) {
    if let Some(status) = status {
        if let Ok(mut status) = status.lock() {
            status.message = message;
            status.progress = progress;
        }
    }
}

/// Recorre `root` e ingiere cada componente encontrado.
///
/// Un metadato sin su `.tsx` se omite con aviso; uno mal formado, con una
/// categoría fuera de `supported_categories` o con un `id` repetido se cuenta
/// como fallido (gana el primero en orden de recorrido). Los errores del
/// embedder o del store abortan la ingesta.
pub async fn ingest_directory(
    store: &dyn ComponentStore,
    embedder: &dyn Embedder,
    root: &Path,
    supported_categories: &[String],
    status: Option<Arc<Mutex<Status>>>,
) -> Result<IngestionSummary> {
    if !root.is_dir() {
        return Err(anyhow!("La ruta no es un directorio: {}", root.display()));
    }

    let mut summary = IngestionSummary::default();
    let metadata_files: Vec<PathBuf> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();

    let total = metadata_files.len().max(1) as f32;
    let mut seen_ids: HashMap<String, PathBuf> = HashMap::new();

    for (index, path) in metadata_files.iter().enumerate() {
        summary.files_scanned += 1;
        let progress = (index + 1) as f32 / total;
        update_status(
            status.as_ref(),
            format!("[{}/{}] Procesando: {}...", index + 1, metadata_files.len(), path.display()),
            progress,
        );

        let entry = match read_entry(path) {
            Ok(EntryOutcome::Ready(entry)) => entry,
            Ok(EntryOutcome::MissingSource(tsx)) => {
                warn!("No existe {}; se omite el componente.", tsx.display());
                summary.components_skipped += 1;
                continue;
            }
            Err(err) => {
                error!("Metadatos inválidos en {}: {err:#}", path.display());
                summary.components_failed += 1;
                continue;
            }
        };

        if !supported_categories.iter().any(|c| *c == entry.metadata.category) {
            error!(
                "Categoría '{}' no soportada en {}; se descarta.",
                entry.metadata.category,
                path.display()
            );
            summary.components_failed += 1;
            continue;
        }

        if let Some(first) = seen_ids.get(&entry.metadata.id) {
            error!(
                "Id '{}' duplicado: {} repite el de {}; se descarta.",
                entry.metadata.id,
                path.display(),
                first.display()
            );
            summary.components_failed += 1;
            continue;
        }
        seen_ids.insert(entry.metadata.id.clone(), path.clone());

        let record = embed_entry(embedder, entry).await?;
        store
            .upsert(&record)
            .await
            .with_context(|| format!("No se pudo guardar el componente {}", record.id()))?;
        info!("Componente {} ingerido ({}).", record.id(), record.category());
        summary.components_ingested += 1;
    }

    info!("{summary}");
    Ok(summary)
}

fn read_entry(metadata_path: &Path) -> Result<EntryOutcome> {
    let tsx = metadata_path.with_extension("tsx");
    if !tsx.is_file() {
        return Ok(EntryOutcome::MissingSource(tsx));
    }

    let raw = fs::read_to_string(metadata_path)?;
    let metadata: ComponentMetadata = serde_json::from_str(&raw)?;
    let code = fs::read_to_string(&tsx)?;
    Ok(EntryOutcome::Ready(CorpusEntry { metadata, code }))
}

/// Construye el registro completo a partir de un par metadatos + código.
pub async fn embed_entry(embedder: &dyn Embedder, entry: CorpusEntry) -> Result<ComponentRecord> {
    let text = entry.metadata.searchable_text(&entry.code);
    let embedding = embedder
        .embed(&text)
        .await
        .with_context(|| format!("No se pudo embeber el componente {}", entry.metadata.id))?;
    ensure_dimensions(&embedding, embedder.dimensions())?;

    Ok(ComponentRecord {
        metadata: entry.metadata,
        code: entry.code,
        embedding,
        updated_at: None,
    })
}
