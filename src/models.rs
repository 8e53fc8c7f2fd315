//! Modelos de dominio: componentes del corpus, intención del usuario y
//! resultados de recuperación.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Número de caracteres de código que entran en el texto a embeber.
pub const CODE_PREVIEW_CHARS: usize = 500;

/// Documento de metadatos (`<nombre>.json`) que acompaña a cada `<nombre>.tsx`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    pub id: String,
    pub filename: String,
    pub category: String,
    pub style_tags: Vec<String>,
    pub color_scheme: Vec<String>,
    pub complexity: String,
    pub props_schema: Value,
    pub dependencies: Vec<String>,
    pub description: String,
    #[serde(default = "unknown_source")]
    pub source: String,
}

fn unknown_source() -> String {
    "Unknown".to_string()
}

impl ComponentMetadata {
    /// Texto sintetizado que se embebe para cada componente.
    pub fn searchable_text(&self, code: &str) -> String {
        let preview: String = code.chars().take(CODE_PREVIEW_CHARS).collect();
        format!(
            "Category: {}\nStyle: {}\nColors: {}\nDescription: {}\nSource: {}\nCode Preview: {}",
            self.category,
            self.style_tags.join(" "),
            self.color_scheme.join(" "),
            self.description,
            self.source,
            preview
        )
    }
}

/// Representa un nodo (:Component) en el vector store.
/// El código es propiedad del corpus; la recuperación nunca lo modifica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    #[serde(flatten)]
    pub metadata: ComponentMetadata,
    pub code: String,
    pub embedding: Vec<f64>,
    /// Lo fija el store en cada upsert.
    pub updated_at: Option<DateTime<Utc>>,
}

impl ComponentRecord {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn category(&self) -> &str {
        &self.metadata.category
    }
}

/// Un componente devuelto por una búsqueda, con su similitud coseno.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub record: ComponentRecord,
    pub similarity: f64,
}

/// Intención extraída del prompt por la etapa 1.
/// Acepta claves camelCase o snake_case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    #[serde(default, alias = "site_type")]
    pub site_type: String,
    #[serde(default, alias = "required_components")]
    pub required_components: Option<Vec<String>>,
    #[serde(default, alias = "style_hints")]
    pub style_hints: BTreeMap<String, Value>,
    #[serde(default, alias = "content_hints")]
    pub content_hints: BTreeMap<String, Value>,
}

/// Componente elegido para una categoría concreta.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub category: String,
    pub component_id: String,
    pub similarity: f64,
    pub record: ComponentRecord,
}
