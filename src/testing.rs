//! Dobles de prueba: embedder determinista, corpus sembrado y un LLM con
//! respuestas programadas. Nada de red ni base de datos.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;

use crate::embedding::Embedder;
use crate::llm::{ChatModel, ChatResponse, CompletionRequest, TokenUsage};
use crate::models::{ComponentMetadata, ComponentRecord, SearchHit};
use crate::pipeline::PipelineStage;
use crate::vector_store::{ComponentStore, InMemoryComponentStore};

/// Bolsa de palabras con hashing, normalizada a norma 1.
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimensions: 384 }
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let mut vector = vec![0.0; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() % self.dimensions as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(vector)
    }
}

pub fn metadata(id: &str, category: &str) -> ComponentMetadata {
    ComponentMetadata {
        id: id.to_string(),
        filename: format!("{id}.tsx"),
        category: category.to_string(),
        style_tags: vec!["modern".to_string()],
        color_scheme: vec!["blue".to_string(), "white".to_string()],
        complexity: "simple".to_string(),
        props_schema: json!({"title": {"type": "string"}}),
        dependencies: vec!["react".to_string()],
        description: format!("{category} component {id}"),
        source: "Unknown".to_string(),
    }
}

pub fn record(id: &str, category: &str, embedding: Vec<f64>) -> ComponentRecord {
    ComponentRecord {
        metadata: metadata(id, category),
        code: format!("export function Component() {{\n  return <div data-id=\"{id}\" />;\n}}"),
        embedding,
        updated_at: None,
    }
}

/// Dos componentes por categoría para navigation, hero y footer.
pub async fn seeded_store(embedder: &dyn Embedder) -> Arc<InMemoryComponentStore> {
    let store = Arc::new(InMemoryComponentStore::new());
    let corpus = [
        ("navigation-basic", "navigation", "simple top bar with logo and links"),
        ("navigation-search", "navigation", "dark navbar with search input"),
        ("hero-split", "hero", "split hero with image for saas landing"),
        ("hero-gradient", "hero", "gradient hero for portfolio"),
        ("footer-simple", "footer", "minimal footer with copyright"),
        ("footer-newsletter", "footer", "footer with newsletter signup"),
    ];
    for (id, category, description) in corpus {
        let mut rec = record(id, category, Vec::new());
        rec.metadata.description = description.to_string();
        rec.embedding = embedder
            .embed(&rec.metadata.searchable_text(&rec.code))
            .await
            .expect("el embedder de prueba no falla");
        store.upsert(&rec).await.expect("upsert en memoria");
    }
    store
}

/// LLM falso: devuelve la intención dada, compone imports a partir de las
/// etiquetas `### <id>` del contexto y envuelve el código en prosa y
/// markdown para ejercitar la limpieza.
pub struct ScriptedChatModel {
    intent: String,
    fail_at: Option<PipelineStage>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedChatModel {
    pub fn with_intent(intent: &str) -> Self {
        Self {
            intent: intent.to_string(),
            fail_at: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(mut self, stage: PipelineStage) -> Self {
        self.fail_at = Some(stage);
        self
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<ChatResponse> {
        self.calls.lock().unwrap().push(request.clone());
        if self.fail_at == Some(request.stage) {
            return Err(anyhow!("el proveedor respondió 503"));
        }

        let text = self.respond(request)?;
        // Una palabra, un token.
        let usage = TokenUsage {
            input_tokens: request.prompt.split_whitespace().count() as u64,
            output_tokens: text.split_whitespace().count() as u64,
        };
        Ok(ChatResponse { text, usage })
    }
}

impl ScriptedChatModel {
    fn respond(&self, request: &CompletionRequest) -> Result<String> {
        match request.stage {
            PipelineStage::ParsingIntent => Ok(self.intent.clone()),
            PipelineStage::Composing => {
                let imports: Vec<String> = request
                    .prompt
                    .lines()
                    .filter_map(|l| l.strip_prefix("### "))
                    .enumerate()
                    .map(|(i, id)| format!("import {{ Component as C{i} }} from '@/components/{id}'"))
                    .collect();
                let body = (0..imports.len())
                    .map(|i| format!("      <C{i} />"))
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(format!(
                    "Here's the page you asked for:\n\n```tsx\n{}\n\nexport default function Page() {{\n  return (\n    <main>\n{body}\n    </main>\n  );\n}}\n```\n\nThe page wires every component with default props.",
                    imports.join("\n")
                ))
            }
            PipelineStage::Customizing => {
                let code = request
                    .prompt
                    .split_once("```tsx\n")
                    .and_then(|(_, rest)| rest.split_once("\n```"))
                    .map(|(code, _)| code.to_string())
                    .unwrap_or_default();
                Ok(format!(
                    "Sure! Here's a more distinctive version:\n```tsx\n{code}\n```\nI warmed up the palette."
                ))
            }
            PipelineStage::Retrieving => Err(anyhow!("la recuperación no llama al LLM")),
        }
    }
}

/// Store que delega en otro y anota los argumentos de cada búsqueda.
pub struct RecordingStore {
    inner: Arc<dyn ComponentStore>,
    searches: Mutex<Vec<(Option<String>, usize)>>,
}

impl RecordingStore {
    pub fn new(inner: Arc<dyn ComponentStore>) -> Self {
        Self {
            inner,
            searches: Mutex::new(Vec::new()),
        }
    }

    /// `(categoría, límite)` de cada búsqueda, en orden de llegada.
    pub fn searches(&self) -> Vec<(Option<String>, usize)> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ComponentStore for RecordingStore {
    async fn upsert(&self, record: &ComponentRecord) -> Result<()> {
        self.inner.upsert(record).await
    }

    async fn search(
        &self,
        query_vector: &[f64],
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        self.searches
            .lock()
            .unwrap()
            .push((category.map(str::to_string), limit));
        self.inner.search(query_vector, category, limit).await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}
