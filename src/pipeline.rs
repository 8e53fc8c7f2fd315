//! Pipeline de generación de páginas (RAG sobre componentes).
//!
//! Máquina de estados secuencial, sin reintentos:
//!   ParsingIntent → Retrieving → Composing → Customizing → Done
//! Cualquier fallo lleva al estado terminal `GenerationFailure`, que indica
//! la etapa; los resultados parciales se descartan.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    llm::{ChatModel, CompletionRequest, TokenUsage},
    models::{Intent, RetrievalResult},
    prompts,
    retriever::Retriever,
    sanitizer::clean_completion,
};

const INTENT_TEMPERATURE: f64 = 0.1;
const COMPOSITION_TEMPERATURE: f64 = 0.3;
const UNIQUENESS_TEMPERATURE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStage {
    ParsingIntent,
    Retrieving,
    Composing,
    Customizing,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ParsingIntent => "ParsingIntent",
            Self::Retrieving => "Retrieving",
            Self::Composing => "Composing",
            Self::Customizing => "Customizing",
        };
        f.write_str(name)
    }
}

/// Estado terminal de fallo: la etapa donde se cortó y la causa.
#[derive(Debug, thiserror::Error)]
#[error("la generación falló en la etapa {stage}: {cause:#}")]
pub struct GenerationFailure {
    pub stage: PipelineStage,
    pub cause: anyhow::Error,
}

/// Resultado de una generación completa.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPage {
    pub code: String,
    pub components_used: Vec<String>,
    pub generation_time_ms: u64,
}

enum GenerationState {
    ParsingIntent,
    Retrieving { categories: Vec<String> },
    Composing { selected: Vec<RetrievalResult> },
    Customizing { components_used: Vec<String>, draft: String },
    Done { components_used: Vec<String>, code: String },
}

impl GenerationState {
    /// Etapa que ejecuta la transición desde este estado. `Done` ya no
    /// transiciona; se reporta como la última etapa.
    fn stage(&self) -> PipelineStage {
        match self {
            Self::ParsingIntent => PipelineStage::ParsingIntent,
            Self::Retrieving { .. } => PipelineStage::Retrieving,
            Self::Composing { .. } => PipelineStage::Composing,
            Self::Customizing { .. } | Self::Done { .. } => PipelineStage::Customizing,
        }
    }
}

/// Modelos y límites usados por las llamadas al LLM.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub intent_model: String,
    pub compose_model: String,
    pub max_tokens: u64,
    /// Categorías por defecto si la intención no trae `requiredComponents`.
    pub default_categories: Vec<String>,
}

impl GenerationSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            intent_model: cfg.llm_intent_model.clone(),
            compose_model: cfg.llm_compose_model.clone(),
            max_tokens: cfg.llm_max_tokens,
            default_categories: cfg.supported_categories.clone(),
        }
    }
}

#[derive(Clone)]
pub struct PageGenerator {
    chat: Arc<dyn ChatModel>,
    retriever: Retriever,
    settings: GenerationSettings,
}

impl PageGenerator {
    pub fn new(chat: Arc<dyn ChatModel>, retriever: Retriever, settings: GenerationSettings) -> Self {
        Self {
            chat,
            retriever,
            settings,
        }
    }

    /// Ejecuta el pipeline completo para un prompt de usuario.
    pub async fn generate(&self, prompt: &str) -> Result<GeneratedPage, GenerationFailure> {
        let span = info_span!("generation", request_id = %Uuid::new_v4());
        self.run(prompt).instrument(span).await
    }

    async fn run(&self, prompt: &str) -> Result<GeneratedPage, GenerationFailure> {
        let started = Instant::now();
        info!("Nueva petición de generación: '{prompt}'");

        let mut usage = TokenUsage::default();
        let mut state = GenerationState::ParsingIntent;
        let (components_used, code) = loop {
            state = match state {
                GenerationState::Done {
                    components_used,
                    code,
                } => break (components_used, code),
                pending => {
                    let stage = pending.stage();
                    self.advance(prompt, pending, &mut usage).await.map_err(|cause| {
                        error!("Fallo en la etapa {stage}: {cause:#}");
                        GenerationFailure { stage, cause }
                    })?
                }
            };
        };

        let generation_time_ms = started.elapsed().as_millis() as u64;
        info!(
            "Generación completada en {generation_time_ms} ms con componentes: {}",
            components_used.join(", ")
        );
        info!(
            "Tokens totales: {} ({} entrada, {} salida)",
            usage.total(),
            usage.input_tokens,
            usage.output_tokens
        );
        Ok(GeneratedPage {
            code,
            components_used,
            generation_time_ms,
        })
    }

    async fn advance(
        &self,
        prompt: &str,
        state: GenerationState,
        usage: &mut TokenUsage,
    ) -> Result<GenerationState> {
        match state {
            GenerationState::ParsingIntent => {
                let intent = self.parse_intent(prompt, usage).await?;
                let categories = intent
                    .required_components
                    .unwrap_or_else(|| self.settings.default_categories.clone())
                    .into_iter()
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>();
                info!(
                    "Intención: tipo '{}', categorías {:?}, estilo {:?}, contenido {:?}",
                    intent.site_type, categories, intent.style_hints, intent.content_hints
                );
                Ok(GenerationState::Retrieving { categories })
            }
            GenerationState::Retrieving { categories } => {
                let selected = self.retriever.retrieve(prompt, &categories).await?;
                let (lines, chars) = selected.iter().fold((0, 0), |(l, c), r| {
                    (l + r.record.code.lines().count(), c + r.record.code.len())
                });
                info!(
                    "{} componentes pre-escritos recuperados ({lines} líneas, {chars} caracteres)",
                    selected.len()
                );
                Ok(GenerationState::Composing { selected })
            }
            GenerationState::Composing { selected } => {
                let context = prompts::components_context(&selected);
                let raw = self
                    .complete(
                        CompletionRequest {
                            stage: PipelineStage::Composing,
                            model: self.settings.compose_model.clone(),
                            preamble: prompts::COMPOSITION_PREAMBLE.to_string(),
                            prompt: prompts::composition_prompt(prompt, &context),
                            temperature: COMPOSITION_TEMPERATURE,
                            max_tokens: Some(self.settings.max_tokens),
                            json_response: false,
                        },
                        usage,
                    )
                    .await
                    .context("error en la llamada de composición")?;
                let draft = clean_completion(&raw);
                info!("Composición lista ({} caracteres)", draft.len());
                Ok(GenerationState::Customizing {
                    components_used: selected.into_iter().map(|r| r.component_id).collect(),
                    draft,
                })
            }
            GenerationState::Customizing {
                components_used,
                draft,
            } => {
                let raw = self
                    .complete(
                        CompletionRequest {
                            stage: PipelineStage::Customizing,
                            model: self.settings.compose_model.clone(),
                            preamble: prompts::UNIQUENESS_PREAMBLE.to_string(),
                            prompt: prompts::uniqueness_prompt(prompt, &draft),
                            temperature: UNIQUENESS_TEMPERATURE,
                            max_tokens: Some(self.settings.max_tokens),
                            json_response: false,
                        },
                        usage,
                    )
                    .await
                    .context("error en la llamada de personalización")?;
                Ok(GenerationState::Done {
                    components_used,
                    code: clean_completion(&raw),
                })
            }
            GenerationState::Done { .. } => Err(anyhow!("el pipeline ya había terminado")),
        }
    }

    async fn parse_intent(&self, prompt: &str, usage: &mut TokenUsage) -> Result<Intent> {
        let raw = self
            .complete(
                CompletionRequest {
                    stage: PipelineStage::ParsingIntent,
                    model: self.settings.intent_model.clone(),
                    preamble: prompts::intent_preamble(&self.settings.default_categories),
                    prompt: prompts::intent_prompt(prompt),
                    temperature: INTENT_TEMPERATURE,
                    max_tokens: None,
                    json_response: true,
                },
                usage,
            )
            .await
            .context("error en la llamada de intención")?;
        parse_intent_json(&raw)
    }

    /// Llama al LLM, registra el consumo de la etapa y lo suma al total.
    async fn complete(&self, request: CompletionRequest, usage: &mut TokenUsage) -> Result<String> {
        let response = self.chat.complete(&request).await?;
        info!(
            "Etapa {}: {} tokens de entrada, {} de salida",
            request.stage, response.usage.input_tokens, response.usage.output_tokens
        );
        *usage += response.usage;
        Ok(response.text)
    }
}

/// Parsea la intención devuelta por el LLM. No hay reparación: si no es un
/// objeto JSON con la forma esperada, la petición falla.
pub fn parse_intent_json(raw: &str) -> Result<Intent> {
    let json = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str::<Intent>(json)
        .with_context(|| format!("la intención no es un JSON válido: '{raw}'"))
}
