//! Abstracción sobre Rig para trabajar con distintos proveedores de LLM.
//! De momento se implementa OpenAI; Gemini/Ollama quedan preparados para el futuro.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rig::completion::Prompt;
use serde_json::json;
use tracing::debug;

use crate::config::{AppConfig, LlmProvider};
use crate::pipeline::PipelineStage;

/// Una llamada de completado tal y como la emite el orquestador.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Etapa del pipeline que hace la llamada (sólo informativa).
    pub stage: PipelineStage,
    pub model: String,
    pub preamble: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: Option<u64>,
    /// Pide al proveedor una respuesta en modo objeto JSON.
    pub json_response: bool,
}

/// Tokens consumidos por una o varias llamadas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<ChatResponse>;
}

/// Gestor de chat sobre los clientes de Rig.
#[derive(Debug, Clone)]
pub struct RigChatModel {
    pub provider: LlmProvider,
}

impl RigChatModel {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            provider: cfg.llm_provider.clone(),
        }
    }

    async fn complete_with_openai(&self, request: &CompletionRequest) -> Result<ChatResponse> {
        use rig::client::CompletionClient as _;
        use rig::providers::openai;

        debug!(
            "Llamada al LLM en la etapa {} (modelo {}, temperatura {})",
            request.stage, request.model, request.temperature
        );
        let client = openai::Client::from_env();

        let mut builder = client
            .agent(&request.model)
            .preamble(&request.preamble)
            .temperature(request.temperature);
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        if request.json_response {
            builder = builder.additional_params(json!({ "response_format": { "type": "json_object" } }));
        }
        let agent = builder.build();

        let response = agent
            .prompt(request.prompt.as_str())
            .extended_details()
            .await?;
        Ok(ChatResponse {
            text: response.output,
            usage: TokenUsage {
                input_tokens: response.total_usage.input_tokens,
                output_tokens: response.total_usage.output_tokens,
            },
        })
    }
}

#[async_trait]
impl ChatModel for RigChatModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<ChatResponse> {
        match self.provider {
            LlmProvider::OpenAI => self.complete_with_openai(request).await,
            ref other => Err(anyhow!(
                "Proveedor LLM {:?} aún no implementado para chat",
                other
            )),
        }
    }
}
