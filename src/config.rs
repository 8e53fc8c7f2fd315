//! Carga y gestión de configuración de la aplicación (Neo4j + LLM + pipeline).

use std::env;
use std::path::PathBuf;
use anyhow::{anyhow, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum LlmProvider {
    OpenAI,
    Gemini,
    Ollama,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(anyhow!("Proveedor LLM no soportado: {other}")),
        }
    }
}

/// Dónde viven los componentes y sus embeddings.
#[derive(Clone, Debug, PartialEq)]
pub enum StoreBackend {
    Neo4j,
    /// Almacén en proceso, rellenado con el corpus al arrancar.
    Memory,
}

impl StoreBackend {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "neo4j" => Ok(Self::Neo4j),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("Vector store no soportado: {other}")),
        }
    }
}

/// Qué hacer cuando una categoría pedida no tiene ningún componente.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingCategoryPolicy {
    /// La categoría desaparece de la página sin error.
    Skip,
    /// La petición falla indicando la categoría vacía.
    Fail,
}

impl MissingCategoryPolicy {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "fail" => Ok(Self::Fail),
            other => Err(anyhow!("Política de categoría vacía no soportada: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetrievalMode {
    Sequential,
    Concurrent,
}

impl RetrievalMode {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            other => Err(anyhow!("Modo de recuperación no soportado: {other}")),
        }
    }
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub server_addr: String,
    pub store_backend: StoreBackend,

    pub llm_provider: LlmProvider,
    pub llm_embedding_model: String,
    pub embedding_dimensions: usize,
    pub llm_intent_model: String,
    pub llm_compose_model: String,
    pub llm_max_tokens: u64,

    pub components_dir: PathBuf,
    pub supported_categories: Vec<String>,
    pub missing_category_policy: MissingCategoryPolicy,
    pub retrieval_mode: RetrievalMode,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construye la configuración a partir de una función de búsqueda de claves.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let store_backend = StoreBackend::from_str(&var_or("VECTOR_STORE", "neo4j"))?;

        // Las credenciales de Neo4j sólo son obligatorias si se usa Neo4j.
        let required = |key: &str| -> Result<String> {
            match (lookup(key), &store_backend) {
                (Some(value), _) => Ok(value),
                (None, StoreBackend::Memory) => Ok(String::new()),
                (None, StoreBackend::Neo4j) => Err(anyhow!("Falta {key} en el entorno")),
            }
        };
        let neo4j_uri = required("NEO4J_URI")?;
        let neo4j_user = required("NEO4J_USER")?;
        let neo4j_password = required("NEO4J_PASSWORD")?;

        let server_addr = var_or("SERVER_ADDR", "127.0.0.1:8000");

        let llm_provider = LlmProvider::from_str(&var_or("LLM_PROVIDER", "openai"))?;
        let llm_embedding_model = var_or("LLM_EMBEDDING_MODEL", "text-embedding-3-small");
        let embedding_dimensions = var_or("EMBEDDING_DIMENSIONS", "384")
            .parse::<usize>()
            .map_err(|e| anyhow!("EMBEDDING_DIMENSIONS inválido: {e}"))?;
        if embedding_dimensions == 0 {
            return Err(anyhow!("EMBEDDING_DIMENSIONS debe ser mayor que 0"));
        }
        let llm_intent_model = var_or("LLM_INTENT_MODEL", "gpt-4o-mini");
        let llm_compose_model = var_or("LLM_COMPOSE_MODEL", "gpt-4o");
        let llm_max_tokens = var_or("LLM_MAX_TOKENS", "4000")
            .parse::<u64>()
            .map_err(|e| anyhow!("LLM_MAX_TOKENS inválido: {e}"))?;

        let components_dir = PathBuf::from(var_or("COMPONENTS_DIR", "./components"));
        let supported_categories: Vec<String> = var_or("SUPPORTED_CATEGORIES", "navigation,hero,footer")
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if supported_categories.is_empty() {
            return Err(anyhow!("SUPPORTED_CATEGORIES no puede estar vacío"));
        }

        let missing_category_policy =
            MissingCategoryPolicy::from_str(&var_or("MISSING_CATEGORY_POLICY", "skip"))?;
        let retrieval_mode = RetrievalMode::from_str(&var_or("RETRIEVAL_MODE", "sequential"))?;

        Ok(Self {
            neo4j_uri,
            neo4j_user,
            neo4j_password,
            server_addr,
            store_backend,
            llm_provider,
            llm_embedding_model,
            embedding_dimensions,
            llm_intent_model,
            llm_compose_model,
            llm_max_tokens,
            components_dir,
            supported_categories,
            missing_category_policy,
            retrieval_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn memory_backend_applies_defaults() {
        let cfg = AppConfig::from_lookup(lookup_from(&[("VECTOR_STORE", "memory")])).unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Memory);
        assert_eq!(cfg.embedding_dimensions, 384);
        assert_eq!(cfg.llm_intent_model, "gpt-4o-mini");
        assert_eq!(cfg.llm_compose_model, "gpt-4o");
        assert_eq!(cfg.llm_max_tokens, 4000);
        assert_eq!(cfg.supported_categories, vec!["navigation", "hero", "footer"]);
        assert_eq!(cfg.missing_category_policy, MissingCategoryPolicy::Skip);
        assert_eq!(cfg.retrieval_mode, RetrievalMode::Sequential);
    }

    #[test]
    fn neo4j_backend_requires_credentials() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("NEO4J_URI"));
    }

    #[test]
    fn parses_overrides() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("NEO4J_URI", "neo4j://db:7687"),
            ("NEO4J_USER", "neo4j"),
            ("NEO4J_PASSWORD", "secret"),
            ("SUPPORTED_CATEGORIES", " hero , pricing ,"),
            ("MISSING_CATEGORY_POLICY", "FAIL"),
            ("RETRIEVAL_MODE", "concurrent"),
            ("EMBEDDING_DIMENSIONS", "1536"),
        ]))
        .unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Neo4j);
        assert_eq!(cfg.supported_categories, vec!["hero", "pricing"]);
        assert_eq!(cfg.missing_category_policy, MissingCategoryPolicy::Fail);
        assert_eq!(cfg.retrieval_mode, RetrievalMode::Concurrent);
        assert_eq!(cfg.embedding_dimensions, 1536);
    }

    #[test]
    fn rejects_unknown_values() {
        assert!(AppConfig::from_lookup(lookup_from(&[
            ("VECTOR_STORE", "memory"),
            ("MISSING_CATEGORY_POLICY", "maybe"),
        ]))
        .is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[
            ("VECTOR_STORE", "memory"),
            ("EMBEDDING_DIMENSIONS", "0"),
        ]))
        .is_err());
        assert!(LlmProvider::from_str("anthropic").is_err());
    }
}
