use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::policy::{RetrievalPolicy, DEFAULT_SIMILARITY_THRESHOLD};
use crate::services::GenerationParams;

/// What to do with a turn when the moderation service cannot be reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationFailureMode {
    /// Refuse the turn; nothing reaches retrieval or the fallback.
    #[default]
    Block,
    /// Log a warning and process the turn unmoderated.
    Allow,
}

/// One interview table on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusSource {
    pub name: String,
    pub path: PathBuf,
}

impl CorpusSource {
    pub fn new(name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// User-facing texts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub instructions: String,
    pub greeting: String,
    pub moderation_rejection: String,
    pub moderation_unavailable: String,
    pub fallback_failure: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            instructions: "Eres un chatbot experto en orientación académica para estudiantes de \
                Ingeniería Informática. Tu objetivo es ayudar a los estudiantes a descubrir su \
                especialidad ideal dentro de la carrera. Si no tienes una respuesta directa en \
                tus datos, proporciona una respuesta general y útil."
                .to_string(),
            greeting: "¡Hola! Soy tu asistente virtual para elegir la especialidad ideal en \
                Ingeniería Informática. Para comenzar, cuéntame un poco sobre ti."
                .to_string(),
            moderation_rejection: "Por favor, mantengamos la conversación respetuosa.".to_string(),
            moderation_unavailable: "No pude verificar tu mensaje en este momento. Por favor, \
                inténtalo de nuevo en unos instantes."
                .to_string(),
            fallback_failure: "Lo siento, no pude generar una respuesta en este momento. Por \
                favor, inténtalo de nuevo más tarde."
                .to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub chat_model: String,
    pub moderation_model: Option<String>,
    pub moderation_enabled: bool,
    pub moderation_on_error: ModerationFailureMode,
    pub similarity_threshold: f32,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub request_retries: usize,
    /// Persisted index to load instead of re-reading the CSV sources.
    pub index_path: Option<PathBuf>,
    pub corpus_sources: Vec<CorpusSource>,
    pub prompts: Prompts,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            moderation_model: None,
            moderation_enabled: true,
            moderation_on_error: ModerationFailureMode::Block,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            temperature: 0.1,
            max_tokens: 1000,
            request_timeout_secs: 20,
            request_retries: 0,
            index_path: None,
            corpus_sources: vec![
                CorpusSource::new("maestros", "Entrevistas_maestros.csv"),
                CorpusSource::new("estudiantes", "Entrevistas_estudiantes.csv"),
            ],
            prompts: Prompts::default(),
        }
    }
}

impl AppConfig {
    pub fn policy(&self) -> RetrievalPolicy {
        RetrievalPolicy::new(self.similarity_threshold)
    }

    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::Message(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Message("max_tokens must be positive".to_string()));
        }
        Ok(())
    }
}

/// Load configuration from `counsel.{toml,yaml,json}` in the working
/// directory (optional), then `path` when given (required), then environment
/// variables (`OPENAI_API_KEY`, `SIMILARITY_THRESHOLD`, ...).
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut builder = Config::builder().add_source(File::with_name("counsel").required(false));
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }
    let config: AppConfig = builder
        .add_source(Environment::default().try_parsing(true))
        .build()?
        .try_deserialize()?;
    config.validate()?;
    Ok(config)
}

pub fn get_config() -> Result<AppConfig> {
    load_config(None)
}
