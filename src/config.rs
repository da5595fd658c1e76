use crate::error::{PressError, PressResult};
use crate::logger::LogLevel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit settings file
pub const CONFIG_ENV: &str = "MEDIAPRESS_CONFIG";

/// Default OpenAI-compatible endpoints
pub const DEFAULT_TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
pub const DEFAULT_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Application settings
///
/// Every field has a default, so a settings file only needs the keys it
/// changes. Provider availability is derived from these values alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub extractor: ExtractorSettings,
    pub transcriber: TranscriberSettings,
    pub generator: ChatSettings,
    pub evaluator: ChatSettings,
    pub publisher: PublisherSettings,
    pub pipeline: PipelineSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorSettings {
    /// ffmpeg executable (name on PATH or absolute path)
    pub ffmpeg_path: String,
    pub sample_rate: u32,
    pub timeout_secs: u64,
    /// Where extracted audio is written; system temp dir when unset
    pub work_dir: Option<PathBuf>,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            sample_rate: 16000,
            timeout_secs: 600,
            work_dir: None,
        }
    }
}

impl ExtractorSettings {
    pub fn is_configured(&self) -> bool {
        !self.ffmpeg_path.trim().is_empty() && self.sample_rate > 0
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("mediapress"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriberSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// ISO-639-1 hint, e.g. "en"
    pub language: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TranscriberSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_TRANSCRIPTION_URL.to_string(),
            api_key: None,
            model: "whisper-1".to_string(),
            language: None,
            timeout_secs: 300,
        }
    }
}

impl TranscriberSettings {
    pub fn is_configured(&self) -> bool {
        has_value(&self.api_key) && !self.api_url.trim().is_empty()
    }
}

/// Settings for a chat-completion backed provider (generator, evaluator)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// System prompt; the provider's built-in prompt when unset
    pub prompt: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_CHAT_URL.to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            prompt: None,
            timeout_secs: 120,
        }
    }
}

impl ChatSettings {
    pub fn is_configured(&self) -> bool {
        has_value(&self.api_key) && !self.api_url.trim().is_empty() && !self.model.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherSettings {
    pub endpoint: Option<String>,
    pub api_token: Option<String>,
    /// Post status sent to the content host
    pub status: String,
    pub timeout_secs: u64,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_token: None,
            status: "draft".to_string(),
            timeout_secs: 60,
        }
    }
}

impl PublisherSettings {
    pub fn is_configured(&self) -> bool {
        has_value(&self.endpoint)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Upper bound for any single stage, on top of provider timeouts
    pub stage_timeout_secs: Option<u64>,
    /// Publish the generated draft when no evaluator is configured
    pub publish_unevaluated_draft: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingSettings {
    pub fn level(&self) -> LogLevel {
        LogLevel::parse(&self.level).unwrap_or(LogLevel::Info)
    }
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Default settings file: `<config_dir>/mediapress/settings.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mediapress").join("settings.json"))
    }

    /// Load settings.
    ///
    /// Order: defaults, then the settings file (`path`, `$MEDIAPRESS_CONFIG`,
    /// or the default path if it exists), then environment overrides. A
    /// `.env` file in the working directory is read first.
    pub fn load(path: Option<&Path>) -> PressResult<Self> {
        let _ = dotenvy::dotenv();

        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| non_empty(std::env::var(CONFIG_ENV).ok()).map(PathBuf::from));

        let mut settings = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Read a settings file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> PressResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PressError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            PressError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Write settings as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> PressResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment overrides using `lookup` to read variables
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| non_empty(lookup(key));

        if let Some(key) = get("OPENAI_API_KEY") {
            for slot in [
                &mut self.transcriber.api_key,
                &mut self.generator.api_key,
                &mut self.evaluator.api_key,
            ] {
                if !has_value(slot) {
                    *slot = Some(key.clone());
                }
            }
        }
        if let Some(key) = get("MEDIAPRESS_TRANSCRIBE_KEY") {
            self.transcriber.api_key = Some(key);
        }
        if let Some(key) = get("MEDIAPRESS_CHAT_KEY") {
            self.generator.api_key = Some(key.clone());
            self.evaluator.api_key = Some(key);
        }
        if let Some(endpoint) = get("MEDIAPRESS_PUBLISH_ENDPOINT") {
            self.publisher.endpoint = Some(endpoint);
        }
        if let Some(token) = get("MEDIAPRESS_PUBLISH_TOKEN") {
            self.publisher.api_token = Some(token);
        }
        if let Some(ffmpeg) = get("MEDIAPRESS_FFMPEG") {
            self.extractor.ffmpeg_path = ffmpeg;
        }
    }

    /// Reject values no provider can work with
    pub fn validate(&self) -> PressResult<()> {
        let timeouts = [
            ("extractor.timeout_secs", self.extractor.timeout_secs),
            ("transcriber.timeout_secs", self.transcriber.timeout_secs),
            ("generator.timeout_secs", self.generator.timeout_secs),
            ("evaluator.timeout_secs", self.evaluator.timeout_secs),
            ("publisher.timeout_secs", self.publisher.timeout_secs),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(PressError::ConfigError(format!("{} must be positive", name)));
            }
        }
        if self.pipeline.stage_timeout_secs == Some(0) {
            return Err(PressError::ConfigError(
                "pipeline.stage_timeout_secs must be positive".to_string(),
            ));
        }
        if LogLevel::parse(&self.logging.level).is_none() {
            return Err(PressError::ConfigError(format!(
                "unknown logging.level '{}'",
                self.logging.level
            )));
        }
        Ok(())
    }
}
