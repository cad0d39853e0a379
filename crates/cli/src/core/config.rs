//! # Daily Prompt Configuration
//!
//! Settings are resolved in order of precedence:
//! 1. Environment variables (`OPENAI_*`, `BREVO_*`, `HISTORY_*`, ...)
//! 2. Configuration file (`--config`, `DAILY_PROMPT_CONFIG`, or
//!    `daily-prompt.toml` in the working directory)
//! 3. Built-in defaults
//!
//! Credentials are read from the environment only. They are checked when a
//! service is about to be built, so commands that make no network calls
//! (`show`, `check`, `run --dry-run` for delivery) work without them.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use daily_prompt_backend_brevo::BrevoSettings;
use daily_prompt_backend_openai::OpenAiSettings;
use daily_prompt_common::Contact;
use serde::Deserialize;
use tracing::debug;

use super::errors::{DailyPromptError, DailyPromptResult};

pub const DEFAULT_HISTORY_PATH: &str = "data/journal_questions.jsonl";
pub const DEFAULT_HISTORY_TAIL: usize = 120;
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Moscow;
pub const DEFAULT_CONFIG_FILE: &str = "daily-prompt.toml";

const ENV_CONFIG_PATH: &str = "DAILY_PROMPT_CONFIG";

/// On-disk configuration file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub history: HistorySection,
    pub schedule: ScheduleSection,
    pub generation: GenerationSection,
    pub delivery: DeliverySection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistorySection {
    pub path: Option<PathBuf>,
    pub tail: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleSection {
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationSection {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub attempts: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeliverySection {
    pub sender_name: Option<String>,
    pub sender_email: Option<String>,
    pub to_name: Option<String>,
    pub to_email: Option<String>,
    pub base_url: Option<String>,
    pub subject_prefix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub attempts: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub api_key: Option<String>,
    pub sender_name: Option<String>,
    pub sender_email: Option<String>,
    pub to_name: Option<String>,
    pub to_email: Option<String>,
    pub base_url: String,
    pub subject_prefix: String,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub history_path: PathBuf,
    pub history_tail: usize,
    pub timezone: Tz,
    pub generation: GenerationConfig,
    pub delivery: DeliveryConfig,
    /// File the settings were read from, if any.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub fn builtin_defaults() -> Self {
        Self {
            history_path: PathBuf::from(DEFAULT_HISTORY_PATH),
            history_tail: DEFAULT_HISTORY_TAIL,
            timezone: DEFAULT_TIMEZONE,
            generation: GenerationConfig {
                api_key: None,
                model: daily_prompt_backend_openai::DEFAULT_MODEL.to_string(),
                base_url: daily_prompt_backend_openai::DEFAULT_BASE_URL.to_string(),
                attempts: 1,
                timeout: daily_prompt_backend_openai::DEFAULT_TIMEOUT,
            },
            delivery: DeliveryConfig {
                api_key: None,
                sender_name: None,
                sender_email: None,
                to_name: None,
                to_email: None,
                base_url: daily_prompt_backend_brevo::DEFAULT_BASE_URL.to_string(),
                subject_prefix: String::new(),
            },
            source: None,
        }
    }

    /// Loads settings from the standard sources and the process environment.
    pub fn load(path_override: Option<PathBuf>) -> DailyPromptResult<Self> {
        let lookup = |key: &str| env::var(key).ok();
        Self::from_sources(path_override, &lookup)
    }

    /// Same as [`AppConfig::load`] with an explicit variable lookup.
    pub fn from_sources(
        path_override: Option<PathBuf>,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> DailyPromptResult<Self> {
        let mut config = Self::builtin_defaults();

        if let Some(path) = discover_config_path(path_override, lookup)? {
            let file = read_config_file(&path)?;
            config.apply_file(&file)?;
            debug!(path = %path.display(), "configuration file loaded");
            config.source = Some(path);
        }

        config.apply_env_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: &FileConfig) -> DailyPromptResult<()> {
        if let Some(path) = &file.history.path {
            self.history_path = path.clone();
        }
        if let Some(tail) = file.history.tail {
            self.history_tail = tail;
        }
        if let Some(tz) = &file.schedule.timezone {
            self.timezone = parse_timezone("schedule.timezone", tz)?;
        }

        let generation = &file.generation;
        if let Some(model) = &generation.model {
            self.generation.model = model.clone();
        }
        if let Some(url) = &generation.base_url {
            self.generation.base_url = url.clone();
        }
        if let Some(attempts) = generation.attempts {
            self.generation.attempts = attempts;
        }
        if let Some(secs) = generation.timeout_secs {
            self.generation.timeout = Duration::from_secs(secs);
        }

        let delivery = &file.delivery;
        merge(&mut self.delivery.sender_name, &delivery.sender_name);
        merge(&mut self.delivery.sender_email, &delivery.sender_email);
        merge(&mut self.delivery.to_name, &delivery.to_name);
        merge(&mut self.delivery.to_email, &delivery.to_email);
        if let Some(url) = &delivery.base_url {
            self.delivery.base_url = url.clone();
        }
        if let Some(prefix) = &delivery.subject_prefix {
            self.delivery.subject_prefix = prefix.trim().to_string();
        }
        Ok(())
    }

    fn apply_env_overrides(
        &mut self,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> DailyPromptResult<()> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(path) = get("HISTORY_PATH") {
            self.history_path = PathBuf::from(path);
        }
        if let Some(tail) = get("HISTORY_TAIL") {
            self.history_tail = tail.parse::<usize>().map_err(|_| {
                DailyPromptError::config(
                    "HISTORY_TAIL",
                    format!("'{tail}' is not a non-negative integer"),
                )
            })?;
        }
        if let Some(tz) = get("TARGET_TIMEZONE") {
            self.timezone = parse_timezone("TARGET_TIMEZONE", &tz)?;
        }

        if let Some(key) = get("OPENAI_API_KEY") {
            self.generation.api_key = Some(key);
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.generation.model = model;
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.generation.base_url = url;
        }
        if let Some(attempts) = get("GENERATION_ATTEMPTS") {
            self.generation.attempts = attempts.parse::<u32>().map_err(|_| {
                DailyPromptError::config(
                    "GENERATION_ATTEMPTS",
                    format!("'{attempts}' is not a positive integer"),
                )
            })?;
        }
        if let Some(secs) = get("GENERATION_TIMEOUT_SECS") {
            let secs = secs.parse::<u64>().map_err(|_| {
                DailyPromptError::config(
                    "GENERATION_TIMEOUT_SECS",
                    format!("'{secs}' is not a number of seconds"),
                )
            })?;
            self.generation.timeout = Duration::from_secs(secs);
        }

        if let Some(key) = get("BREVO_API_KEY") {
            self.delivery.api_key = Some(key);
        }
        merge(&mut self.delivery.sender_name, &get("BREVO_SENDER_NAME"));
        merge(&mut self.delivery.sender_email, &get("BREVO_SENDER_EMAIL"));
        merge(&mut self.delivery.to_name, &get("BREVO_TO_NAME"));
        merge(&mut self.delivery.to_email, &get("BREVO_TO_EMAIL"));
        if let Some(url) = get("BREVO_BASE_URL") {
            self.delivery.base_url = url;
        }
        // An explicitly empty prefix is meaningful, so it is not filtered.
        if let Some(prefix) = lookup("SUBJECT_PREFIX") {
            self.delivery.subject_prefix = prefix.trim().to_string();
        }
        Ok(())
    }

    fn validate(&self) -> DailyPromptResult<()> {
        if self.generation.attempts == 0 {
            return Err(DailyPromptError::config(
                "GENERATION_ATTEMPTS",
                "must be at least 1",
            ));
        }
        if self.generation.timeout.is_zero() {
            return Err(DailyPromptError::config(
                "GENERATION_TIMEOUT_SECS",
                "must be greater than zero",
            ));
        }
        if self.history_path.as_os_str().is_empty() {
            return Err(DailyPromptError::config("HISTORY_PATH", "must not be empty"));
        }
        Ok(())
    }

    /// Settings for the generation backend. Fails when the API key is absent.
    pub fn generation_settings(&self) -> DailyPromptResult<OpenAiSettings> {
        let api_key = self
            .generation
            .api_key
            .clone()
            .ok_or_else(|| DailyPromptError::config("OPENAI_API_KEY", "missing required value"))?;
        let mut settings = OpenAiSettings::new(api_key);
        settings.model = self.generation.model.clone();
        settings.base_url = self.generation.base_url.clone();
        settings.timeout = self.generation.timeout;
        Ok(settings)
    }

    /// Settings, sender and recipient for the delivery backend.
    pub fn delivery_settings(&self) -> DailyPromptResult<(BrevoSettings, Contact, Contact)> {
        let d = &self.delivery;
        let api_key = required("BREVO_API_KEY", &d.api_key)?;
        let sender = Contact {
            name: required("BREVO_SENDER_NAME", &d.sender_name)?,
            email: email("BREVO_SENDER_EMAIL", &d.sender_email)?,
        };
        let recipient = Contact {
            name: required("BREVO_TO_NAME", &d.to_name)?,
            email: email("BREVO_TO_EMAIL", &d.to_email)?,
        };

        let mut settings = BrevoSettings::new(api_key);
        settings.base_url = d.base_url.clone();
        Ok((settings, sender, recipient))
    }
}

fn merge(target: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = value {
        *target = Some(v.clone());
    }
}

fn required(key: &str, value: &Option<String>) -> DailyPromptResult<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DailyPromptError::config(key, "missing required value"))
}

fn email(key: &str, value: &Option<String>) -> DailyPromptResult<String> {
    let value = required(key, value)?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(value),
        _ => Err(DailyPromptError::config(
            key,
            format!("'{value}' is not an email address"),
        )),
    }
}

fn parse_timezone(key: &str, value: &str) -> DailyPromptResult<Tz> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|_| DailyPromptError::config(key, format!("unknown time zone '{value}'")))
}

fn discover_config_path(
    path_override: Option<PathBuf>,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> DailyPromptResult<Option<PathBuf>> {
    if let Some(path) = path_override {
        if !path.exists() {
            return Err(DailyPromptError::config(
                "--config",
                format!("file '{}' does not exist", path.display()),
            ));
        }
        return Ok(Some(path));
    }

    if let Some(from_env) = lookup(ENV_CONFIG_PATH) {
        let trimmed = from_env.trim();
        if !trimmed.is_empty() {
            let path = PathBuf::from(trimmed);
            if !path.exists() {
                return Err(DailyPromptError::config(
                    ENV_CONFIG_PATH,
                    format!("file '{}' does not exist", path.display()),
                ));
            }
            return Ok(Some(path));
        }
    }

    let candidate = Path::new(DEFAULT_CONFIG_FILE);
    Ok(candidate.exists().then(|| candidate.to_path_buf()))
}

fn read_config_file(path: &Path) -> DailyPromptResult<FileConfig> {
    let contents = fs::read_to_string(path)
        .map_err(|e| DailyPromptError::io(path.to_path_buf(), "read configuration file", e))?;
    toml::from_str(&contents).map_err(|e| {
        DailyPromptError::config(path.display().to_string(), e.message().to_string())
    })
}
