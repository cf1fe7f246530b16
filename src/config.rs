use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_BANNED_PHRASES: &[&str] = &[
    "what is",
    "define",
    "is known as",
    "which of the following",
    "choose the correct",
    "true or false",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub demo_mode: bool,
    pub dispatch: DispatchSettings,
    pub generation: GenerationSettings,
    pub fallback: FallbackSettings,
    pub llm: LlmSettings,
}

/// Both timeout scopes of the worker slot.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub generation_timeout: Duration,
    pub slot_wait_timeout: Duration,
    pub cancel_abandoned_runs: bool,
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub target_mcq: usize,
    pub target_msq: usize,
    pub target_nat: usize,
    pub total: usize,
    pub attempts_per_phase: usize,
    pub time_budget: Duration,
    pub banned_phrases: Vec<String>,
    pub min_question_chars: usize,
}

#[derive(Debug, Clone)]
pub struct FallbackSettings {
    pub root: PathBuf,
    pub partitions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub http_timeout: Duration,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Default for Config {
    fn default() -> Self {
        Self {
            server_address: "0.0.0.0:7000".to_string(),
            demo_mode: true,
            dispatch: DispatchSettings::default(),
            generation: GenerationSettings::default(),
            fallback: FallbackSettings::default(),
            llm: LlmSettings::default(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            generation_timeout: Duration::from_secs(10),
            slot_wait_timeout: Duration::from_secs(300),
            cancel_abandoned_runs: false,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            target_mcq: 10,
            target_msq: 5,
            target_nat: 5,
            total: 20,
            attempts_per_phase: 2,
            time_budget: Duration::from_secs(70),
            banned_phrases: DEFAULT_BANNED_PHRASES.iter().map(|s| s.to_string()).collect(),
            min_question_chars: 30,
        }
    }
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("demo_quizzes"),
            partitions: vec![
                "ADA_JSON".to_string(),
                "DSA_JSON".to_string(),
                "OS_JSON".to_string(),
            ],
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 480,
            temperature: 0.45,
            http_timeout: Duration::from_secs(120),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let d = Self::default();

        let generation = GenerationSettings {
            target_mcq: get_env_parse_or("QUIZ_TARGET_MCQ", d.generation.target_mcq)?,
            target_msq: get_env_parse_or("QUIZ_TARGET_MSQ", d.generation.target_msq)?,
            target_nat: get_env_parse_or("QUIZ_TARGET_NAT", d.generation.target_nat)?,
            total: get_env_parse_or("QUIZ_TOTAL", d.generation.total)?,
            attempts_per_phase: get_env_parse_or("QUIZ_RETRIES", d.generation.attempts_per_phase)?,
            time_budget: get_env_secs_or("QUIZ_TIMEOUT_SECS", d.generation.time_budget)?,
            banned_phrases: get_env_list("QUIZ_BANNED_PHRASES")
                .map(|list| list.into_iter().map(|p| p.to_lowercase()).collect())
                .unwrap_or(d.generation.banned_phrases),
            min_question_chars: get_env_parse_or(
                "QUIZ_MIN_QUESTION_CHARS",
                d.generation.min_question_chars,
            )?,
        };
        generation.check_quotas()?;

        Ok(Self {
            server_address: env::var("SERVER_ADDRESS").unwrap_or(d.server_address),
            demo_mode: get_env_bool_or("DEMO_MODE", d.demo_mode)?,
            dispatch: DispatchSettings {
                generation_timeout: get_env_secs_or(
                    "GENERATION_TIMEOUT_SECS",
                    d.dispatch.generation_timeout,
                )?,
                slot_wait_timeout: get_env_secs_or(
                    "SLOT_WAIT_TIMEOUT_SECS",
                    d.dispatch.slot_wait_timeout,
                )?,
                cancel_abandoned_runs: get_env_bool_or(
                    "CANCEL_ABANDONED_RUNS",
                    d.dispatch.cancel_abandoned_runs,
                )?,
            },
            generation,
            fallback: FallbackSettings {
                root: env::var("FALLBACK_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(d.fallback.root),
                partitions: get_env_list("FALLBACK_PARTITIONS").unwrap_or(d.fallback.partitions),
            },
            llm: LlmSettings {
                api_key: env::var("LLM_API_KEY").unwrap_or(d.llm.api_key),
                base_url: env::var("LLM_BASE_URL").unwrap_or(d.llm.base_url),
                model: env::var("LLM_MODEL").unwrap_or(d.llm.model),
                max_tokens: get_env_parse_or("QUIZ_MAX_TOKENS", d.llm.max_tokens)?,
                temperature: get_env_parse_or("QUIZ_TEMPERATURE", d.llm.temperature)?,
                http_timeout: get_env_secs_or("LLM_HTTP_TIMEOUT_SECS", d.llm.http_timeout)?,
            },
        })
    }
}

impl GenerationSettings {
    pub fn check_quotas(&self) -> Result<()> {
        let sum = self.target_mcq + self.target_msq + self.target_nat;
        if sum != self.total {
            return Err(Error::Config(format!(
                "QUIZ_TOTAL is {} but per-type targets sum to {}",
                self.total, sum
            )));
        }
        if self.attempts_per_phase == 0 {
            return Err(Error::Config("QUIZ_RETRIES must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        _ => Ok(default),
    }
}

fn get_env_bool_or(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(Error::Config(format!(
                "Invalid value for {}: expected a boolean, got '{}'",
                name, other
            ))),
        },
        Err(_) => Ok(default),
    }
}

fn get_env_secs_or(name: &str, default: Duration) -> Result<Duration> {
    let secs: f64 = get_env_parse_or(name, default.as_secs_f64())?;
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

fn get_env_list(name: &str) -> Option<Vec<String>> {
    let raw = env::var(name).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
