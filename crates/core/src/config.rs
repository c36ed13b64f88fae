use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_LANGUAGE: &str = "ko";
pub const DEFAULT_ASR_MODEL: &str = "turbo";
/// C2
pub const DEFAULT_PITCH_FMIN_HZ: f64 = 65.406;
/// C7
pub const DEFAULT_PITCH_FMAX_HZ: f64 = 2093.005;
pub const DEFAULT_FRAME_LENGTH: usize = 2048;
pub const DEFAULT_HOP_LENGTH: usize = 512;
pub const DEFAULT_SILENCE_THRESHOLD: f32 = 1e-4;
pub const DEFAULT_FEEDBACK_HOST: &str = "https://clovastudio.stream.ntruss.com";
pub const DEFAULT_FEEDBACK_MODEL: &str = "HCX-005";
pub const ENV_FEEDBACK_API_KEY: &str = "PROSODY_COACH_API_KEY";
pub const ENV_FEEDBACK_HOST: &str = "PROSODY_COACH_HOST";
pub const ENV_FEEDBACK_REQUEST_ID: &str = "PROSODY_COACH_REQUEST_ID";
pub const ENV_FEEDBACK_MODEL: &str = "PROSODY_COACH_MODEL";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Language(String);

impl Language {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        if v.trim().is_empty() {
            return Err(ConfigError::EmptyLanguage);
        }
        Ok(Self(v))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Language {
    fn default() -> Self {
        Self(DEFAULT_LANGUAGE.to_owned())
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        if v.trim().is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        Ok(Self(v))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(**redacted**)")
    }
}

/// Frequency band searched by the pitch tracker.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct PitchRange {
    pub fmin_hz: f64,
    pub fmax_hz: f64,
}

impl PitchRange {
    pub fn new(fmin_hz: f64, fmax_hz: f64) -> Result<Self, ConfigError> {
        if !(fmin_hz > 0.0 && fmin_hz < fmax_hz) {
            return Err(ConfigError::InvalidPitchRange { fmin_hz, fmax_hz });
        }
        Ok(Self { fmin_hz, fmax_hz })
    }
}

impl Default for PitchRange {
    fn default() -> Self {
        Self {
            fmin_hz: DEFAULT_PITCH_FMIN_HZ,
            fmax_hz: DEFAULT_PITCH_FMAX_HZ,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    pub sample_rate: u32,
    pub pitch: PitchRange,
    pub frame_length: usize,
    pub hop_length: usize,
    pub silence_threshold: f32,
    /// Fan segments out over the rayon pool. Output order is unaffected.
    pub parallel: bool,
}

impl AnalysisConfig {
    pub fn new(sample_rate: u32, pitch: PitchRange) -> Result<Self, ConfigError> {
        if sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        Ok(Self {
            sample_rate,
            pitch,
            ..Self::default()
        })
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            pitch: PitchRange::default(),
            frame_length: DEFAULT_FRAME_LENGTH,
            hop_length: DEFAULT_HOP_LENGTH,
            silence_threshold: DEFAULT_SILENCE_THRESHOLD,
            parallel: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AsrConfig {
    pub model: String,
    pub language: Language,
    pub word_timestamps: bool,
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_ASR_MODEL.to_owned(),
            language: Language::default(),
            word_timestamps: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedbackConfig {
    pub host: Url,
    pub model: String,
    pub api_key: Option<ApiKey>,
    pub request_id: Option<String>,
}

impl FeedbackConfig {
    pub fn new(host: &str, model: String, api_key: Option<ApiKey>) -> Result<Self, ConfigError> {
        let host = Url::parse(host).map_err(|e| ConfigError::InvalidHost(e.to_string()))?;
        Ok(Self {
            host,
            model,
            api_key,
            request_id: None,
        })
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            host: Url::parse(DEFAULT_FEEDBACK_HOST).expect("default feedback host is a valid url"),
            model: DEFAULT_FEEDBACK_MODEL.to_owned(),
            api_key: None,
            request_id: None,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("language must not be empty")]
    EmptyLanguage,
    #[error("api key must not be empty")]
    EmptyApiKey,
    #[error("sample rate must be > 0 Hz")]
    ZeroSampleRate,
    #[error("invalid pitch range: fmin={fmin_hz} Hz, fmax={fmax_hz} Hz")]
    InvalidPitchRange { fmin_hz: f64, fmax_hz: f64 },
    #[error("invalid feedback host: {0}")]
    InvalidHost(String),
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_api_key(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Result<Option<ApiKey>, ConfigError> {
    match cli_value {
        Some(v) => Ok(Some(ApiKey::new(v)?)),
        None => match env.var(env_key) {
            Some(v) => Ok(Some(ApiKey::new(v)?)),
            None => Ok(None),
        },
    }
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    match cli_value {
        Some(v) => v,
        None => env.var(env_key).unwrap_or_else(|| default.to_owned()),
    }
}

pub fn resolve_optional_string(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Option<String> {
    match cli_value {
        Some(v) => Some(v),
        None => env.var(env_key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_cli_takes_precedence_over_env() {
        let env = MapEnv::default().with_var(ENV_FEEDBACK_API_KEY, "env-key");
        let key = resolve_api_key(Some("cli-key".to_owned()), ENV_FEEDBACK_API_KEY, &env)
            .expect("valid key")
            .expect("present");
        assert_eq!(key.expose(), "cli-key");
    }

    #[test]
    fn api_key_env_used_when_cli_missing() {
        let env = MapEnv::default().with_var(ENV_FEEDBACK_API_KEY, "env-key");
        let key = resolve_api_key(None, ENV_FEEDBACK_API_KEY, &env)
            .expect("valid key")
            .expect("present");
        assert_eq!(key.expose(), "env-key");
    }

    #[test]
    fn api_key_blank_is_rejected() {
        let env = MapEnv::default();
        let err = resolve_api_key(Some("   ".to_owned()), ENV_FEEDBACK_API_KEY, &env).unwrap_err();
        assert_eq!(err, ConfigError::EmptyApiKey);
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("secret").unwrap();
        assert_eq!(format!("{key:?}"), "ApiKey(**redacted**)");
    }

    #[test]
    fn analysis_config_rejects_zero_sample_rate() {
        let err = AnalysisConfig::new(0, PitchRange::default()).unwrap_err();
        assert_eq!(err, ConfigError::ZeroSampleRate);
    }

    #[test]
    fn pitch_range_rejects_inverted_bounds() {
        assert!(PitchRange::new(500.0, 100.0).is_err());
        assert!(PitchRange::new(0.0, 100.0).is_err());
        assert!(PitchRange::new(65.0, 2100.0).is_ok());
    }

    #[test]
    fn feedback_config_rejects_bad_host() {
        let err = FeedbackConfig::new("not a url", DEFAULT_FEEDBACK_MODEL.to_owned(), None);
        assert!(matches!(err, Err(ConfigError::InvalidHost(_))));
    }

    #[test]
    fn resolve_string_with_default_cli_takes_precedence() {
        let env = MapEnv::default().with_var(ENV_FEEDBACK_HOST, "env");
        let v = resolve_string_with_default(Some("cli".to_owned()), ENV_FEEDBACK_HOST, &env, "def");
        assert_eq!(v, "cli");
    }

    #[test]
    fn resolve_string_with_default_env_used_when_cli_missing() {
        let env = MapEnv::default().with_var(ENV_FEEDBACK_HOST, "env");
        let v = resolve_string_with_default(None, ENV_FEEDBACK_HOST, &env, "def");
        assert_eq!(v, "env");
    }

    #[test]
    fn resolve_string_with_default_default_used_when_both_missing() {
        let env = MapEnv::default();
        let v = resolve_string_with_default(None, ENV_FEEDBACK_HOST, &env, "def");
        assert_eq!(v, "def");
    }

    #[test]
    fn resolve_optional_string_falls_back_to_env() {
        let env = MapEnv::default().with_var(ENV_FEEDBACK_REQUEST_ID, "abc");
        assert_eq!(
            resolve_optional_string(None, ENV_FEEDBACK_REQUEST_ID, &env).as_deref(),
            Some("abc")
        );
        assert_eq!(resolve_optional_string(None, ENV_FEEDBACK_MODEL, &env), None);
    }
}
