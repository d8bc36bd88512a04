use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable consulted for the upload API key when the config
/// file does not set `upload.api_key`.
pub const API_KEY_ENV: &str = "LIGHTHOUSE_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub coalesce: CoalesceConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// The batch currently open for mutation
    #[serde(default = "default_active_path")]
    pub active_path: PathBuf,

    /// Where closed batches wait for upload (and stay if upload fails)
    #[serde(default = "default_closed_dir")]
    pub closed_dir: PathBuf,
}

fn default_active_path() -> PathBuf {
    PathBuf::from("logs.json")
}

fn default_closed_dir() -> PathBuf {
    PathBuf::from("old_logs")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            active_path: default_active_path(),
            closed_dir: default_closed_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoalesceConfig {
    #[serde(default)]
    pub end_policy: EndPolicy,
}

/// How an incoming event moves the end of an existing interval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndPolicy {
    /// The most recently applied event always sets the end
    #[default]
    LastWrite,
    /// The interval only grows: the end moves forward, the start moves back
    Latest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    #[serde(default = "default_rotation_enabled")]
    pub enabled: bool,
    #[serde(with = "duration_format", default = "default_rotation_interval")]
    pub interval: Duration,
    /// Wake the rotator early once the active batch holds this many records
    #[serde(default)]
    pub max_records: Option<usize>,
}

fn default_rotation_enabled() -> bool {
    true
}

fn default_rotation_interval() -> Duration {
    Duration::from_secs(6)
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            enabled: default_rotation_enabled(),
            interval: default_rotation_interval(),
            max_records: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_upload_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(with = "duration_format", default = "default_upload_timeout")]
    pub timeout: Duration,
}

fn default_upload_endpoint() -> String {
    "https://node.lighthouse.storage/api/v0/add".to_string()
}

fn default_upload_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: default_upload_endpoint(),
            api_key: None,
            timeout: default_upload_timeout(),
        }
    }
}

impl UploadConfig {
    /// API key from the config file, falling back to the process environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|key| !key.is_empty()))
    }
}

// Custom serde module for duration parsing
pub(crate) mod duration_format {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(crate) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty duration string".to_string());
        }

        let (value_str, unit) = if let Some(v) = s.strip_suffix("ms") {
            (v, "ms")
        } else if let Some(v) = s.strip_suffix('s') {
            (v, "s")
        } else if let Some(v) = s.strip_suffix('m') {
            (v, "m")
        } else if let Some(v) = s.strip_suffix('h') {
            (v, "h")
        } else {
            return Err(format!("invalid duration format: {}", s));
        };

        let value: u64 = value_str
            .trim()
            .parse()
            .map_err(|_| format!("invalid numeric value: {}", value_str))?;

        let duration = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            "h" => Duration::from_secs(value * 3600),
            _ => return Err(format!("unknown unit: {}", unit)),
        };

        Ok(duration)
    }

    pub(crate) fn format_duration(d: Duration) -> String {
        let secs = d.as_secs();
        if d.subsec_millis() != 0 || secs == 0 {
            format!("{}ms", d.as_millis())
        } else if secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}
