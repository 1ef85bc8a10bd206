use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub application: ApplicationConfig,
    pub opensearch: OpenSearchConfig,
    pub cache: CacheConfig,
    pub queue: QueueConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `COLLECTA_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("COLLECTA_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            application: ApplicationConfig::from_env_profiled(p),
            opensearch: OpenSearchConfig::from_env_profiled(p),
            cache: CacheConfig::from_env_profiled(p),
            queue: QueueConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  application: name={}, pid={}", self.application.name, self.application.pid);
        tracing::info!(
            "  opensearch:  url={}, index={}, page_size={}, auth={}",
            self.opensearch.url,
            self.opensearch.index,
            self.opensearch.page_size,
            if self.opensearch.has_credentials() { "basic" } else { "none" }
        );
        tracing::info!(
            "  cache:       dir={}, refresh={}s",
            self.cache.collections_dir.display(),
            self.cache.refresh_secs
        );
        tracing::info!(
            "  queue:       batch_size={}, batch_wait={}ms",
            self.queue.batch_size,
            self.queue.batch_wait_ms
        );
    }
}

// ── Application identity ──────────────────────────────────────

/// Identity stamped on every relationship this service asserts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub name: String,
    pub pid: String,
    pub role: String,
}

impl ApplicationConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            name: profiled_env_or(p, "APP_NAME", "Virtual Collection Service"),
            pid: profiled_env_or(p, "APP_PID", "https://doi.org/10.5281/zenodo.17182153"),
            role: profiled_env_or(p, "APP_ROLE", "virtual-collection-manager"),
        }
    }
}

// ── OpenSearch ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSearchConfig {
    pub url: String,
    pub index: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub page_size: usize,
    /// Source field holding the stable, unique sort key used as pagination cursor.
    pub cursor_field: String,
    pub timeout_ms: u64,
}

impl OpenSearchConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_or(p, "OPENSEARCH_URL", "http://localhost:9200"),
            index: profiled_env_or(p, "OPENSEARCH_INDEX", "digital-specimen"),
            username: profiled_env_opt(p, "OPENSEARCH_USERNAME"),
            password: profiled_env_opt(p, "OPENSEARCH_PASSWORD"),
            page_size: profiled_env_usize(p, "OPENSEARCH_PAGE_SIZE", 300),
            cursor_field: profiled_env_or(p, "OPENSEARCH_CURSOR_FIELD", "dcterms:identifier"),
            timeout_ms: profiled_env_u64(p, "OPENSEARCH_TIMEOUT_MS", 10_000),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ── Collection cache ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub collections_dir: PathBuf,
    pub refresh_secs: u64,
}

impl CacheConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            collections_dir: PathBuf::from(profiled_env_or(p, "COLLECTIONS_DIR", "data/collections")),
            refresh_secs: profiled_env_u64(p, "CACHE_REFRESH_SECS", 30),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.max(1))
    }
}

// ── Inbound queue batching ────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub batch_size: usize,
    pub batch_wait_ms: u64,
}

impl QueueConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            batch_size: profiled_env_usize(p, "QUEUE_BATCH_SIZE", 500),
            batch_wait_ms: profiled_env_u64(p, "QUEUE_BATCH_WAIT_MS", 1000),
        }
    }

    pub fn batch_wait(&self) -> Duration {
        Duration::from_millis(self.batch_wait_ms)
    }
}
