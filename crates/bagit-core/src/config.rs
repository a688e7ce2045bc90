//! Bag creation settings.

use serde::{Deserialize, Serialize};

/// Settings used when creating bags and ingesting payload trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BagConfig {
    /// Checksum algorithms; one payload manifest (and tag manifest) each.
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<String>,

    /// Whether to maintain `tagmanifest-<algo>.txt` files.
    #[serde(default)]
    pub tag_manifests: bool,

    /// Concurrency cap for directory ingest.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_algorithms() -> Vec<String> {
    vec!["md5".to_string()]
}

fn default_workers() -> usize {
    8
}

impl Default for BagConfig {
    fn default() -> Self {
        Self {
            algorithms: default_algorithms(),
            tag_manifests: false,
            workers: default_workers(),
        }
    }
}

impl BagConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `BAGIT_ALGORITHMS` | Comma-separated algorithm names (default: `md5`) |
    /// | `BAGIT_TAG_MANIFESTS` | Write tag manifests (`1`/`true`) |
    /// | `BAGIT_WORKERS` | Ingest concurrency cap (default: 8) |
    pub fn from_env() -> Self {
        Self {
            algorithms: std::env::var("BAGIT_ALGORITHMS")
                .ok()
                .map(|v| parse_algorithm_list(&v))
                .filter(|list| !list.is_empty())
                .unwrap_or_else(default_algorithms),
            tag_manifests: std::env::var("BAGIT_TAG_MANIFESTS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            workers: std::env::var("BAGIT_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or_else(default_workers),
        }
    }

    /// Set the checksum algorithms.
    pub fn with_algorithms<I, S>(mut self, algorithms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.algorithms = algorithms.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable tag manifests.
    pub fn with_tag_manifests(mut self, enabled: bool) -> Self {
        self.tag_manifests = enabled;
        self
    }

    /// Set the ingest concurrency cap (at least 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

fn parse_algorithm_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}
