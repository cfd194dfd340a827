use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ancestry::AncestryConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub swarm: SwarmConfig,
    #[serde(default)]
    pub ancestry: AncestrySection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CoreConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("config.toml");
        let mut cfg = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str::<CoreConfig>(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        } else {
            tracing::info!(
                "No config file found at {}. Using CoreConfig::default().",
                path.display()
            );
            CoreConfig::default()
        };
        cfg.resolve_paths(root);
        Ok(cfg)
    }

    fn resolve_paths(&mut self, root: &Path) {
        self.ancestry.snapshot_path = absolutize(root, &self.ancestry.snapshot_path);
    }

    /// The runtime settings handed to `AncestryCache`.
    pub fn ancestry_config(&self) -> AncestryConfig {
        AncestryConfig {
            retry_interval: Duration::from_millis(self.swarm.revision_lookup_retry_interval_ms),
            lookup_timeout: u64::try_from(self.swarm.revision_lookup_timeout_ms)
                .ok()
                .map(Duration::from_millis),
            request_priority: self.swarm.request_priority,
            max_parents: self.ancestry.max_parents_per_revision,
            snapshot_path: self
                .ancestry
                .persist
                .then(|| self.ancestry.snapshot_path.clone()),
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            swarm: SwarmConfig::default(),
            ancestry: AncestrySection::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwarmConfig {
    #[serde(default = "SwarmConfig::default_retry_interval_ms")]
    pub revision_lookup_retry_interval_ms: u64,
    /// Negative means lookups wait forever.
    #[serde(default = "SwarmConfig::default_lookup_timeout_ms")]
    pub revision_lookup_timeout_ms: i64,
    #[serde(default = "SwarmConfig::default_request_priority")]
    pub request_priority: i32,
}

impl SwarmConfig {
    fn default_retry_interval_ms() -> u64 {
        1_000
    }

    fn default_lookup_timeout_ms() -> i64 {
        30_000
    }

    // one above page requests
    fn default_request_priority() -> i32 {
        101
    }
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            revision_lookup_retry_interval_ms: Self::default_retry_interval_ms(),
            revision_lookup_timeout_ms: Self::default_lookup_timeout_ms(),
            request_priority: Self::default_request_priority(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AncestrySection {
    #[serde(default = "AncestrySection::default_max_parents")]
    pub max_parents_per_revision: usize,
    #[serde(default = "AncestrySection::default_snapshot_path")]
    pub snapshot_path: PathBuf,
    #[serde(default = "AncestrySection::default_persist")]
    pub persist: bool,
}

impl AncestrySection {
    fn default_max_parents() -> usize {
        64
    }

    fn default_snapshot_path() -> PathBuf {
        PathBuf::from("ancestry.snapshot")
    }

    fn default_persist() -> bool {
        true
    }
}

impl Default for AncestrySection {
    fn default() -> Self {
        Self {
            max_parents_per_revision: Self::default_max_parents(),
            snapshot_path: Self::default_snapshot_path(),
            persist: Self::default_persist(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_filter")]
    pub filter: String,
}

impl LoggingConfig {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: Self::default_filter(),
        }
    }
}

fn absolutize(root: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        root.join(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let cfg: CoreConfig = toml::from_str(
            r#"
            [swarm]
            revision_lookup_timeout_ms = -1

            [ancestry]
            persist = false
            "#,
        )
        .unwrap();

        let runtime = cfg.ancestry_config();
        assert_eq!(runtime.lookup_timeout, None);
        assert_eq!(runtime.retry_interval, Duration::from_millis(1_000));
        assert_eq!(runtime.max_parents, 64);
        assert!(runtime.snapshot_path.is_none());
        assert_eq!(cfg.logging.filter, "info");
    }
}
