// src/commands/init.rs

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::fsutil::write_atomic;

#[derive(Debug, Clone)]
pub struct InitReport {
    pub root: PathBuf,
    pub created: Vec<String>,
    pub existed: Vec<String>,
}

/// Lay out an archive directory under `root`. Idempotent: existing entries are left alone and
/// reported in `existed`.
pub fn ensure_initialized(root: &Path) -> Result<InitReport> {
    let root = root.to_path_buf();
    let mut created = Vec::new();
    let mut existed = Vec::new();

    ensure_dir(&root, "", &mut created, &mut existed)?;
    ensure_dir(&root, "revisions", &mut created, &mut existed)?;
    ensure_dir(&root, "objects", &mut created, &mut existed)?;

    ensure_file(&root, "config.toml", DEFAULT_CONFIG_TOML, &mut created, &mut existed)?;
    // an empty tip list: nothing committed yet
    ensure_file(&root, "tips", "", &mut created, &mut existed)?;

    Ok(InitReport { root, created, existed })
}

fn ensure_dir(base: &Path, rel: &str, created: &mut Vec<String>, existed: &mut Vec<String>) -> Result<()> {
    let p = if rel.is_empty() { base.to_path_buf() } else { base.join(rel) };
    let name = if rel.is_empty() { ".".to_string() } else { rel.to_string() };
    if p.exists() {
        existed.push(name);
        return Ok(());
    }
    fs::create_dir_all(&p).with_context(|| format!("create_dir_all({:?})", p))?;
    created.push(name);
    Ok(())
}

fn ensure_file(
    base: &Path,
    rel_file: &str,
    content_if_absent: &str,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let p = base.join(rel_file);
    if p.exists() {
        existed.push(rel_file.to_string());
        return Ok(());
    }
    write_atomic(&p, content_if_absent.as_bytes())?;
    created.push(rel_file.to_string());
    Ok(())
}

// ---------- defaults ----------

pub const DEFAULT_CONFIG_TOML: &str = r#"[swarm]
revision_lookup_retry_interval_ms = 1000
# negative waits forever
revision_lookup_timeout_ms = 30000
request_priority = 101

[ancestry]
max_parents_per_revision = 64
snapshot_path = "ancestry.snapshot"
persist = true

[logging]
filter = "info"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;

    #[test]
    fn second_run_reports_everything_as_existing() {
        let dir = tempfile::tempdir().unwrap();
        let first = ensure_initialized(dir.path()).unwrap();
        assert!(first.created.contains(&"config.toml".to_string()));
        assert!(first.created.contains(&"revisions".to_string()));

        let second = ensure_initialized(dir.path()).unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.existed.len(), first.created.len() + first.existed.len());
    }

    #[test]
    fn default_config_parses_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        ensure_initialized(dir.path()).unwrap();
        let cfg = CoreConfig::load(dir.path()).unwrap();
        let runtime = cfg.ancestry_config();
        assert_eq!(runtime.max_parents, 64);
        assert_eq!(runtime.request_priority, 101);
        assert_eq!(runtime.snapshot_path, Some(dir.path().join("ancestry.snapshot")));
    }
}
