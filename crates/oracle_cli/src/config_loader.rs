use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use oracle_engine::OracleConfig;

fn default_config_path() -> PathBuf {
    PathBuf::from("configs/oracle.toml")
}

/// Loads the engine config. A missing file means defaults; a file that exists
/// but does not parse or validate is an error.
pub(crate) fn load_oracle_config(path: Option<&Path>) -> Result<OracleConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config not found, using defaults");
        return Ok(OracleConfig::default());
    }
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("read config {}", path.display()))?;
    parse_oracle_config(&raw).with_context(|| format!("load config {}", path.display()))
}

pub(crate) fn parse_oracle_config(raw: &str) -> Result<OracleConfig> {
    let cfg: OracleConfig = toml::from_str(raw).context("parse toml")?;
    let cfg = cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load_oracle_config(Some(Path::new("does/not/exist.toml"))).unwrap();
        assert_eq!(cfg, OracleConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse_oracle_config("[stream]\nmax_len = 0\n").is_err());
        assert!(parse_oracle_config("[gate\n").is_err());
    }

    #[test]
    fn overrides_apply() {
        let cfg = parse_oracle_config("[engine]\nmin_primary_history = 12\n").unwrap();
        assert_eq!(cfg.engine.min_primary_history, 12);
        assert_eq!(cfg.engine.undo_depth, 100);
    }
}
