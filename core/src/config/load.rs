use std::path::{Path, PathBuf};

use super::types::GenConfig;

/// Get the default genflow data directory: ~/.genflow
pub fn get_genflow_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".genflow"))
}

pub fn load_default() -> anyhow::Result<GenConfig> {
    // Priority 1: ~/.genflow/config.toml (highest)
    let genflow_dir = get_genflow_data_dir()?;
    let genflow_config = genflow_dir.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let mut cfg: GenConfig = if genflow_config.exists() {
        let s = std::fs::read_to_string(&genflow_config)?;
        toml::from_str::<GenConfig>(&s)?
    } else if local_config.exists() {
        let s = std::fs::read_to_string(local_config)?;
        toml::from_str::<GenConfig>(&s)?
    } else {
        GenConfig::default()
    };

    // Relocate the default telemetry path under the data directory so runs
    // from arbitrary working directories end up in one place.
    if cfg.telemetry.enabled && cfg.telemetry.path == "./generation.events.jsonl" {
        let events_dir = genflow_dir.join("telemetry");
        std::fs::create_dir_all(&events_dir)?;
        cfg.telemetry.path = events_dir
            .join("generation.events.jsonl")
            .to_string_lossy()
            .to_string();
    }

    if cfg.logging.file
        && cfg
            .logging
            .directory
            .as_deref()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
    {
        let logs_dir = genflow_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)?;
        cfg.logging.directory = Some(logs_dir.to_string_lossy().to_string());
    }

    // Environment variable overrides (Priority 0: highest)
    if let Ok(v) = std::env::var("GENFLOW_PROVIDER_URL") {
        if !v.trim().is_empty() {
            cfg.provider.base_url = v;
        }
    }
    if let Ok(v) = std::env::var("GENFLOW_PROVIDER_TIMEOUT_SECS") {
        if let Ok(secs) = v.trim().parse::<u64>() {
            cfg.provider.timeout_secs = secs;
        }
    }

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_from_toml_string() {
        let toml = r#"
            [telemetry]
            enabled = true
            path = "/tmp/ev.jsonl"

            [logging]
            level = "debug"
        "#;
        let cfg: GenConfig = toml::from_str(toml).unwrap();
        assert!(cfg.telemetry.enabled);
        assert_eq!(cfg.telemetry.path, "/tmp/ev.jsonl");
        assert_eq!(cfg.logging.level, "debug");
    }
}
