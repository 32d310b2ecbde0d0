//! `ferrocode config`: configuration file management.

use std::path::Path;

use anyhow::Context;
use ferrocode_config::AppConfig;

pub fn init(force: bool) -> anyhow::Result<()> {
    let path = AppConfig::config_dir().join("config.toml");
    write_default(&path, force)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn write_default(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn show() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    println!("{}", render(&config)?);
    Ok(())
}

/// The effective configuration as TOML, with the API key masked.
fn render(config: &AppConfig) -> anyhow::Result<String> {
    let mut shown = config.clone();
    if shown.model.api_key.is_some() {
        shown.model.api_key = Some("[REDACTED]".into());
    }
    Ok(toml::to_string_pretty(&shown)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        write_default(&path, false).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("max_iterations"));

        std::fs::write(&path, "# mine").unwrap();
        assert!(write_default(&path, false).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine");

        write_default(&path, true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("max_iterations"));
    }

    #[test]
    fn api_key_is_redacted() {
        let mut config = AppConfig::default();
        config.model.api_key = Some("sk-secret".into());
        let text = render(&config).unwrap();
        assert!(!text.contains("sk-secret"));
        assert!(text.contains("[REDACTED]"));
    }
}
