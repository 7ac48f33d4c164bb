//! Config command implementation.

use std::path::Path;

use anyhow::{Context, Result};

use relaydrop_core::config::Config;

use super::{ConfigAction, ConfigArgs};

/// Run the config command.
pub async fn run(args: ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    let path = config_path.map_or_else(Config::config_path, Path::to_path_buf);

    match args.action {
        ConfigAction::Show => {
            let config = super::load_config(config_path)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Init { force } => {
            init(&path, force)?;
            println!("  Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        );
    }
    Config::default()
        .save_to(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        init(&path, false).unwrap();
        let written = Config::load_from(&path).unwrap();
        assert_eq!(written.relay.url, Config::default().relay.url);

        std::fs::write(&path, "[relay]\nurl = \"http://mine:1\"\n").unwrap();
        assert!(init(&path, false).is_err());
        assert_eq!(Config::load_from(&path).unwrap().relay.url, "http://mine:1");

        init(&path, true).unwrap();
        assert_eq!(
            Config::load_from(&path).unwrap().relay.url,
            Config::default().relay.url
        );
    }
}
