use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use toml_edit::{value, DocumentMut};

use playlake_etl::config::{self, KEYS};
use playlake_etl::{Config, MalformedPolicy};

/// The config file in use: `--config` when given, else the default path.
pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(config::config_file_path, Path::to_path_buf)
}

fn load(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load_from(Some(path))
    } else {
        Config::load()
    }
}

/// Show the current effective configuration.
pub fn show_config(path: &Path) -> Result<()> {
    let config = load(path)?;

    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", path.display());
    let exists = path.exists();
    println!(
        "File exists: {}\n",
        if exists { "yes" } else { "no (using defaults)" }
    );

    println!("Settings:");
    for key in KEYS {
        println!("  {key}: {}", config.get(key).unwrap_or_default());
    }

    println!("\nPriority: CLI args > ENV vars (PLAYLAKE_*) > Config file > Defaults");

    Ok(())
}

/// Get a specific config value, or print the whole file.
pub fn get_config(path: &Path, key: Option<String>) -> Result<()> {
    if let Some(key) = key {
        let config = load(path)?;
        let Some(value) = config.get(&key) else {
            anyhow::bail!(
                "Unknown config key: {}\n\nValid keys: {}",
                key,
                KEYS.join(", ")
            );
        };
        println!("{value}");
    } else if path.exists() {
        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
        print!("{contents}");
    } else {
        println!("Config file does not exist: {}", path.display());
        println!("\nRun 'playlake config init' to create it.");
    }

    Ok(())
}

/// Replace or add `key = value` in `contents`, keeping comments and layout.
pub fn update_document(contents: &str, key: &str, raw: &str) -> Result<String> {
    let mut doc: DocumentMut = contents.parse().context("Config file is not valid TOML")?;

    let item = match key {
        "utc_offset_minutes" => {
            let minutes: i64 = raw
                .parse()
                .with_context(|| format!("{key} must be an integer, got {raw:?}"))?;
            value(minutes)
        }
        "log_coloured" => {
            let coloured: bool = raw
                .parse()
                .with_context(|| format!("{key} must be true or false, got {raw:?}"))?;
            value(coloured)
        }
        "malformed_records" => {
            let policy = match raw {
                "drop" => MalformedPolicy::Drop,
                "fail" => MalformedPolicy::Fail,
                _ => anyhow::bail!("{key} must be \"drop\" or \"fail\", got {raw:?}"),
            };
            value(policy.to_string())
        }
        "input_dir" | "output_dir" | "state_dir" | "log_level" => value(raw),
        _ => anyhow::bail!(
            "Unknown config key: {}\n\nValid keys: {}",
            key,
            KEYS.join(", ")
        ),
    };

    doc[key] = item;
    Ok(doc.to_string())
}

/// Set a config value.
pub fn set_config(path: &Path, key: &str, raw: &str) -> Result<()> {
    config::ensure_config_file(path)?;

    let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
    let updated = update_document(&contents, key, raw)?;
    std::fs::write(path, updated).context("Failed to write config file")?;

    // Reject values the loader would not accept, such as an out-of-range offset.
    Config::load_from(Some(path))?
        .calendar()
        .context("Configuration written but not usable")?;

    println!("✓ Updated {key} = {raw}");
    println!("  in {}", path.display());

    Ok(())
}

/// Show the config file path.
pub fn show_path(path: &Path) {
    println!("{}", path.display());
}

/// Show example configuration.
pub fn show_example() {
    print!("{}", config::example_config());
}

/// Initialize config file with defaults.
pub fn init_config(path: &Path) -> Result<()> {
    let created = config::ensure_config_file(path)?;

    if created {
        println!("✓ Created config file: {}", path.display());
        println!("\nEdit this file to configure playlake.");
    } else {
        println!("Config file already exists: {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_update_keeps_comments() {
        let updated = update_document(config::example_config(), "output_dir", "/lake").unwrap();
        assert!(updated.contains("# Playlake Configuration File"));
        assert!(updated.contains("output_dir = \"/lake\""));
        assert!(!updated.contains("output_dir = \"output\""));
    }

    #[test]
    fn test_update_typed_values() {
        let updated = update_document("", "utc_offset_minutes", "-480").unwrap();
        assert!(updated.contains("utc_offset_minutes = -480"));
        let updated = update_document(&updated, "log_coloured", "false").unwrap();
        assert!(updated.contains("log_coloured = false"));
    }

    #[test]
    fn test_update_rejects_bad_values() {
        assert!(update_document("", "utc_offset_minutes", "east").is_err());
        assert!(update_document("", "malformed_records", "ignore").is_err());
        assert!(update_document("", "database_path", "/tmp").is_err());
    }

    #[test]
    fn test_set_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        set_config(&path, "malformed_records", "fail").unwrap();
        set_config(&path, "input_dir", "/srv/sparkify").unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.malformed_records, MalformedPolicy::Fail);
        assert_eq!(config.input_dir, PathBuf::from("/srv/sparkify"));
    }

    #[test]
    fn test_resolve_path_prefers_explicit() {
        let explicit = PathBuf::from("/etc/playlake.toml");
        assert_eq!(resolve_path(Some(&explicit)), explicit);
        assert_eq!(resolve_path(None), config::config_file_path());
    }
}
