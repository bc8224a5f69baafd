//! Handler functions for the `config` subcommands.
//!
//! Also provides TOML key helpers shared by the handlers.

use std::path::Path;

use weft_core::config::ENV_PREFIX;
use weft_core::{EngineConfig, Error, Result};

use crate::cli::ConfigAction;

// ============================================================================
// Command dispatch
// ============================================================================

/// Handle a config subcommand.
pub fn handle_config_command(config_path: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = EngineConfig::load(config_path)?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        ConfigAction::Get { key } => {
            let config = EngineConfig::load(config_path)?;
            println!("{}", cmd_config_get(&config, &key)?);
            Ok(())
        }
        ConfigAction::Set { key, value } => {
            let path = config_path
                .ok_or_else(|| Error::config("`config set` needs a file; pass --config <path>"))?;
            cmd_config_set(path, &key, &value)?;
            println!("Set {key} = {value} in {}", path.display());
            Ok(())
        }
        ConfigAction::Init { file, force } => {
            cmd_config_init(&file, force)?;
            println!("Config file created at {}", file.display());
            Ok(())
        }
        ConfigAction::Export { docker_env } => {
            let config = EngineConfig::load(config_path)?;
            for (key, value) in to_env_vars(&config)? {
                if docker_env {
                    println!("--env {key}={value}");
                } else {
                    println!("{key}={value}");
                }
            }
            Ok(())
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

fn as_toml(config: &EngineConfig) -> Result<toml::Value> {
    toml::Value::try_from(config).map_err(|e| Error::config(e.to_string()))
}

/// Looks up one configuration value by name.
pub fn cmd_config_get(config: &EngineConfig, key: &str) -> Result<String> {
    let value = as_toml(config)?;
    match get_nested_value(&value, key) {
        Some(val) => Ok(format_toml_value(val)),
        None if key == "default_strategy" => Ok("auto".to_string()),
        None => Err(Error::config(format!("Key '{key}' not found in configuration"))),
    }
}

/// Sets one value in the configuration file at `path`.
///
/// The edited file must still load as a valid configuration.
pub fn cmd_config_set(path: &Path, key: &str, value: &str) -> Result<()> {
    if !path.exists() {
        return Err(Error::config(format!(
            "Config file does not exist at {}. Run `weft config init` first.",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
    let mut doc: toml::Value = toml::from_str(&content)
        .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))?;

    set_nested_value(&mut doc, key, parse_value(value))?;

    let updated: EngineConfig = doc
        .clone()
        .try_into()
        .map_err(|e| Error::config(format!("Invalid value for {key}: {e}")))?;
    updated.validate()?;

    let toml_str = toml::to_string_pretty(&doc).map_err(|e| Error::config(e.to_string()))?;
    std::fs::write(path, toml_str).map_err(|e| Error::io_with_path(e, path))
}

/// Writes a default configuration file.
pub fn cmd_config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::config(format!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
    }

    let toml_str = EngineConfig::default().to_toml_string()?;
    std::fs::write(path, toml_str).map_err(|e| Error::io_with_path(e, path))
}

/// The configuration as `WEFT_*` variables, in field order.
pub fn to_env_vars(config: &EngineConfig) -> Result<Vec<(String, String)>> {
    let value = as_toml(config)?;
    let table = value
        .as_table()
        .ok_or_else(|| Error::config("configuration is not a table"))?;
    Ok(table
        .iter()
        .map(|(key, val)| {
            (
                format!("{ENV_PREFIX}{}", key.to_uppercase()),
                format_toml_value(val),
            )
        })
        .collect())
}

// ============================================================================
// TOML key helpers
// ============================================================================

/// Navigate a dotted key path in a TOML value tree.
pub fn get_nested_value<'a>(value: &'a toml::Value, key: &str) -> Option<&'a toml::Value> {
    let mut current = value;
    for part in key.split('.') {
        current = current.as_table()?.get(part)?;
    }
    Some(current)
}

/// Set a value at a dotted key path, creating intermediate tables as needed.
pub fn set_nested_value(root: &mut toml::Value, key: &str, value: toml::Value) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    let Some((last, parents)) = parts.split_last() else {
        return Err(Error::config("Empty key path"));
    };

    let mut current = root;
    for part in parents {
        let table = current
            .as_table_mut()
            .ok_or_else(|| Error::config("Cannot navigate into a non-table value"))?;
        current = table
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    let table = current
        .as_table_mut()
        .ok_or_else(|| Error::config("Cannot set key on a non-table value"))?;
    table.insert(last.to_string(), value);
    Ok(())
}

/// Parse a string value into a TOML value, auto-detecting the type.
///
/// Priority: bool → integer → float → string.
pub fn parse_value(s: &str) -> toml::Value {
    if s == "true" {
        return toml::Value::Boolean(true);
    }
    if s == "false" {
        return toml::Value::Boolean(false);
    }
    if let Ok(i) = s.parse::<i64>() {
        return toml::Value::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return toml::Value::Float(f);
    }
    toml::Value::String(s.to_string())
}

/// Format a TOML value for display on stdout.
pub fn format_toml_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(dt) => dt.to_string(),
        toml::Value::Array(_) | toml::Value::Table(_) => {
            toml::to_string_pretty(value).unwrap_or_else(|_| format!("{value:?}"))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
