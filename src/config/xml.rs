//! XML configuration support.
//! - Loads settings from config.xml (quick_xml + serde).
//! - Unknown fields are rejected so typos surface instead of being ignored.
//! - A missing file is not an error: defaults apply.
//!
//! Example:
//! <config>
//!   <backup>true</backup>
//!   <keep_backup>false</keep_backup>
//!   <log_level>normal</log_level>
//!   <log_file>/var/log/atomic_replace.log</log_file>
//!   <json>false</json>
//! </config>

use anyhow::{Context, Result, bail};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::paths::default_config_path;
use super::types::{Config, LogLevel};

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    #[serde(default, deserialize_with = "de_bool_trimmed_opt")]
    backup: Option<bool>,
    #[serde(default, deserialize_with = "de_bool_trimmed_opt")]
    keep_backup: Option<bool>,
    log_level: Option<String>,
    log_file: Option<String>,
    #[serde(default, deserialize_with = "de_bool_trimmed_opt")]
    json: Option<bool>,
}

// Tolerate surrounding whitespace in boolean elements.
fn de_bool_trimmed_opt<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .to_ascii_lowercase()
            .parse::<bool>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn xml_to_config(parsed: XmlConfig) -> Result<Config> {
    let mut cfg = Config::default();
    cfg.backup = parsed.backup.unwrap_or(false);
    cfg.keep_backup = parsed.keep_backup.unwrap_or(false);
    cfg.json = parsed.json.unwrap_or(false);

    if let Some(s) = parsed.log_level.as_deref() {
        match LogLevel::parse(s) {
            Some(level) => cfg.log_level = level,
            None => bail!("invalid log_level '{}'", s.trim()),
        }
    }
    if let Some(s) = parsed.log_file.as_deref() {
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            cfg.log_file = Some(PathBuf::from(trimmed));
        }
    }
    Ok(cfg)
}

/// Load a Config from a specific XML file path.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig = from_xml_str(&contents)
        .with_context(|| format!("parse config xml '{}'", path.display()))?;
    xml_to_config(parsed).with_context(|| format!("invalid config '{}'", path.display()))
}

/// Load the config from `default_config_path()`; defaults when the file is missing.
pub fn load_config() -> Result<Config> {
    let Some(path) = default_config_path() else {
        debug!("no config path could be determined; using defaults");
        return Ok(Config::default());
    };
    if !path.exists() {
        debug!(path = %path.display(), "config file not found; using defaults");
        return Ok(Config::default());
    }
    debug!(path = %path.display(), "loading config");
    load_config_from_xml_path(&path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_all_fields_with_whitespace() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.xml");
        fs::write(
            &p,
            "<config>\n  <backup> true </backup>\n  <keep_backup>TRUE</keep_backup>\n  <log_level> debug </log_level>\n  <log_file> /tmp/a.log </log_file>\n  <json>false</json>\n</config>",
        )
        .unwrap();
        let cfg = load_config_from_xml_path(&p).unwrap();
        assert!(cfg.backup);
        assert!(cfg.keep_backup);
        assert!(!cfg.json);
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.log_file, Some(PathBuf::from("/tmp/a.log")));
    }

    #[test]
    fn empty_config_yields_defaults() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.xml");
        fs::write(&p, "<config></config>").unwrap();
        assert_eq!(load_config_from_xml_path(&p).unwrap(), Config::default());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.xml");
        fs::write(&p, "<config><backups>true</backups></config>").unwrap();
        let err = load_config_from_xml_path(&p).unwrap_err();
        assert!(format!("{err:#}").contains("unknown field"), "{err:#}");
    }

    #[test]
    fn bad_log_level_is_rejected() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.xml");
        fs::write(&p, "<config><log_level>shouty</log_level></config>").unwrap();
        let err = load_config_from_xml_path(&p).unwrap_err();
        assert!(format!("{err:#}").contains("shouty"));
    }
}
