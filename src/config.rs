//! Book configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a user `config.toml` in the config directory overrides any
//! subset of them.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [toc]
//! max_entries_per_page = 12            # Entries per generated TOC page
//! title = "Sumário"                    # Default title of the first TOC page
//! continuation_title = "Sumário (continuação)"
//!
//! [autosave]
//! debounce_ms = 1000                   # Quiet time before a save is written
//!
//! [storage]
//! key = "ebook-receitas"               # Record key in the data directory
//!
//! [theme]                              # Colors for new books
//! bg = "#fffaf3"
//! text = "#2b2b2b"
//! accent = "#c0392b"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::reconcile::TocSettings;
use crate::types::Theme;
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Book configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BookConfig {
    /// Table-of-contents pagination and default titles.
    pub toc: TocConfig,
    /// Debounced autosave settings.
    pub autosave: AutosaveConfig,
    /// Durable storage settings.
    pub storage: StorageConfig,
    /// Colors used when a new book is started.
    pub theme: ThemeConfig,
}

impl BookConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.toc.max_entries_per_page == 0 {
            return Err(ConfigError::Validation(
                "toc.max_entries_per_page must be at least 1".into(),
            ));
        }
        if self.toc.title.trim().is_empty() || self.toc.continuation_title.trim().is_empty() {
            return Err(ConfigError::Validation(
                "toc.title and toc.continuation_title must not be blank".into(),
            ));
        }
        let key = &self.storage.key;
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::Validation(
                "storage.key must be non-empty and use only letters, digits, '-' and '_'".into(),
            ));
        }
        for (name, value) in [
            ("bg", &self.theme.bg),
            ("text", &self.theme.text),
            ("accent", &self.theme.accent),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "theme.{name} must not be empty"
                )));
            }
        }
        Ok(())
    }

    /// Reconciler settings derived from the `[toc]` table.
    pub fn toc_settings(&self) -> Result<TocSettings, ConfigError> {
        let max_per_page = NonZeroUsize::new(self.toc.max_entries_per_page).ok_or_else(|| {
            ConfigError::Validation("toc.max_entries_per_page must be at least 1".into())
        })?;
        Ok(TocSettings {
            max_per_page,
            first_title: self.toc.title.clone(),
            continuation_title: self.toc.continuation_title.clone(),
        })
    }
}

/// Table-of-contents settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TocConfig {
    /// Maximum entries on one generated TOC page.
    pub max_entries_per_page: usize,
    /// Default title of the first TOC page.
    pub title: String,
    /// Default title of the following TOC pages.
    pub continuation_title: String,
}

impl Default for TocConfig {
    fn default() -> Self {
        let settings = TocSettings::default();
        Self {
            max_entries_per_page: settings.max_per_page.get(),
            title: settings.first_title,
            continuation_title: settings.continuation_title,
        }
    }
}

/// Debounced autosave settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutosaveConfig {
    /// Milliseconds without further edits before a save is written.
    pub debounce_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self { debounce_ms: 1000 }
    }
}

/// Durable storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Key the book is stored under.
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key: "ebook-receitas".to_string(),
        }
    }
}

/// Default colors for a new book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThemeConfig {
    pub bg: String,
    pub text: String,
    pub accent: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        let theme = Theme::default();
        Self {
            bg: theme.bg,
            text: theme.text,
            accent: theme.accent,
        }
    }
}

impl From<&ThemeConfig> for Theme {
    fn from(config: &ThemeConfig) -> Self {
        Theme {
            bg: config.bg.clone(),
            text: config.text.clone(),
            accent: config.accent.clone(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(BookConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Lay the user's `config.toml` over the stock defaults.
///
/// Sections merge key by key, so a file that sets only `[toc]
/// max_entries_per_page` keeps every other default. Any other value in the
/// user file replaces the default outright.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read the book's `config.toml` from the config dir, untyped.
///
/// A missing file is not an error: the book then runs on stock defaults.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Build the final [`BookConfig`] from the stock defaults and the user's
/// file, if any, rejecting unknown keys and out-of-range values.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<BookConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BookConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory, on top of the
/// stock defaults.
pub fn load_config(dir: &Path) -> Result<BookConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Recipe Book Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Table of contents
# ---------------------------------------------------------------------------
[toc]
# Maximum entries on one generated TOC page. When the titled sections
# outgrow a page, another TOC page is inserted right after it.
max_entries_per_page = 12

# Default title of the first TOC page. Edited titles are kept.
title = "Sumário"

# Default title of every following TOC page.
continuation_title = "Sumário (continuação)"

# ---------------------------------------------------------------------------
# Autosave
# ---------------------------------------------------------------------------
[autosave]
# Milliseconds of quiet after the last edit before the book is saved.
# A burst of edits produces a single save.
debounce_ms = 1000

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# Key the book is stored under (letters, digits, '-' and '_').
key = "ebook-receitas"

# ---------------------------------------------------------------------------
# Theme for new books
# ---------------------------------------------------------------------------
[theme]
bg = "#fffaf3"
text = "#2b2b2b"
accent = "#c0392b"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = BookConfig::default();
        assert_eq!(config.toc.max_entries_per_page, 12);
        assert_eq!(config.toc.title, "Sumário");
        assert_eq!(config.toc.continuation_title, "Sumário (continuação)");
        assert_eq!(config.autosave.debounce_ms, 1000);
        assert_eq!(config.storage.key, "ebook-receitas");
        assert_eq!(config.theme.accent, "#c0392b");
    }

    #[test]
    fn parse_partial_config() {
        let config: BookConfig = toml::from_str(
            r#"
[toc]
max_entries_per_page = 8
"#,
        )
        .unwrap();
        assert_eq!(config.toc.max_entries_per_page, 8);
        assert_eq!(config.toc.title, "Sumário");
        assert_eq!(config.autosave.debounce_ms, 1000);
    }

    #[test]
    fn toc_settings_follow_config() {
        let mut config = BookConfig::default();
        config.toc.max_entries_per_page = 4;
        config.toc.title = "Índice".to_string();
        let settings = config.toc_settings().unwrap();
        assert_eq!(settings.max_per_page.get(), 4);
        assert_eq!(settings.default_title(1), "Índice");
        assert_eq!(settings.default_title(2), "Sumário (continuação)");
    }

    #[test]
    fn theme_config_converts_to_theme() {
        let config = BookConfig::default();
        assert_eq!(Theme::from(&config.theme), Theme::default());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, BookConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r##"
[autosave]
debounce_ms = 250

[theme]
accent = "#2e86de"
"##,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.autosave.debounce_ms, 250);
        assert_eq!(config.theme.accent, "#2e86de");
        assert_eq!(config.theme.bg, "#fffaf3");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "this is not valid toml [[[").unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<BookConfig, _> = toml::from_str(
            r#"
[toc]
max_entries = 10
"#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<BookConfig, _> = toml::from_str("[pdf]\ndpi = 300\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(BookConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_zero_entries_per_page() {
        let mut config = BookConfig::default();
        config.toc.max_entries_per_page = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_entries_per_page"));
        assert!(config.toc_settings().is_err());
    }

    #[test]
    fn validate_blank_toc_title() {
        let mut config = BookConfig::default();
        config.toc.continuation_title = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_storage_key_characters() {
        let mut config = BookConfig::default();
        config.storage.key = "../escape".to_string();
        assert!(config.validate().is_err());
        config.storage.key = String::new();
        assert!(config.validate().is_err());
        config.storage.key = "my_book-2".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_empty_theme_color() {
        let mut config = BookConfig::default();
        config.theme.text = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            "[toc]\nmax_entries_per_page = 0\n",
        )
        .unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[toc]
max_entries_per_page = 12
title = "Sumário"
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str("[toc]\nmax_entries_per_page = 6\n").unwrap();
        let merged = merge_toml(base, overlay);
        let toc = merged.get("toc").unwrap();
        assert_eq!(
            toc.get("max_entries_per_page").unwrap().as_integer(),
            Some(6)
        );
        assert_eq!(toc.get("title").unwrap().as_str(), Some("Sumário"));
    }

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("a = 10").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(10));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(2));
    }

    #[test]
    fn resolve_config_rejects_invalid_values() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str("[storage]\nkey = \"a b\"\n").unwrap();
        let result = resolve_config(base, Some(overlay));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: BookConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, BookConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in ["[toc]", "[autosave]", "[storage]", "[theme]"] {
            assert!(content.contains(section), "missing {section}");
        }
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value().unwrap();
        for section in ["toc", "autosave", "storage", "theme"] {
            assert!(val.get(section).is_some(), "missing {section}");
        }
    }
}
