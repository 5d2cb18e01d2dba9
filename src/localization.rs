//! Localized display strings
//!
//! Strings live in `<dir>/<code>/strings.json` as `{ key: { message, description } }`.
//! A lookup that misses returns the caller's fallback and remembers it, so
//! [`Localizer::export`] can write a complete template for translators.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::constants::localization;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    Japanese,
    German,
    French,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::English, Language::Japanese, Language::German, Language::French];

    /// Directory name of the language's strings
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Japanese => "jp",
            Language::German => "de",
            Language::French => "fr",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Language::ALL
            .into_iter()
            .find(|language| language.code().eq_ignore_ascii_case(s))
            .with_context(|| format!("Unknown language code '{}' (expected en, jp, de or fr)", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedString {
    pub message: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Default)]
pub struct Localizer {
    language: Language,
    strings: BTreeMap<String, LocalizedString>,
    /// Keys answered with a fallback
    missing: usize,
}

impl Localizer {
    /// Localizer with no strings; every lookup returns its fallback
    pub fn new(language: Language) -> Self {
        Self {
            language,
            ..Default::default()
        }
    }

    /// Load the strings for `language` from `dir`
    /// A missing strings file is not an error.
    pub fn load(dir: &Path, language: Language) -> Result<Self> {
        let path = dir.join(language.code()).join(localization::STRINGS_FILE);
        if !path.exists() {
            debug!(path = %path.display(), "No strings file, using fallbacks");
            return Ok(Self::new(language));
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read strings file: {:?}", path))?;
        let strings: BTreeMap<String, LocalizedString> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse strings file: {:?}", path))?;
        info!(language = %language, count = strings.len(), "Loaded localized strings");

        Ok(Self {
            language,
            strings,
            missing: 0,
        })
    }

    /// Message for `key`, or `fallback` (recorded for export) when unknown
    pub fn localize(&mut self, key: &str, fallback: &str, description: Option<&str>) -> String {
        if let Some(found) = self.strings.get(key) {
            return found.message.clone();
        }
        self.missing += 1;
        let description = description.map_or_else(|| format!("{} - {}", key, fallback), str::to_string);
        self.strings.insert(
            key.to_string(),
            LocalizedString {
                message: fallback.to_string(),
                description,
            },
        );
        fallback.to_string()
    }

    pub fn missing_count(&self) -> usize {
        self.missing
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Write every known string, loaded or defaulted, as a strings file
    pub fn export(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(&self.strings).context("Failed to serialize strings")?;
        fs::write(path, json).with_context(|| format!("Failed to write strings file: {:?}", path))?;
        info!(path = %path.display(), language = %self.language, count = self.strings.len(), "Exported strings");
        Ok(())
    }
}
