//! Localized label catalog and the label → command translation table.
//!
//! Both are flat JSON objects loaded once at startup. A catalog that cannot be
//! read or parsed is a startup failure.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::commands::CommandKey;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read asset `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse asset `{origin}`: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("asset `{origin}` maps label `{label}` to unknown command `{command}`")]
    UnknownCommand { origin: String, label: String, command: String },
}

fn read_flat_object(path: &Path) -> Result<BTreeMap<String, String>, CatalogError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| CatalogError::Read { path: path.to_path_buf(), source })?;
    parse_flat_object(&path.display().to_string(), &raw)
}

fn parse_flat_object(origin: &str, raw: &str) -> Result<BTreeMap<String, String>, CatalogError> {
    serde_json::from_str(raw)
        .map_err(|source| CatalogError::Parse { origin: origin.to_owned(), source })
}

/// Label key → localized text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelCatalog {
    entries: BTreeMap<String, String>,
}

impl LabelCatalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Ok(Self { entries: read_flat_object(path.as_ref())? })
    }

    pub fn from_json_str(origin: &str, raw: &str) -> Result<Self, CatalogError> {
        Ok(Self { entries: parse_flat_object(origin, raw)? })
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self { entries: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Localized text for `key`, or the key itself when the catalog has no entry.
    pub fn text(&self, key: &str) -> String {
        self.get(key).unwrap_or(key).to_owned()
    }

    /// Fills `%s`, `%d` and `%v` placeholders positionally; `%%` is a literal
    /// percent sign. Placeholders without a matching argument are kept as-is.
    pub fn render(&self, key: &str, args: &[&(dyn fmt::Display + Sync)]) -> String {
        let template = self.get(key).unwrap_or(key);
        let mut rendered = String::with_capacity(template.len());
        let mut args = args.iter();
        let mut chars = template.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch != '%' {
                rendered.push(ch);
                continue;
            }
            match chars.peek().copied() {
                Some('%') => {
                    chars.next();
                    rendered.push('%');
                }
                Some(verb @ ('s' | 'd' | 'v')) => {
                    chars.next();
                    match args.next() {
                        Some(arg) => rendered.push_str(&arg.to_string()),
                        None => {
                            rendered.push('%');
                            rendered.push(verb);
                        }
                    }
                }
                _ => rendered.push('%'),
            }
        }

        rendered
    }

    /// Label keys whose localized text equals `text` exactly, in key order.
    pub fn label_keys_for<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(_, value)| value.as_str() == text)
            .map(|(key, _)| key.as_str())
    }
}

/// Label key → command key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandTable {
    entries: BTreeMap<String, CommandKey>,
}

impl CommandTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        Self::from_raw(&path.display().to_string(), read_flat_object(path)?)
    }

    pub fn from_json_str(origin: &str, raw: &str) -> Result<Self, CatalogError> {
        Self::from_raw(origin, parse_flat_object(origin, raw)?)
    }

    pub fn from_pairs<K>(pairs: impl IntoIterator<Item = (K, CommandKey)>) -> Self
    where
        K: Into<String>,
    {
        Self { entries: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect() }
    }

    fn from_raw(origin: &str, raw: BTreeMap<String, String>) -> Result<Self, CatalogError> {
        let mut entries = BTreeMap::new();
        for (label, command) in raw {
            let key = command.parse::<CommandKey>().map_err(|_| CatalogError::UnknownCommand {
                origin: origin.to_owned(),
                label: label.clone(),
                command: command.clone(),
            })?;
            entries.insert(label, key);
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn label_keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn command_for(&self, label_key: &str) -> Option<CommandKey> {
        self.entries.get(label_key).copied()
    }
}
