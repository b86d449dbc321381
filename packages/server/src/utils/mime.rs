use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MimeTableError {
    #[error("failed to read MIME table: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid MIME table: {0}")]
    Json(#[from] serde_json::Error),
}

/// Extension to content-type overrides, consulted before `mime_guess`.
///
/// The on-disk form is a JSON object mapping each type to its extensions:
/// `{"text/markdown": ["md", ".markdown"]}`. Extensions are matched without
/// the leading dot and case-insensitively.
#[derive(Debug, Default, Clone)]
pub struct MimeTable {
    overrides: HashMap<String, String>,
}

impl MimeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, MimeTableError> {
        let types: HashMap<String, Vec<String>> = serde_json::from_str(json)?;
        let mut table = Self::new();
        for (content_type, extensions) in types {
            for ext in extensions {
                table.insert(&ext, &content_type);
            }
        }
        Ok(table)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, MimeTableError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn insert(&mut self, extension: &str, content_type: &str) {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        if !ext.is_empty() {
            self.overrides.insert(ext, content_type.to_owned());
        }
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// Content type implied by the extension of `name`, if any is known.
    pub fn by_name(&self, name: &str) -> Option<String> {
        let ext = extension_of(name)?.to_ascii_lowercase();
        if let Some(content_type) = self.overrides.get(&ext) {
            return Some(content_type.clone());
        }
        mime_guess::from_ext(&ext).first().map(|m| m.to_string())
    }
}

fn extension_of(name: &str) -> Option<&str> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (_, ext) = base.rsplit_once('.')?;
    (!ext.is_empty()).then_some(ext)
}

/// Media types a browser would render as a document with script.
const ACTIVE_MARKUP: &[&str] = &[
    "text/html",
    "application/xhtml+xml",
    "image/svg+xml",
    "text/xml",
    "application/xml",
];

/// Rewrite markup types a browser would execute to `text/plain`, keeping any
/// parameters. Other types are returned untouched.
pub fn downgrade_markup(content_type: &str) -> String {
    let (essence, params) = match content_type.find(';') {
        Some(pos) => content_type.split_at(pos),
        None => (content_type, ""),
    };
    let essence = essence.trim();

    if ACTIVE_MARKUP
        .iter()
        .any(|markup| essence.eq_ignore_ascii_case(markup))
    {
        format!("text/plain{params}")
    } else {
        content_type.to_owned()
    }
}
