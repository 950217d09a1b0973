//! Compiled template loaded from the packaging output.

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::config::TemplateHasher;
use crate::error::{PlanError, Result};

/// A compiled stack template, kept both as raw text and parsed JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTemplate {
    /// Where the template was read from.
    pub path: PathBuf,
    /// Raw template text, uploaded as is.
    pub body: String,
    /// Parsed template, used for hashing.
    pub value: Value,
}

impl CompiledTemplate {
    /// Reads and parses a compiled template.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::InvalidTemplate`] if the file cannot be read or is
    /// not valid JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let body = std::fs::read_to_string(path).map_err(|e| PlanError::InvalidTemplate {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Self::from_body(path, body)
    }

    /// Parses an in-memory template body.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::InvalidTemplate`] if the body is not a JSON object.
    pub fn from_body(path: impl Into<PathBuf>, body: String) -> Result<Self> {
        let path = path.into();

        let value: Value = serde_json::from_str(&body).map_err(|e| PlanError::InvalidTemplate {
            path: path.clone(),
            message: e.to_string(),
        })?;

        if !value.is_object() {
            return Err(PlanError::InvalidTemplate {
                path,
                message: String::from("template must be a JSON object"),
            }
            .into());
        }

        Ok(Self { path, body, value })
    }

    /// Base64 SHA-256 of the normalized template.
    #[must_use]
    pub fn sha256(&self) -> String {
        TemplateHasher::new().hash_template(&self.value)
    }
}
