//! Structured error types shared across the sampler crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`SgcError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (site indices, names, paths, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the sampler.
///
/// `Configuration` errors describe inputs that cannot be sampled (unknown
/// species, mismatched vector lengths, missing chemical potentials). `Usage`
/// errors are caller contract violations such as applying a bias twice; they
/// are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum SgcError {
    /// Invalid configuration, alphabet or run parameters.
    #[error("configuration error: {0}")]
    Configuration(ErrorInfo),
    /// Caller contract violations.
    #[error("usage error: {0}")]
    Usage(ErrorInfo),
    /// Ladder files and run artefacts that could not be read or written.
    #[error("storage error: {0}")]
    Storage(ErrorInfo),
    /// Failures reported by an energy model.
    #[error("model error: {0}")]
    Model(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl SgcError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            SgcError::Configuration(info)
            | SgcError::Usage(info)
            | SgcError::Storage(info)
            | SgcError::Model(info)
            | SgcError::Serde(info) => info,
        }
    }

    /// Adds a context entry to the payload, keeping the variant.
    pub fn with_context(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match self {
            SgcError::Configuration(info) => SgcError::Configuration(info.with_context(key, value)),
            SgcError::Usage(info) => SgcError::Usage(info.with_context(key, value)),
            SgcError::Storage(info) => SgcError::Storage(info.with_context(key, value)),
            SgcError::Model(info) => SgcError::Model(info.with_context(key, value)),
            SgcError::Serde(info) => SgcError::Serde(info.with_context(key, value)),
        }
    }

    /// Shorthand for a configuration error without context.
    pub fn configuration(code: &str, message: impl Into<String>) -> Self {
        SgcError::Configuration(ErrorInfo::new(code, message))
    }

    /// Shorthand for a usage error without context.
    pub fn usage(code: &str, message: impl Into<String>) -> Self {
        SgcError::Usage(ErrorInfo::new(code, message))
    }

    /// Returns true for caller contract violations.
    pub fn is_usage(&self) -> bool {
        matches!(self, SgcError::Usage(_))
    }
}
