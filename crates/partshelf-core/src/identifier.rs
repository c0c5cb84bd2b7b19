// ABOUTME: LCSC part identifier newtype and the validation errors raised for user input.
// ABOUTME: Identifiers look like C123456 (case-insensitive leading C, then digits).

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[Cc]\d+$").expect("identifier pattern is valid"));

/// Errors raised while validating submitted identifiers or tabular uploads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid LCSC ID format: '{0}'. Must be like C123456.")]
    InvalidIdentifier(String),

    #[error("CSV file must contain an 'LCSC' column.")]
    MissingColumn,

    #[error("Could not read CSV file. Please ensure it is UTF-8 encoded.")]
    NotUtf8,
}

/// A validated LCSC part number. The original casing is preserved because
/// the converter and the ledger both treat it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Parse a raw identifier, trimming surrounding whitespace first.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if IDENTIFIER_RE.is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(ValidationError::InvalidIdentifier(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}
