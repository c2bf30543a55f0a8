//! SDK domain type

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Source language of a submitted snippet.
///
/// Selects which stages the pipeline driver executes: compiled SDKs go
/// through validate → prepare → compile → run, interpreted ones skip the
/// compile stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sdk {
    Java,
    Go,
    Python,
    /// Listed for completeness; no executor configuration exists for it
    /// yet, so submissions are rejected at setup time.
    Scio,
}

impl Sdk {
    /// File extension of a source snippet for this SDK.
    pub fn source_file_extension(&self) -> &'static str {
        match self {
            Sdk::Java => "java",
            Sdk::Go => "go",
            Sdk::Python => "py",
            Sdk::Scio => "scala",
        }
    }

    /// Returns true if this SDK needs a compile stage before running.
    pub fn is_compiled(&self) -> bool {
        matches!(self, Sdk::Java | Sdk::Go | Sdk::Scio)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sdk::Java => "java",
            Sdk::Go => "go",
            Sdk::Python => "python",
            Sdk::Scio => "scio",
        }
    }
}

impl fmt::Display for Sdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown SDK name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sdk: {0}")]
pub struct ParseSdkError(pub String);

impl FromStr for Sdk {
    type Err = ParseSdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "java" => Ok(Sdk::Java),
            "go" => Ok(Sdk::Go),
            "python" => Ok(Sdk::Python),
            "scio" => Ok(Sdk::Scio),
            other => Err(ParseSdkError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_file_extension() {
        assert_eq!(Sdk::Java.source_file_extension(), "java");
        assert_eq!(Sdk::Go.source_file_extension(), "go");
        assert_eq!(Sdk::Python.source_file_extension(), "py");
    }

    #[test]
    fn test_is_compiled() {
        assert!(Sdk::Java.is_compiled());
        assert!(Sdk::Go.is_compiled());
        assert!(!Sdk::Python.is_compiled());
    }

    #[test]
    fn test_parse_roundtrip() {
        for sdk in [Sdk::Java, Sdk::Go, Sdk::Python, Sdk::Scio] {
            assert_eq!(sdk.as_str().parse::<Sdk>(), Ok(sdk));
        }
    }

    #[test]
    fn test_parse_unknown() {
        assert!("rust".parse::<Sdk>().is_err());
    }
}
