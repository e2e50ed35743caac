use thiserror::Error;

pub type MinibarsResult<T> = std::result::Result<T, MinibarsError>;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ParseErrorKind {
    #[error("Expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },
    #[error("Unexpected EOF{expected_what}")]
    UnexpectedEOF {
        /// Describes what was expected, e.g., " (expected '{{/each}}')"
        expected_what: String,
    },
    #[error("Invalid identifier starting with '{at_char}'")]
    InvalidIdentifier { at_char: String },
    #[error("'{open}' was closed by '{close}'")]
    MismatchedClose { open: String, close: String },
    #[error("Blocks nested deeper than {limit} levels")]
    NestingTooDeep { limit: usize },
    #[error("Expected {description}")]
    Expected { description: String },
    #[error("Parser error: {0}")]
    Message(String),
}

impl ParseErrorKind {
    pub fn unexpected_eof(expected: Option<String>) -> Self {
        Self::UnexpectedEOF {
            expected_what: expected.map_or_else(String::new, |e| format!(" (expected '{e}')")),
        }
    }
}

/// A template that does not follow the grammar.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("Parse error at line {line}, column {column}: {kind} (near \"{context}\")")]
pub struct ParseError {
    /// 1-indexed.
    pub line: usize,
    /// 1-indexed, in bytes from the start of the line.
    pub column: usize,
    /// Byte offset into the template.
    pub position: usize,
    /// The template text around `position`.
    pub context: String,
    #[source]
    pub kind: ParseErrorKind,
}

/// Raised by a [`HostObject`](crate::HostObject) that failed while one of its
/// fields was being read.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("{type_name} failed while reading '{key}': {message}")]
pub struct HostAccessError {
    pub type_name: String,
    pub key: String,
    pub message: String,
}

impl HostAccessError {
    pub fn new<T, K, M>(type_name: T, key: K, message: M) -> Self
    where
        T: Into<String>,
        K: Into<String>,
        M: Into<String>,
    {
        Self {
            type_name: type_name.into(),
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum MinibarsError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Helper not found: {helper_name}")]
    MissingHelper { helper_name: String },
    #[error("Partial not found: {partial_name}")]
    MissingPartial { partial_name: String },
    #[error("Partial '{partial_name}' could not be compiled: {source}")]
    InvalidPartial {
        partial_name: String,
        source: ParseError,
    },
    #[error(transparent)]
    HostAccess(#[from] HostAccessError),
    #[error("Helper '{helper_name}' failed: {message}")]
    Helper {
        helper_name: String,
        message: String,
    },
    #[error("Partial '{partial_name}' exceeded the nesting limit of {limit}")]
    RecursionLimit { partial_name: String, limit: usize },
}

impl MinibarsError {
    pub fn helper<N: Into<String>, M: Into<String>>(helper_name: N, message: M) -> Self {
        Self::Helper {
            helper_name: helper_name.into(),
            message: message.into(),
        }
    }
}
