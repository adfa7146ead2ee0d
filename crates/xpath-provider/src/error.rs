use std::error::Error as StdError;
use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::document::DocumentError;
use crate::value::ReturnType;

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors surfaced by compilation, evaluation and result conversion.
#[derive(Debug, Error)]
pub enum XPathError {
    #[error("cannot compile XPath `{expression}`: {message}")]
    Compile { expression: String, message: String },
    #[error("XPath evaluation failed for `{expression}`: {message}")]
    Evaluation {
        expression: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("function `{name}` is disabled by secure processing")]
    FunctionDisabled { name: String },
    #[error("cannot convert {found} to {target}")]
    Conversion { target: ReturnType, found: &'static str },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl XPathError {
    pub(crate) fn compile(expression: &str, message: impl Into<String>) -> Self {
        Self::Compile { expression: expression.to_owned(), message: message.into() }
    }

    pub(crate) fn evaluation(expression: &str, message: impl Into<String>) -> Self {
        Self::Evaluation { expression: expression.to_owned(), message: message.into(), source: None }
    }

    /// True when the failure stems from function resolution rather than the expression itself.
    pub fn is_function_error(&self) -> bool {
        matches!(self, Self::FunctionDisabled { .. })
    }

    /// Fills in the expression text for errors raised below the expression level.
    pub(crate) fn in_expression(self, text: &str) -> Self {
        match self {
            Self::Evaluation { expression, message, source } if expression.is_empty() => {
                Self::Evaluation { expression: text.to_owned(), message, source }
            }
            other => other,
        }
    }
}

/// Failure reported by a host-supplied extension function.
#[derive(Debug)]
pub struct FunctionError {
    message: String,
    source: Option<BoxError>,
}

impl FunctionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), source: None }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self { message: message.into(), source: Some(source.into()) }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for FunctionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for FunctionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|source| source as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn only_disabled_functions_count_as_function_errors() {
        let disabled = XPathError::FunctionDisabled { name: "count".into() };
        let generic = XPathError::evaluation("count(/)", "boom");
        assert!(disabled.is_function_error());
        assert!(!generic.is_function_error());
    }

    #[rstest]
    fn expression_text_is_filled_only_when_missing() {
        let error = XPathError::evaluation("", "boom").in_expression("f()");
        match error {
            XPathError::Evaluation { expression, .. } => assert_eq!(expression, "f()"),
            other => panic!("unexpected error: {:?}", other),
        }

        let error = XPathError::evaluation("g()", "boom").in_expression("f()");
        match error {
            XPathError::Evaluation { expression, .. } => assert_eq!(expression, "g()"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[rstest]
    fn function_error_exposes_its_source() {
        let io = std::io::Error::other("disk gone");
        let error = FunctionError::with_source("lookup failed", io);
        assert_eq!(error.to_string(), "lookup failed");
        assert_eq!(error.source().map(ToString::to_string).as_deref(), Some("disk gone"));
    }
}
