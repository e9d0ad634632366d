//! Error types for binding operations

use crate::xpath::XPathError;

/// Result type for binding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause attached to conversion failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for descriptor construction and binding
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested type has no binding descriptor
    #[error("No binding found for type '{type_name}'")]
    BindingNotFound { type_name: String },

    /// A property was requested by name that the descriptor does not declare
    #[error("Type '{type_name}' has no bound property named '{property}'")]
    PropertyBindingNotFound { type_name: String, property: String },

    /// A declared XPath failed to compile
    #[error("Failed to compile XPath '{xpath}' for property '{property}'")]
    XPathCompilation {
        property: String,
        xpath: String,
        #[source]
        source: XPathError,
    },

    /// A compiled XPath failed while evaluating against a live document
    #[error("Failed to evaluate XPath '{xpath}' for property '{property}'")]
    XPathEvaluation {
        property: String,
        xpath: String,
        #[source]
        source: XPathError,
    },

    /// A produced value could not be stored in the property
    #[error(
        "A mismatch occurred assigning property '{property}' to value '{value}'. \
         Property is of type '{expected}' and value is of type '{actual}'."
    )]
    PropertyTypeMismatch {
        property: String,
        value: String,
        expected: String,
        actual: String,
        #[source]
        source: BoxError,
    },

    /// Wrong number of child XPaths for the property's shape
    #[error("Property '{property}' declares {actual} child XPath(s) but its shape requires {expected}")]
    ArityMismatch {
        property: String,
        expected: usize,
        actual: usize,
    },

    /// No constructor, or more than one, matched the requested arity
    #[error("Type '{type_name}' has no usable constructor taking {arity} argument(s): {reason}")]
    Constructor {
        type_name: String,
        arity: usize,
        reason: String,
    },

    /// The type cannot be bound in the requested position
    #[error("Type '{type_name}' is not supported here: {reason}")]
    UnsupportedType { type_name: String, reason: String },

    /// The culture name is not known to the parser factory
    #[error("Unknown culture '{0}'")]
    UnknownCulture(String),

    /// XML parsing failed
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// Input bytes were not valid in the declared encoding
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new binding-not-found error
    pub fn binding_not_found<S: Into<String>>(type_name: S) -> Self {
        Error::BindingNotFound {
            type_name: type_name.into(),
        }
    }

    /// Create a new unsupported-type error
    pub fn unsupported<S: Into<String>, R: Into<String>>(type_name: S, reason: R) -> Self {
        Error::UnsupportedType {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a new constructor selection error
    pub fn constructor<S: Into<String>, R: Into<String>>(
        type_name: S,
        arity: usize,
        reason: R,
    ) -> Self {
        Error::Constructor {
            type_name: type_name.into(),
            arity,
            reason: reason.into(),
        }
    }

    /// Create a new XML parsing error
    pub fn xml_parse<S: Into<String>>(msg: S) -> Self {
        Error::XmlParse(msg.into())
    }

    /// Create a new encoding error
    pub fn encoding<S: Into<String>>(msg: S) -> Self {
        Error::Encoding(msg.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }
}

/// A string could not be parsed into the requested value type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot parse '{input}' as {target}: {reason}")]
pub struct ParseValueError {
    pub input: String,
    pub target: &'static str,
    pub reason: String,
}

impl ParseValueError {
    pub fn new<R: ToString>(input: &str, target: &'static str, reason: R) -> Self {
        Self {
            input: input.to_string(),
            target,
            reason: reason.to_string(),
        }
    }
}

/// A boxed value did not have the type its destination expected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected a value of type '{expected}' but got '{actual}'")]
pub struct AssignError {
    pub expected: &'static str,
    pub actual: &'static str,
}
