//! XPath backend contract.
//!
//! The binder never touches a document directly: it compiles XPath text
//! into opaque [`CompiledXPath`] handles once per property, and asks an
//! [`XPathProcessor`] to evaluate them against document positions.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::ElementKind;

/// Namespace prefix to URI mapping
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub prefix: String,
    pub uri: String,
}

impl Namespace {
    pub fn new<P: Into<String>, U: Into<String>>(prefix: P, uri: U) -> Self {
        Self {
            prefix: prefix.into(),
            uri: uri.into(),
        }
    }
}

/// Failure reported by an XPath backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum XPathError {
    /// The expression could not be compiled
    #[error("XPath compilation error: {0}")]
    Compile(String),

    /// The expression failed while evaluating
    #[error("XPath evaluation error: {0}")]
    Eval(String),

    /// The handle was produced by a different backend
    #[error("compiled XPath was not produced by this processor")]
    ForeignQuery,
}

impl XPathError {
    /// Create a new XPath compilation error
    pub fn compile<S: Into<String>>(msg: S) -> Self {
        XPathError::Compile(msg.into())
    }

    /// Create a new XPath evaluation error
    pub fn eval<S: Into<String>>(msg: S) -> Self {
        XPathError::Eval(msg.into())
    }
}

/// Compiled, reusable XPath handle.
///
/// Function expressions evaluate to a single string value; all others
/// select a node-set.
#[derive(Clone)]
pub struct CompiledXPath {
    text: Arc<str>,
    namespaces: Arc<[Namespace]>,
    kind: ElementKind,
    is_function: bool,
    handle: Arc<dyn Any + Send + Sync>,
}

impl CompiledXPath {
    pub fn new<H: Any + Send + Sync>(
        text: &str,
        namespaces: &[Namespace],
        kind: ElementKind,
        is_function: bool,
        handle: H,
    ) -> Self {
        Self {
            text: text.into(),
            namespaces: namespaces.into(),
            kind,
            is_function,
            handle: Arc::new(handle),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn is_function(&self) -> bool {
        self.is_function
    }

    /// Backend-specific compiled form
    pub fn handle<H: Any>(&self) -> Option<&H> {
        self.handle.downcast_ref::<H>()
    }
}

impl fmt::Debug for CompiledXPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledXPath")
            .field("text", &self.text)
            .field("kind", &self.kind)
            .field("is_function", &self.is_function)
            .finish_non_exhaustive()
    }
}

/// A position in a parsed document, or a scalar produced by a function
pub trait XmlData {
    /// String value of the node, or the scalar itself
    fn value(&self) -> Cow<'_, str>;

    /// Serialized markup of the node; `None` for scalars
    fn outer_xml(&self) -> Option<String>;

    fn is_node(&self) -> bool;
}

/// Compiles XPath text for a backend.
///
/// Split from [`XPathProcessor`] so descriptors can be built without
/// knowing the document type.
pub trait XPathCompiler: Send + Sync {
    fn compile_xpath(
        &self,
        xpath: &str,
        namespaces: &[Namespace],
        kind: ElementKind,
        is_function: bool,
    ) -> Result<CompiledXPath, XPathError>;
}

/// Evaluates compiled XPaths against document positions.
///
/// Positions derived from one document are not assumed to be usable from
/// several threads at once; implementations serialize access per document.
pub trait XPathProcessor: XPathCompiler {
    /// Document position type
    type Data<'d>: XmlData
    where
        Self: 'd;

    /// Evaluate relative to `data`: the selected nodes in document order,
    /// or one trimmed value for function expressions
    fn process_xpath<'d>(
        &self,
        data: &Self::Data<'d>,
        xpath: &CompiledXPath,
    ) -> Result<Vec<Self::Data<'d>>, XPathError>;

    /// Evaluate `root` to select rows, then each child relative to every row.
    ///
    /// Each row holds, per child, its first result. Without children every
    /// row is the root match itself.
    fn process_xpath_rows<'d>(
        &self,
        data: &Self::Data<'d>,
        root: &CompiledXPath,
        children: &[CompiledXPath],
    ) -> Result<Vec<Vec<Option<Self::Data<'d>>>>, XPathError> {
        let rows = self.process_xpath(data, root)?;
        if children.is_empty() {
            return Ok(rows.into_iter().map(|row| vec![Some(row)]).collect());
        }
        rows.iter()
            .map(|row| {
                children
                    .iter()
                    .map(|child| Ok(self.process_xpath(row, child)?.into_iter().next()))
                    .collect()
            })
            .collect()
    }
}
