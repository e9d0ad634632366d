//! Parsed documents and positions within them

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;

use encoding_rs::Encoding;
use sxd_document::dom::{self, ChildOfElement};
use sxd_document::Package;
use sxd_xpath::nodeset::Node;
use sxd_xpath::{Context, Factory, XPath};
use tracing::debug;
use xbind_core::error::{Error, Result};
use xbind_core::{Namespace, XPathError, XmlData};

use crate::xpath::SxdQuery;

/// A compiled query bound to the namespaces it is evaluated with
pub(crate) struct PreparedQuery {
    pub(crate) xpath: XPath,
    pub(crate) context: Context<'static>,
}

/// Parsed XML document.
///
/// Documents are not `Send`: every position derived from one is evaluated
/// on the thread that owns it. Queries are prepared lazily, once per
/// document.
pub struct XmlDocument {
    package: Package,
    namespaces: Vec<Namespace>,
    prepared: RefCell<HashMap<u64, Rc<PreparedQuery>>>,
}

impl XmlDocument {
    pub fn parse(xml: &str) -> Result<Self> {
        let package =
            sxd_document::parser::parse(xml).map_err(|e| Error::xml_parse(format!("{e:?}")))?;
        Ok(Self {
            package,
            namespaces: Vec::new(),
            prepared: RefCell::new(HashMap::new()),
        })
    }

    /// Decode `bytes` as `encoding` (a byte order mark takes precedence)
    pub fn from_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<Self> {
        let (text, actual, had_errors) = encoding.decode(bytes);
        if had_errors {
            return Err(Error::encoding(format!("input is not valid {}", actual.name())));
        }
        Self::parse(&text)
    }

    pub fn from_reader<R: Read>(mut reader: R, encoding: &'static Encoding) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes, encoding)
    }

    pub fn from_file<P: AsRef<Path>>(path: P, encoding: &'static Encoding) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes, encoding)
    }

    /// Namespaces available to every query evaluated against this document
    pub fn with_namespaces<I: IntoIterator<Item = Namespace>>(mut self, namespaces: I) -> Self {
        self.namespaces.extend(namespaces);
        self.prepared.borrow_mut().clear();
        self
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    /// The document element
    pub fn root(&self) -> Result<XmlNode<'_>> {
        self.package
            .as_document()
            .root()
            .children()
            .into_iter()
            .find_map(|child| child.element())
            .map(|element| self.node(Node::Element(element)))
            .ok_or_else(|| Error::xml_parse("document has no root element"))
    }

    /// The document node, parent of the document element
    pub fn document_node(&self) -> XmlNode<'_> {
        self.node(Node::Root(self.package.as_document().root()))
    }

    pub(crate) fn node<'d>(&'d self, node: Node<'d>) -> XmlNode<'d> {
        XmlNode {
            document: self,
            kind: NodeKind::Node(node),
        }
    }

    pub(crate) fn value(&self, value: String) -> XmlNode<'_> {
        XmlNode {
            document: self,
            kind: NodeKind::Value(value),
        }
    }

    pub(crate) fn prepare(
        &self,
        query: &SxdQuery,
    ) -> std::result::Result<Rc<PreparedQuery>, XPathError> {
        if let Some(prepared) = self.prepared.borrow().get(&query.id) {
            return Ok(Rc::clone(prepared));
        }
        let xpath = Factory::new()
            .build(&query.text)
            .map_err(|e| XPathError::compile(e.to_string()))?
            .ok_or_else(|| XPathError::compile(format!("'{}' is not an expression", query.text)))?;
        let mut context = Context::new();
        for namespace in self.namespaces.iter().chain(&query.namespaces) {
            context.set_namespace(&namespace.prefix, &namespace.uri);
        }
        debug!(xpath = %query.text, "prepared query for document");
        let prepared = Rc::new(PreparedQuery { xpath, context });
        self.prepared.borrow_mut().insert(query.id, Rc::clone(&prepared));
        Ok(prepared)
    }
}

impl FromStr for XmlDocument {
    type Err = Error;

    fn from_str(xml: &str) -> Result<Self> {
        Self::parse(xml)
    }
}

impl std::fmt::Debug for XmlDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlDocument")
            .field("namespaces", &self.namespaces)
            .field("prepared", &self.prepared.borrow().len())
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub(crate) enum NodeKind<'d> {
    Node(Node<'d>),
    Value(String),
}

/// A node of an [`XmlDocument`], or a scalar produced by a function query
#[derive(Clone)]
pub struct XmlNode<'d> {
    pub(crate) document: &'d XmlDocument,
    pub(crate) kind: NodeKind<'d>,
}

impl<'d> XmlNode<'d> {
    pub fn document(&self) -> &'d XmlDocument {
        self.document
    }
}

impl XmlData for XmlNode<'_> {
    fn value(&self) -> Cow<'_, str> {
        match &self.kind {
            NodeKind::Node(node) => Cow::Owned(node.string_value()),
            NodeKind::Value(value) => Cow::Borrowed(value),
        }
    }

    fn outer_xml(&self) -> Option<String> {
        let NodeKind::Node(node) = &self.kind else {
            return None;
        };
        let mut out = String::new();
        match node {
            Node::Root(root) => {
                for element in root.children().into_iter().filter_map(|child| child.element()) {
                    write_element(&mut out, element, &[], None);
                }
            }
            Node::Element(element) => write_element(&mut out, *element, &[], None),
            Node::Attribute(attribute) => {
                let name = attribute.name();
                out.push_str(&qualified(attribute.preferred_prefix(), name.local_part()));
                out.push_str("=\"");
                escape_into(&mut out, attribute.value(), true);
                out.push('"');
            }
            Node::Text(text) => escape_into(&mut out, text.text(), false),
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment.text());
                out.push_str("-->");
            }
            Node::ProcessingInstruction(pi) => write_pi(&mut out, *pi),
            Node::Namespace(_) => return Some(node.string_value()),
        }
        Some(out)
    }

    fn is_node(&self) -> bool {
        matches!(self.kind, NodeKind::Node(_))
    }
}

impl std::fmt::Debug for XmlNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            NodeKind::Node(node) => f.debug_tuple("XmlNode").field(node).finish(),
            NodeKind::Value(value) => f.debug_tuple("XmlValue").field(value).finish(),
        }
    }
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

fn write_pi(out: &mut String, pi: dom::ProcessingInstruction<'_>) {
    out.push_str("<?");
    out.push_str(pi.target());
    if let Some(value) = pi.value() {
        out.push(' ');
        out.push_str(value);
    }
    out.push_str("?>");
}

/// Namespace declarations are emitted where they first come into scope
fn write_element(
    out: &mut String,
    element: dom::Element<'_>,
    parent_scope: &[(String, String)],
    default_ns: Option<&str>,
) {
    let name = element.name();
    let tag = qualified(element.preferred_prefix(), name.local_part());
    out.push('<');
    out.push_str(&tag);

    let scope: Vec<(String, String)> = element
        .namespaces_in_scope()
        .into_iter()
        .filter(|namespace| namespace.prefix() != "xml")
        .map(|namespace| (namespace.prefix().to_string(), namespace.uri().to_string()))
        .collect();
    for (prefix, uri) in scope.iter().filter(|declared| !parent_scope.contains(declared)) {
        out.push_str(" xmlns:");
        out.push_str(prefix);
        out.push_str("=\"");
        escape_into(out, uri, true);
        out.push('"');
    }
    let element_ns = match element.preferred_prefix() {
        None => name.namespace_uri(),
        Some(_) => default_ns,
    };
    if element.preferred_prefix().is_none() && element_ns != default_ns {
        out.push_str(" xmlns=\"");
        escape_into(out, element_ns.unwrap_or_default(), true);
        out.push('"');
    }

    for attribute in element.attributes() {
        out.push(' ');
        out.push_str(&qualified(attribute.preferred_prefix(), attribute.name().local_part()));
        out.push_str("=\"");
        escape_into(out, attribute.value(), true);
        out.push('"');
    }

    let children = element.children();
    if children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in children {
        match child {
            ChildOfElement::Element(child) => write_element(out, child, &scope, element_ns),
            ChildOfElement::Text(text) => escape_into(out, text.text(), false),
            ChildOfElement::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment.text());
                out.push_str("-->");
            }
            ChildOfElement::ProcessingInstruction(pi) => write_pi(out, pi),
        }
    }
    out.push_str("</");
    out.push_str(&tag);
    out.push('>');
}
