//! XPath 1.0 processor backed by sxd-xpath

use std::sync::atomic::{AtomicU64, Ordering};

use sxd_xpath::{Factory, Value};
use tracing::trace;
use xbind_core::{
    CompiledXPath, ElementKind, Namespace, XPathCompiler, XPathError, XPathProcessor,
};

use crate::document::{NodeKind, XmlNode};

static NEXT_QUERY_ID: AtomicU64 = AtomicU64::new(1);

/// XPath 1.0 core library as registered by sxd-xpath
const CORE_FUNCTIONS: &[&str] = &[
    "last",
    "position",
    "count",
    "local-name",
    "namespace-uri",
    "name",
    "string",
    "concat",
    "starts-with",
    "contains",
    "substring-before",
    "substring-after",
    "substring",
    "string-length",
    "normalize-space",
    "translate",
    "boolean",
    "not",
    "true",
    "false",
    "number",
    "sum",
    "floor",
    "ceiling",
    "round",
];

/// Node type tests and operators that may be followed by `(`
const NOT_FUNCTIONS: &[&str] = &[
    "node",
    "text",
    "comment",
    "processing-instruction",
    "and",
    "or",
    "div",
    "mod",
];

/// Backend handle stored in a [`CompiledXPath`].
///
/// sxd's compiled expressions are not `Send`, so the handle keeps the
/// validated text and each document compiles it once on first use.
#[derive(Debug, Clone)]
pub struct SxdQuery {
    pub(crate) id: u64,
    pub(crate) text: String,
    pub(crate) namespaces: Vec<Namespace>,
    pub(crate) is_function: bool,
}

/// sxd-xpath XPath processor
#[derive(Debug, Clone, Default)]
pub struct SxdXPathProcessor {
    namespaces: Vec<Namespace>,
}

impl SxdXPathProcessor {
    /// Create a new sxd processor
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefixes every query may use in addition to those its model declares
    pub fn with_namespaces<I: IntoIterator<Item = Namespace>>(namespaces: I) -> Self {
        Self {
            namespaces: namespaces.into_iter().collect(),
        }
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }
}

impl XPathCompiler for SxdXPathProcessor {
    fn compile_xpath(
        &self,
        xpath: &str,
        namespaces: &[Namespace],
        kind: ElementKind,
        is_function: bool,
    ) -> Result<CompiledXPath, XPathError> {
        Factory::new()
            .build(xpath)
            .map_err(|e| XPathError::compile(e.to_string()))?
            .ok_or_else(|| XPathError::compile("empty expression"))?;

        let declared = |prefix: &str| {
            prefix == "xml"
                || namespaces
                    .iter()
                    .chain(&self.namespaces)
                    .any(|namespace| namespace.prefix == prefix)
        };
        if let Some(prefix) = referenced_prefixes(xpath)
            .into_iter()
            .find(|prefix| !declared(prefix))
        {
            return Err(XPathError::compile(format!("undeclared namespace prefix '{prefix}'")));
        }
        if let Some(name) = called_functions(xpath)
            .into_iter()
            .find(|name| !CORE_FUNCTIONS.contains(name))
        {
            return Err(XPathError::compile(format!("unknown function '{name}'")));
        }

        let all: Vec<Namespace> = self.namespaces.iter().chain(namespaces).cloned().collect();
        let query = SxdQuery {
            id: NEXT_QUERY_ID.fetch_add(1, Ordering::Relaxed),
            text: xpath.to_string(),
            namespaces: all.clone(),
            is_function,
        };
        Ok(CompiledXPath::new(xpath, &all, kind, is_function, query))
    }
}

impl XPathProcessor for SxdXPathProcessor {
    type Data<'d> = XmlNode<'d>;

    fn process_xpath<'d>(
        &self,
        data: &Self::Data<'d>,
        xpath: &CompiledXPath,
    ) -> Result<Vec<Self::Data<'d>>, XPathError> {
        let query = xpath.handle::<SxdQuery>().ok_or(XPathError::ForeignQuery)?;
        let node = match &data.kind {
            NodeKind::Node(node) => *node,
            NodeKind::Value(_) => return Ok(Vec::new()),
        };
        let document = data.document;
        let prepared = document.prepare(query)?;
        let value = prepared
            .xpath
            .evaluate(&prepared.context, node)
            .map_err(|e| XPathError::eval(e.to_string()))?;

        let results: Vec<Self::Data<'d>> = match value {
            Value::Nodeset(nodes) => {
                let nodes = nodes.document_order();
                if query.is_function {
                    nodes
                        .first()
                        .map(|node| document.value(node.string_value().trim().to_string()))
                        .into_iter()
                        .collect()
                } else {
                    nodes.into_iter().map(|node| document.node(node)).collect()
                }
            }
            other => {
                let text = other.string();
                let text = if query.is_function { text.trim().to_string() } else { text };
                vec![document.value(text)]
            }
        };
        trace!(xpath = %query.text, results = results.len(), "evaluated query");
        Ok(results)
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// Namespace prefixes used in qualified names, ignoring string literals
/// and axis separators
fn referenced_prefixes(xpath: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = xpath.char_indices().collect();
    let mut prefixes = Vec::new();
    let mut quote = None;
    for (i, &(position, c)) in chars.iter().enumerate() {
        if let Some(open) = quote {
            if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            ':' => {
                let after_colon = i > 0 && chars[i - 1].1 == ':';
                let before_colon = chars.get(i + 1).is_some_and(|&(_, next)| next == ':');
                if after_colon || before_colon {
                    continue;
                }
                let mut start = i;
                while start > 0 && is_name_char(chars[start - 1].1) {
                    start -= 1;
                }
                if start == i {
                    continue;
                }
                let first = chars[start].1;
                if first.is_alphabetic() || first == '_' {
                    prefixes.push(&xpath[chars[start].0..position]);
                }
            }
            _ => {}
        }
    }
    prefixes
}

/// Names in call position, qualified or not, ignoring string literals,
/// node type tests and operators
fn called_functions(xpath: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = xpath.char_indices().collect();
    let mut names = Vec::new();
    let mut quote = None;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i].1;
        if let Some(open) = quote {
            if c == open {
                quote = None;
            }
            i += 1;
            continue;
        }
        if c == '\'' || c == '"' {
            quote = Some(c);
            i += 1;
            continue;
        }
        let starts_name = (c.is_alphabetic() || c == '_')
            && (i == 0 || !(is_name_char(chars[i - 1].1) || chars[i - 1].1 == '$'));
        if !starts_name {
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && (is_name_char(chars[i].1) || is_prefix_colon(&chars, i)) {
            i += 1;
        }
        let end = chars.get(i).map_or(xpath.len(), |&(position, _)| position);
        let mut next = i;
        while next < chars.len() && chars[next].1.is_whitespace() {
            next += 1;
        }
        let name = &xpath[chars[start].0..end];
        if chars.get(next).is_some_and(|&(_, c)| c == '(') && !NOT_FUNCTIONS.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// A single `:` between two name characters, as in `prefix:local`
fn is_prefix_colon(chars: &[(usize, char)], i: usize) -> bool {
    chars[i].1 == ':'
        && i > 0
        && is_name_char(chars[i - 1].1)
        && chars.get(i + 1).is_some_and(|&(_, next)| next != ':' && is_name_char(next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referenced_prefixes() {
        assert_eq!(referenced_prefixes("a:b/c:d"), vec!["a", "c"]);
        assert_eq!(referenced_prefixes("child::a/@x:id"), vec!["x"]);
        assert_eq!(referenced_prefixes("contains(name, 'a:b')"), Vec::<&str>::new());
        assert!(referenced_prefixes("count(contacts/person)").is_empty());
    }

    #[test]
    fn test_called_functions() {
        assert_eq!(called_functions("count(contacts/person)"), vec!["count"]);
        assert_eq!(
            called_functions("concat(@a, 'x(y)') and (text() or node())"),
            vec!["concat"]
        );
        assert_eq!(called_functions("child::a/@b = sum (c)"), vec!["sum"]);
        assert_eq!(called_functions("f:lookup(x)"), vec!["f:lookup"]);
        assert_eq!(called_functions("$items[last()]"), vec!["last"]);
    }

    #[test]
    fn test_compile_rejects_unknown_functions() {
        let processor = SxdXPathProcessor::new();
        let err = processor
            .compile_xpath("nosuch(x)", &[], ElementKind::Number, true)
            .unwrap_err();
        assert_eq!(err, XPathError::compile("unknown function 'nosuch'"));

        assert!(processor
            .compile_xpath("string-length(normalize-space(name))", &[], ElementKind::Number, true)
            .is_ok());
    }

    #[test]
    fn test_compile_rejects_undeclared_prefix() {
        let processor = SxdXPathProcessor::new();
        let err = processor
            .compile_xpath("p:person/p:name", &[], ElementKind::Text, true)
            .unwrap_err();
        assert_eq!(err, XPathError::compile("undeclared namespace prefix 'p'"));

        let namespaces = [Namespace::new("p", "urn:people")];
        let query = processor
            .compile_xpath("p:person/p:name", &namespaces, ElementKind::Text, true)
            .unwrap();
        assert!(query.is_function());
        assert_eq!(query.namespaces(), &namespaces);
    }

    #[test]
    fn test_compile_rejects_syntax_errors() {
        let processor = SxdXPathProcessor::new();
        let err = processor
            .compile_xpath("person[", &[], ElementKind::Text, false)
            .unwrap_err();
        assert!(matches!(err, XPathError::Compile(_)));
    }
}
