//! Declarative binding markers.
//!
//! A model type implements [`XmlModel`] and records its bindings on a
//! [`ModelDeclaration`]: an optional root path, namespace declarations and
//! one entry per bound member.

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::accessor::{Field, PropertyAccessor};
use crate::error::Result;
use crate::types::{Bindable, BoxedValue, TypeInfo};
use crate::xpath::{Namespace, XmlData};

/// How a property's element values are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Text,
    Number,
    Bool,
    DateTime,
    Enum,
    Complex,
    RawFragment,
}

impl ElementKind {
    /// Kinds eligible for evaluation as a scalar function expression
    pub fn is_simple_scalar(self) -> bool {
        matches!(self, ElementKind::Text | ElementKind::Number | ElementKind::Bool)
    }
}

/// How many values a property holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Scalar,
    Array,
    GenericCollection,
    GenericDictionary,
}

/// Replaces the standard parse pipeline for one property
pub trait CustomBindingResolver: Send + Sync {
    /// Called once while the descriptor is built. The returned kind
    /// overrides the inferred one; an error falls back to the standard
    /// pipeline.
    fn initialize(&self, property: &PropertyInfo<'_>) -> Result<ElementKind>;

    /// Produce the final property value from the root XPath results.
    /// The value must have the property's declared type.
    fn resolve(&self, values: &[&dyn XmlData]) -> Result<Option<BoxedValue>>;
}

/// Per-property format overrides
#[derive(Clone, Default)]
pub struct CustomFormat {
    /// chrono `strftime` pattern for exact date/time parsing
    pub date_time_format: Option<String>,
    /// Match enum names case-insensitively
    pub ignore_case: bool,
    /// Culture used for numbers and free date parsing
    pub culture: Option<String>,
    pub resolver: Option<Arc<dyn CustomBindingResolver>>,
}

impl fmt::Debug for CustomFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomFormat")
            .field("date_time_format", &self.date_time_format)
            .field("ignore_case", &self.ignore_case)
            .field("culture", &self.culture)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

/// What a custom resolver learns about its property
#[derive(Debug, Clone, Copy)]
pub struct PropertyInfo<'a> {
    pub name: &'static str,
    pub declaring_type: &'static str,
    pub property_type: TypeInfo,
    pub xpath: &'a str,
    pub child_xpaths: &'a [String],
}

/// A type bound property by property from XPath results
pub trait XmlModel: Default + Bindable {
    fn declare(model: &mut ModelDeclaration<Self>);
}

/// One declared member binding
pub struct PropertyDeclaration {
    pub(crate) name: &'static str,
    pub(crate) xpath: String,
    pub(crate) child_xpaths: Vec<String>,
    pub(crate) target: TypeInfo,
    pub(crate) accessor: PropertyAccessor,
    pub(crate) format: CustomFormat,
}

impl PropertyDeclaration {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn xpath(&self) -> &str {
        &self.xpath
    }

    pub fn child_xpaths(&self) -> &[String] {
        &self.child_xpaths
    }

    pub fn date_time_format<S: Into<String>>(&mut self, format: S) -> &mut Self {
        self.format.date_time_format = Some(format.into());
        self
    }

    pub fn ignore_case(&mut self) -> &mut Self {
        self.format.ignore_case = true;
        self
    }

    pub fn culture<S: Into<String>>(&mut self, culture: S) -> &mut Self {
        self.format.culture = Some(culture.into());
        self
    }

    pub fn resolver<R: CustomBindingResolver + 'static>(&mut self, resolver: R) -> &mut Self {
        self.format.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn format(&mut self, format: CustomFormat) -> &mut Self {
        self.format = format;
        self
    }
}

impl fmt::Debug for PropertyDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDeclaration")
            .field("name", &self.name)
            .field("xpath", &self.xpath)
            .field("child_xpaths", &self.child_xpaths)
            .field("target", &self.target)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Builder handed to [`XmlModel::declare`]
pub struct ModelDeclaration<M> {
    root_xpath: Option<String>,
    namespaces: Vec<Namespace>,
    properties: Vec<PropertyDeclaration>,
    _model: PhantomData<fn() -> M>,
}

impl<M: XmlModel> ModelDeclaration<M> {
    fn new() -> Self {
        Self {
            root_xpath: None,
            namespaces: Vec::new(),
            properties: Vec::new(),
            _model: PhantomData,
        }
    }

    /// Path prefixed to every property path of this type
    pub fn root_xpath<S: Into<String>>(&mut self, xpath: S) -> &mut Self {
        self.root_xpath = Some(xpath.into());
        self
    }

    pub fn namespace<P: Into<String>, U: Into<String>>(&mut self, prefix: P, uri: U) -> &mut Self {
        self.namespaces.push(Namespace::new(prefix, uri));
        self
    }

    /// Bind a member to one XPath
    pub fn xpath<P, S>(
        &mut self,
        name: &'static str,
        xpath: S,
        field: Field<M, P>,
    ) -> &mut PropertyDeclaration
    where
        P: Bindable,
        S: Into<String>,
    {
        self.push(name, xpath.into(), Vec::new(), field)
    }

    /// Bind a member to row XPaths: `root` selects rows and each child is
    /// evaluated relative to every row
    pub fn xpath_rows<P, S>(
        &mut self,
        name: &'static str,
        root: S,
        children: &[&str],
        field: Field<M, P>,
    ) -> &mut PropertyDeclaration
    where
        P: Bindable,
        S: Into<String>,
    {
        let children = children.iter().map(|child| child.to_string()).collect();
        self.push(name, root.into(), children, field)
    }

    /// Bind a member to an attribute of the context node
    pub fn attribute<P: Bindable>(
        &mut self,
        name: &'static str,
        attribute: &str,
        field: Field<M, P>,
    ) -> &mut PropertyDeclaration {
        self.push(name, format!("@{attribute}"), Vec::new(), field)
    }

    /// Bind a member to a child element of the context node
    pub fn element<P: Bindable>(
        &mut self,
        name: &'static str,
        element: &str,
        field: Field<M, P>,
    ) -> &mut PropertyDeclaration {
        self.push(name, element.to_string(), Vec::new(), field)
    }

    fn push<P: Bindable>(
        &mut self,
        name: &'static str,
        xpath: String,
        child_xpaths: Vec<String>,
        field: Field<M, P>,
    ) -> &mut PropertyDeclaration {
        self.properties.push(PropertyDeclaration {
            name,
            xpath,
            child_xpaths,
            target: TypeInfo::of::<P>(),
            accessor: field.erase(),
            format: CustomFormat::default(),
        });
        let last = self.properties.len() - 1;
        &mut self.properties[last]
    }
}

/// Type-erased result of running a model's declaration
#[derive(Debug)]
pub struct ModelSchema {
    pub(crate) type_name: &'static str,
    pub(crate) root_xpath: Option<String>,
    pub(crate) namespaces: Vec<Namespace>,
    pub(crate) properties: Vec<PropertyDeclaration>,
}

impl ModelSchema {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn root_xpath(&self) -> Option<&str> {
        self.root_xpath.as_deref()
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    pub fn properties(&self) -> &[PropertyDeclaration] {
        &self.properties
    }
}

pub(crate) fn model_schema<M: XmlModel>() -> ModelSchema {
    let mut declaration = ModelDeclaration::<M>::new();
    M::declare(&mut declaration);
    ModelSchema {
        type_name: type_name::<M>(),
        root_xpath: declaration.root_xpath,
        namespaces: declaration.namespaces,
        properties: declaration.properties,
    }
}
