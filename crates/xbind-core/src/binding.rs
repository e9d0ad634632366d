//! Resolved binding metadata.
//!
//! A [`BindingDescriptor`] is created as a shell (model type, constructor,
//! namespaces) and registered before its [`PropertyBinding`]s are built, so
//! a property whose element type leads back to the model receives the shell
//! instead of recursing.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use tracing::warn;

use crate::accessor::{
    is_enumerable, peel_wrappers, rewrap, ArrayShape, CollectionShape, DictionaryShape,
    ModelShape, PropertyAccessor, WrapFn,
};
use crate::error::{AssignError, Error, Result};
use crate::model::{
    Cardinality, CustomBindingResolver, CustomFormat, ElementKind, PropertyDeclaration,
    PropertyInfo,
};
use crate::parse::{MultiValueParser, ValueParser, ValueParserFactory};
use crate::registry::BindingRegistry;
use crate::types::{BoxedValue, TypeInfo, TypeShape};
use crate::xpath::{CompiledXPath, Namespace, XPathCompiler};

/// Join a type-level root path and a property path without doubling `/`
pub fn join_xpath(root: Option<&str>, path: &str) -> String {
    let root = match root.map(str::trim) {
        Some(root) if !root.is_empty() => root,
        _ => return path.to_string(),
    };
    let path = path.trim();
    if path.is_empty() {
        return root.to_string();
    }
    let head = root.trim_end_matches('/');
    if path.starts_with("//") {
        return format!("{head}{path}");
    }
    let tail = path.trim_start_matches('/');
    if head.is_empty() {
        format!("/{tail}")
    } else {
        format!("{head}/{tail}")
    }
}

/// Everything a descriptor needs while its properties are built
pub(crate) struct BuildContext<'a> {
    pub(crate) registry: &'a BindingRegistry,
    pub(crate) compiler: &'a dyn XPathCompiler,
    pub(crate) parsers: ValueParserFactory<'a>,
}

/// Resolved metadata for one model type
pub struct BindingDescriptor {
    model_type: TypeInfo,
    root_xpath: Option<String>,
    namespaces: Vec<Namespace>,
    create: fn() -> BoxedValue,
    declarations: Mutex<Vec<PropertyDeclaration>>,
    properties: OnceLock<Vec<PropertyBinding>>,
}

impl BindingDescriptor {
    pub(crate) fn shell(model_type: TypeInfo, shape: &ModelShape) -> Self {
        let schema = shape.schema();
        Self {
            model_type,
            root_xpath: schema.root_xpath,
            namespaces: schema.namespaces,
            create: shape.create_fn(),
            declarations: Mutex::new(schema.properties),
            properties: OnceLock::new(),
        }
    }

    /// Second pass: compile XPaths and build conversions for every property
    pub(crate) fn initialize(&self, cx: &BuildContext<'_>) -> Result<()> {
        let declarations = std::mem::take(&mut *self.declarations.lock());
        let properties = declarations
            .into_iter()
            .map(|declaration| PropertyBinding::build(declaration, self, cx))
            .collect::<Result<Vec<_>>>()?;
        let _ = self.properties.set(properties);
        Ok(())
    }

    pub fn model_type(&self) -> TypeInfo {
        self.model_type
    }

    pub fn root_xpath(&self) -> Option<&str> {
        self.root_xpath.as_deref()
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    /// Property bindings in declaration order; empty until initialized
    pub fn properties(&self) -> &[PropertyBinding] {
        self.properties.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn property(&self, name: &str) -> Option<&PropertyBinding> {
        self.properties().iter().find(|property| property.name == name)
    }

    pub fn is_initialized(&self) -> bool {
        self.properties.get().is_some()
    }

    /// Default-constructed model instance
    pub fn create_instance(&self) -> BoxedValue {
        (self.create)()
    }
}

impl fmt::Debug for BindingDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingDescriptor")
            .field("model_type", &self.model_type)
            .field("root_xpath", &self.root_xpath)
            .field("namespaces", &self.namespaces)
            .field("properties", &self.properties())
            .finish()
    }
}

/// Stage (a): one query result to one typed value
pub(crate) enum ItemConversion {
    Parse(ValueParser),
    Fragment,
    Nested(Weak<BindingDescriptor>),
}

impl ItemConversion {
    fn kind(&self) -> ElementKind {
        match self {
            ItemConversion::Parse(parser) => parser.kind(),
            ItemConversion::Fragment => ElementKind::RawFragment,
            ItemConversion::Nested(_) => ElementKind::Complex,
        }
    }
}

/// How query results become values
pub(crate) enum Conversion {
    /// Every node selected by the root query
    Nodes(ItemConversion),
    /// The single child of every row
    Child(ItemConversion),
    /// All children of a row, passed to one constructor
    Construct(MultiValueParser),
    /// Key and value children of a row
    Entry {
        key: ValueParser,
        value: ItemConversion,
    },
    /// Replaces stages (a) and (b)
    Custom(Arc<dyn CustomBindingResolver>),
}

pub(crate) enum Collected {
    Values(Vec<BoxedValue>),
    Pairs(Vec<(BoxedValue, BoxedValue)>),
}

/// Stage (b): typed values to the final property value
pub(crate) enum Finisher {
    First {
        wraps: Vec<WrapFn>,
    },
    Array {
        shape: ArrayShape,
        wraps: Vec<WrapFn>,
    },
    Collection {
        shape: CollectionShape,
        wraps: Vec<WrapFn>,
    },
    Dictionary {
        shape: DictionaryShape,
        key_wraps: Vec<WrapFn>,
        value_wraps: Vec<WrapFn>,
    },
}

fn rewrap_all(
    values: Vec<BoxedValue>,
    wraps: &[WrapFn],
) -> std::result::Result<Vec<BoxedValue>, AssignError> {
    values.into_iter().map(|value| rewrap(value, wraps)).collect()
}

impl Finisher {
    /// Arrays and collections are created even when nothing matched
    pub(crate) fn finish(
        &self,
        collected: Collected,
    ) -> std::result::Result<Option<BoxedValue>, AssignError> {
        match (self, collected) {
            (Finisher::First { wraps }, Collected::Values(values)) => values
                .into_iter()
                .next()
                .map(|value| rewrap(value, wraps))
                .transpose(),
            (Finisher::Array { shape, wraps }, Collected::Values(values)) => {
                shape.materialize(rewrap_all(values, wraps)?).map(Some)
            }
            (Finisher::Collection { shape, wraps }, Collected::Values(values)) => {
                shape.populate(rewrap_all(values, wraps)?).map(Some)
            }
            (
                Finisher::Dictionary {
                    shape,
                    key_wraps,
                    value_wraps,
                },
                Collected::Pairs(pairs),
            ) => {
                let pairs = pairs
                    .into_iter()
                    .map(|(key, value)| Ok((rewrap(key, key_wraps)?, rewrap(value, value_wraps)?)))
                    .collect::<std::result::Result<Vec<_>, AssignError>>()?;
                shape.populate(pairs).map(Some)
            }
            (_, Collected::Values(_)) => Err(AssignError {
                expected: "key/value pairs",
                actual: "values",
            }),
            (_, Collected::Pairs(_)) => Err(AssignError {
                expected: "values",
                actual: "key/value pairs",
            }),
        }
    }
}

enum Container {
    Single,
    Array(ArrayShape),
    Collection(CollectionShape),
    Dictionary(DictionaryShape),
}

/// Per-property binding pipeline
pub struct PropertyBinding {
    name: &'static str,
    declaring_type: &'static str,
    property_type: TypeInfo,
    element_kind: ElementKind,
    argument_kinds: Vec<ElementKind>,
    cardinality: Cardinality,
    root_query: CompiledXPath,
    child_queries: Vec<CompiledXPath>,
    element_type: TypeInfo,
    key_type: Option<TypeInfo>,
    nested: Option<Weak<BindingDescriptor>>,
    accessor: PropertyAccessor,
    conversion: Conversion,
    finisher: Finisher,
    format: CustomFormat,
}

impl PropertyBinding {
    fn build(
        declaration: PropertyDeclaration,
        owner: &BindingDescriptor,
        cx: &BuildContext<'_>,
    ) -> Result<Self> {
        let PropertyDeclaration {
            name,
            xpath,
            child_xpaths,
            target,
            accessor,
            format,
        } = declaration;
        let declaring_type = owner.model_type.name();

        let (cardinality, container) = match target.shape() {
            TypeShape::Array(shape) => (Cardinality::Array, Container::Array(shape)),
            TypeShape::Dictionary(shape) => {
                (Cardinality::GenericDictionary, Container::Dictionary(shape))
            }
            TypeShape::Collection(shape) => {
                (Cardinality::GenericCollection, Container::Collection(shape))
            }
            _ => (Cardinality::Scalar, Container::Single),
        };
        let (element_type, element_wraps) = peel_wrappers(match &container {
            Container::Single => target,
            Container::Array(shape) => shape.element(),
            Container::Collection(shape) => shape.element(),
            Container::Dictionary(shape) => shape.value(),
        });
        let key = match &container {
            Container::Dictionary(shape) => Some(peel_wrappers(shape.key())),
            _ => None,
        };

        let nested = match element_type.shape() {
            TypeShape::Model(_) => Some(cx.registry.resolve_binding(&element_type)?),
            _ => None,
        };

        let custom = format.resolver.as_ref().and_then(|resolver| {
            let info = PropertyInfo {
                name,
                declaring_type,
                property_type: target,
                xpath: &xpath,
                child_xpaths: &child_xpaths,
            };
            match resolver.initialize(&info) {
                Ok(kind) => Some((Arc::clone(resolver), kind)),
                Err(e) => {
                    warn!(
                        property = name,
                        model = declaring_type,
                        error = %e,
                        "custom binding resolver failed to initialize, using the standard pipeline"
                    );
                    None
                }
            }
        });

        let (conversion, element_kind, argument_kinds) = match custom {
            Some((resolver, kind)) => (Conversion::Custom(resolver), kind, Vec::new()),
            None => standard_conversion(
                name,
                &child_xpaths,
                &container,
                element_type,
                key.as_ref().map(|(key_type, _)| *key_type),
                nested.as_ref(),
                &format,
                cx,
            )?,
        };

        let is_function = cardinality == Cardinality::Scalar
            && element_kind.is_simple_scalar()
            && !is_enumerable(&element_type)
            && child_xpaths.is_empty();

        let compile = |text: &str, kind: ElementKind, is_function: bool| {
            cx.compiler
                .compile_xpath(text, owner.namespaces(), kind, is_function)
                .map_err(|source| Error::XPathCompilation {
                    property: name.to_string(),
                    xpath: text.to_string(),
                    source,
                })
        };

        let full_xpath = join_xpath(owner.root_xpath(), &xpath);
        let root_query = compile(full_xpath.as_str(), element_kind, is_function)?;
        let child_queries = child_xpaths
            .iter()
            .enumerate()
            .map(|(index, child)| {
                let kind = argument_kinds.get(index).copied().unwrap_or(element_kind);
                compile(child.as_str(), kind, kind.is_simple_scalar())
            })
            .collect::<Result<Vec<_>>>()?;

        let (key_type, key_wraps) = match key {
            Some((key_type, key_wraps)) => (Some(key_type), key_wraps),
            None => (None, Vec::new()),
        };
        let finisher = match container {
            Container::Single => Finisher::First { wraps: element_wraps },
            Container::Array(shape) => Finisher::Array {
                shape,
                wraps: element_wraps,
            },
            Container::Collection(shape) => Finisher::Collection {
                shape,
                wraps: element_wraps,
            },
            Container::Dictionary(shape) => Finisher::Dictionary {
                shape,
                key_wraps,
                value_wraps: element_wraps,
            },
        };

        Ok(Self {
            name,
            declaring_type,
            property_type: target,
            element_kind,
            argument_kinds,
            cardinality,
            root_query,
            child_queries,
            element_type,
            key_type,
            nested: nested.as_ref().map(Arc::downgrade),
            accessor,
            conversion,
            finisher,
            format,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn declaring_type(&self) -> &'static str {
        self.declaring_type
    }

    /// Declared type of the member
    pub fn property_type(&self) -> TypeInfo {
        self.property_type
    }

    pub fn element_kind(&self) -> ElementKind {
        self.element_kind
    }

    /// Kinds of the child values for row bindings, in child order
    pub fn argument_kinds(&self) -> &[ElementKind] {
        &self.argument_kinds
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn root_query(&self) -> &CompiledXPath {
        &self.root_query
    }

    pub fn child_queries(&self) -> &[CompiledXPath] {
        &self.child_queries
    }

    /// Element type with `Option`/`Box` layers removed; the value type for
    /// dictionaries
    pub fn element_type(&self) -> TypeInfo {
        self.element_type
    }

    pub fn key_type(&self) -> Option<TypeInfo> {
        self.key_type
    }

    /// Descriptor of a complex element type
    pub fn nested_descriptor(&self) -> Option<Arc<BindingDescriptor>> {
        self.nested.as_ref().and_then(Weak::upgrade)
    }

    pub fn format(&self) -> &CustomFormat {
        &self.format
    }

    pub fn has_custom_resolver(&self) -> bool {
        matches!(self.conversion, Conversion::Custom(_))
    }

    /// Read the member from a model instance
    pub fn get<'a>(&self, instance: &'a dyn Any) -> Option<&'a dyn Any> {
        self.accessor.get(instance)
    }

    pub(crate) fn assign(
        &self,
        instance: &mut dyn Any,
        value: BoxedValue,
    ) -> std::result::Result<(), AssignError> {
        self.accessor.set(instance, value)
    }

    pub(crate) fn conversion(&self) -> &Conversion {
        &self.conversion
    }

    pub(crate) fn finisher(&self) -> &Finisher {
        &self.finisher
    }
}

impl fmt::Debug for PropertyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBinding")
            .field("name", &self.name)
            .field("property_type", &self.property_type)
            .field("element_kind", &self.element_kind)
            .field("cardinality", &self.cardinality)
            .field("root_query", &self.root_query)
            .field("child_queries", &self.child_queries)
            .field("nested", &self.nested_descriptor().map(|d| d.model_type()))
            .finish_non_exhaustive()
    }
}

fn item_conversion(
    element_type: TypeInfo,
    nested: Option<&Arc<BindingDescriptor>>,
    format: &CustomFormat,
    cx: &BuildContext<'_>,
) -> Result<ItemConversion> {
    if let Some(descriptor) = nested {
        return Ok(ItemConversion::Nested(Arc::downgrade(descriptor)));
    }
    if let TypeShape::Fragment = element_type.shape() {
        return Ok(ItemConversion::Fragment);
    }
    Ok(ItemConversion::Parse(
        cx.parsers.build_single_parser(&element_type, format)?,
    ))
}

#[allow(clippy::too_many_arguments)]
fn standard_conversion(
    name: &'static str,
    child_xpaths: &[String],
    container: &Container,
    element_type: TypeInfo,
    key_type: Option<TypeInfo>,
    nested: Option<&Arc<BindingDescriptor>>,
    format: &CustomFormat,
    cx: &BuildContext<'_>,
) -> Result<(Conversion, ElementKind, Vec<ElementKind>)> {
    let arity_mismatch = |expected: usize| Error::ArityMismatch {
        property: name.to_string(),
        expected,
        actual: child_xpaths.len(),
    };

    if let (Container::Dictionary(_), Some(key_type)) = (container, key_type) {
        if child_xpaths.len() != 2 {
            return Err(arity_mismatch(2));
        }
        let key = cx.parsers.build_single_parser(&key_type, format)?;
        let value = item_conversion(element_type, nested, format, cx)?;
        let kind = value.kind();
        let kinds = vec![key.kind(), kind];
        return Ok((Conversion::Entry { key, value }, kind, kinds));
    }

    if child_xpaths.is_empty() {
        let item = item_conversion(element_type, nested, format, cx)?;
        let kind = item.kind();
        return Ok((Conversion::Nodes(item), kind, Vec::new()));
    }

    match element_type.shape() {
        TypeShape::Model(_) => Err(arity_mismatch(0)),
        TypeShape::Constructed(_) => {
            let parser = cx
                .parsers
                .build_multi_parser(&element_type, format, child_xpaths.len())?;
            let kinds = parser.kinds();
            Ok((Conversion::Construct(parser), ElementKind::Complex, kinds))
        }
        _ if child_xpaths.len() == 1 => {
            let item = item_conversion(element_type, nested, format, cx)?;
            let kind = item.kind();
            Ok((Conversion::Child(item), kind, vec![kind]))
        }
        _ => Err(arity_mismatch(1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_xpath() {
        assert_eq!(join_xpath(None, "name"), "name");
        assert_eq!(join_xpath(Some(""), "name"), "name");
        assert_eq!(join_xpath(Some("person"), "name"), "person/name");
        assert_eq!(join_xpath(Some("person/"), "/name"), "person/name");
        assert_eq!(join_xpath(Some("/"), "name"), "/name");
        assert_eq!(join_xpath(Some("contacts"), "//email"), "contacts//email");
        assert_eq!(join_xpath(Some("contacts"), ""), "contacts");
    }
}
