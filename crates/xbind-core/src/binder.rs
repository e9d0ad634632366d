//! Binding documents into model instances.
//!
//! Binding walks a descriptor's properties depth-first. Each property runs
//! its conversion over the query results and assigns the finished value;
//! properties whose queries select nothing keep their default.

use std::any::Any;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::binding::{BindingDescriptor, Collected, Conversion, ItemConversion, PropertyBinding};
use crate::config::BindingConfig;
use crate::error::{Error, Result};
use crate::model::Cardinality;
use crate::registry::BindingRegistry;
use crate::types::{Bindable, BoxedValue, TypeInfo, XmlFragment};
use crate::xpath::{CompiledXPath, XPathCompiler, XPathError, XPathProcessor, XmlData};

/// Outcome of converting one query result
enum Item {
    Value(BoxedValue),
    Absent,
    Invalid(Error),
}

fn mismatch<E>(
    property: &PropertyBinding,
    value: impl Into<String>,
    actual: &str,
    source: E,
) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::PropertyTypeMismatch {
        property: property.name().to_string(),
        value: value.into(),
        expected: property.property_type().name().to_string(),
        actual: actual.to_string(),
        source: Box::new(source),
    }
}

fn evaluation_error(
    property: &PropertyBinding,
    query: &CompiledXPath,
    source: XPathError,
) -> Error {
    Error::XPathEvaluation {
        property: property.name().to_string(),
        xpath: query.text().to_string(),
        source,
    }
}

/// Binds model types through one XPath backend
pub struct XmlBinder<P> {
    registry: Arc<BindingRegistry>,
    processor: Arc<P>,
}

impl<P> Clone for XmlBinder<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            processor: Arc::clone(&self.processor),
        }
    }
}

impl<P: XPathProcessor + 'static> XmlBinder<P> {
    /// The registry must have been created with a compiler producing
    /// handles `processor` understands
    pub fn new(registry: Arc<BindingRegistry>, processor: Arc<P>) -> Self {
        Self { registry, processor }
    }

    /// Binder with its own registry compiling through `processor`
    pub fn from_processor(processor: P) -> Self {
        Self::with_config(processor, BindingConfig::default())
    }

    pub fn with_config(processor: P, config: BindingConfig) -> Self {
        let processor = Arc::new(processor);
        let compiler: Arc<dyn XPathCompiler> = processor.clone();
        Self {
            registry: Arc::new(BindingRegistry::with_config(compiler, config)),
            processor,
        }
    }

    pub fn registry(&self) -> &Arc<BindingRegistry> {
        &self.registry
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Create and populate a `T` from `data`
    pub fn bind<'d, T: Bindable>(&self, data: &P::Data<'d>) -> Result<T> {
        let info = TypeInfo::of::<T>();
        self.bind_type(&info, data)?.downcast::<T>().map_err(|value| {
            Error::unsupported(
                info.name(),
                format!("descriptor produced a value of type '{}'", value.type_name()),
            )
        })
    }

    /// Like [`bind`](Self::bind) for a type known only at runtime
    pub fn bind_type<'d>(&self, info: &TypeInfo, data: &P::Data<'d>) -> Result<BoxedValue> {
        let descriptor = self.registry.resolve_binding(info)?;
        self.bind_with(&descriptor, data)
    }

    pub fn bind_with<'d>(
        &self,
        descriptor: &BindingDescriptor,
        data: &P::Data<'d>,
    ) -> Result<BoxedValue> {
        let mut instance = descriptor.create_instance();
        for property in descriptor.properties() {
            self.set_property_value(instance.as_any_mut(), data, property)?;
        }
        Ok(instance)
    }

    /// Populate a single named property of an existing instance
    pub fn set_property<'d, T: Bindable>(
        &self,
        instance: &mut T,
        data: &P::Data<'d>,
        name: &str,
    ) -> Result<()> {
        let descriptor = self.registry.resolve::<T>()?;
        let property = descriptor
            .property(name)
            .ok_or_else(|| Error::PropertyBindingNotFound {
                type_name: descriptor.model_type().name().to_string(),
                property: name.to_string(),
            })?;
        self.set_property_value(instance as &mut dyn Any, data, property)
    }

    /// Evaluate one property and assign the result; nothing is assigned
    /// when the document has no value for it
    pub fn set_property_value<'d>(
        &self,
        instance: &mut dyn Any,
        data: &P::Data<'d>,
        property: &PropertyBinding,
    ) -> Result<()> {
        let Some(value) = self.property_value(data, property)? else {
            trace!(property = property.name(), "no value, keeping default");
            return Ok(());
        };
        let actual = value.type_name();
        property
            .assign(instance, value)
            .map_err(|e| mismatch(property, format!("<{actual}>"), actual, e))
    }

    /// Run a property's conversion without assigning it
    pub fn property_value<'d>(
        &self,
        data: &P::Data<'d>,
        property: &PropertyBinding,
    ) -> Result<Option<BoxedValue>> {
        trace!(
            property = property.name(),
            model = property.declaring_type(),
            xpath = property.root_query().text(),
            "binding property"
        );
        let collected = match property.conversion() {
            Conversion::Custom(resolver) => {
                let results = self.evaluate(data, property)?;
                let values: Vec<&dyn XmlData> =
                    results.iter().map(|result| result as &dyn XmlData).collect();
                return resolver.resolve(&values);
            }
            Conversion::Nodes(item) => {
                let results = self.evaluate(data, property)?;
                let items = results
                    .iter()
                    .take(Self::limit(property))
                    .map(|result| self.convert_item(property, item, Some(result)));
                Collected::Values(self.gather(property, items)?)
            }
            Conversion::Child(item) => {
                let rows = self.evaluate_rows(data, property)?;
                let items = rows
                    .iter()
                    .take(Self::limit(property))
                    .map(|row| {
                        self.convert_item(property, item, row.first().and_then(Option::as_ref))
                    });
                Collected::Values(self.gather(property, items)?)
            }
            Conversion::Construct(parser) => {
                let rows = self.evaluate_rows(data, property)?;
                let items = rows.iter().take(Self::limit(property)).map(|row| {
                    let cells = row.iter().map(Option::as_ref).collect::<Option<Vec<_>>>();
                    let Some(cells) = cells else {
                        return Ok(Item::Absent);
                    };
                    let texts: Vec<_> = cells.iter().map(|cell| cell.value()).collect();
                    let texts: Vec<&str> = texts.iter().map(AsRef::as_ref).collect();
                    Ok(match parser.parse(&texts) {
                        Ok(value) => Item::Value(value),
                        Err(e) => Item::Invalid(mismatch(property, texts.join(", "), "str", e)),
                    })
                });
                Collected::Values(self.gather(property, items)?)
            }
            Conversion::Entry { key, value } => {
                let rows = self.evaluate_rows(data, property)?;
                let mut pairs = Vec::with_capacity(rows.len());
                for row in &rows {
                    let (Some(Some(key_cell)), Some(value_cell)) = (row.first(), row.get(1)) else {
                        continue;
                    };
                    let key_text = key_cell.value();
                    let key = match key.parse(&key_text) {
                        Ok(key) => key,
                        Err(e) => {
                            debug!(
                                property = property.name(),
                                error = %e,
                                "skipping entry with an invalid key"
                            );
                            continue;
                        }
                    };
                    match self.convert_item(property, value, value_cell.as_ref())? {
                        Item::Value(value) => pairs.push((key, value)),
                        Item::Absent => {}
                        Item::Invalid(e) => {
                            debug!(
                                property = property.name(),
                                error = %e,
                                "skipping entry with an invalid value"
                            );
                        }
                    }
                }
                Collected::Pairs(pairs)
            }
        };
        property.finisher().finish(collected).map_err(|e| {
            let actual = e.actual;
            mismatch(property, format!("<{actual}>"), actual, e)
        })
    }

    fn evaluate<'d>(
        &self,
        data: &P::Data<'d>,
        property: &PropertyBinding,
    ) -> Result<Vec<P::Data<'d>>> {
        let query = property.root_query();
        self.processor
            .process_xpath(data, query)
            .map_err(|source| evaluation_error(property, query, source))
    }

    fn evaluate_rows<'d>(
        &self,
        data: &P::Data<'d>,
        property: &PropertyBinding,
    ) -> Result<Vec<Vec<Option<P::Data<'d>>>>> {
        let query = property.root_query();
        self.processor
            .process_xpath_rows(data, query, property.child_queries())
            .map_err(|source| evaluation_error(property, query, source))
    }

    /// Scalars only look at their first match
    fn limit(property: &PropertyBinding) -> usize {
        match property.cardinality() {
            Cardinality::Scalar => 1,
            _ => usize::MAX,
        }
    }

    /// Invalid items fail a scalar property and are skipped otherwise
    fn gather(
        &self,
        property: &PropertyBinding,
        items: impl Iterator<Item = Result<Item>>,
    ) -> Result<Vec<BoxedValue>> {
        let mut values = Vec::new();
        for item in items {
            match item? {
                Item::Value(value) => values.push(value),
                Item::Absent => {}
                Item::Invalid(e) if property.cardinality() == Cardinality::Scalar => return Err(e),
                Item::Invalid(e) => {
                    debug!(
                        property = property.name(),
                        error = %e,
                        "skipping value that failed to convert"
                    );
                }
            }
        }
        Ok(values)
    }

    fn convert_item<'d>(
        &self,
        property: &PropertyBinding,
        conversion: &ItemConversion,
        data: Option<&P::Data<'d>>,
    ) -> Result<Item> {
        let Some(data) = data else {
            return Ok(Item::Absent);
        };
        match conversion {
            ItemConversion::Parse(parser) => {
                let text = data.value();
                Ok(match parser.parse(&text) {
                    Ok(value) => Item::Value(value),
                    Err(e) => Item::Invalid(mismatch(property, text, "str", e)),
                })
            }
            ItemConversion::Fragment => {
                let markup = data.outer_xml().unwrap_or_else(|| data.value().into_owned());
                Ok(Item::Value(BoxedValue::new(XmlFragment(markup))))
            }
            ItemConversion::Nested(descriptor) => {
                // descriptors can outlive the registry that built them
                let descriptor = match descriptor.upgrade() {
                    Some(descriptor) => descriptor,
                    None => self.registry.resolve_binding(&property.element_type())?,
                };
                self.bind_with(&descriptor, data).map(Item::Value)
            }
        }
    }
}

impl<P> std::fmt::Debug for XmlBinder<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlBinder")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
