//! Declarative XML data binding.
//!
//! Model types declare which XPath expression feeds each of their members;
//! the binder turns those declarations into cached, compiled binding
//! descriptors and populates instances from any document a backend can
//! evaluate XPath against.
//!
//! ```ignore
//! #[derive(Default)]
//! struct Person {
//!     name: String,
//!     age: i32,
//! }
//!
//! impl XmlModel for Person {
//!     fn declare(model: &mut ModelDeclaration<Self>) {
//!         model.attribute("name", "name", field!(Person, name));
//!         model.attribute("age", "age", field!(Person, age));
//!     }
//! }
//! bindable!(model Person);
//! ```

pub mod accessor;
pub mod binder;
pub mod binding;
pub mod config;
pub mod error;
mod macros;
pub mod model;
pub mod parse;
pub mod registry;
pub mod types;
pub mod xpath;

pub use accessor::{Constructors, Field, XmlConstruct, XmlEnum};
pub use binder::XmlBinder;
pub use binding::{join_xpath, BindingDescriptor, PropertyBinding};
pub use config::BindingConfig;
pub use error::{AssignError, Error, ParseValueError, Result};
pub use model::{
    Cardinality, CustomBindingResolver, CustomFormat, ElementKind, ModelDeclaration,
    PropertyDeclaration, PropertyInfo, XmlModel,
};
pub use parse::{Culture, MultiValueParser, ValueParser, ValueParserFactory};
pub use registry::BindingRegistry;
pub use types::{Bindable, BoxedValue, TypeInfo, TypeShape, XmlFragment};
pub use xpath::{CompiledXPath, Namespace, XPathCompiler, XPathError, XPathProcessor, XmlData};
