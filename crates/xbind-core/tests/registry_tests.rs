//! Basic tests for descriptor construction and the binding registry

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use xbind_core::{
    bindable, field, BindingRegistry, BoxedValue, Cardinality, CompiledXPath, Constructors,
    CustomBindingResolver, ElementKind, Error, ModelDeclaration, Namespace, PropertyInfo,
    XPathCompiler, XPathError, XmlConstruct, XmlData, XmlModel,
};

/// Accepts everything except expressions containing `!!`
#[derive(Default)]
struct RecordingCompiler {
    compiled: Mutex<Vec<String>>,
}

impl XPathCompiler for RecordingCompiler {
    fn compile_xpath(
        &self,
        xpath: &str,
        namespaces: &[Namespace],
        kind: ElementKind,
        is_function: bool,
    ) -> Result<CompiledXPath, XPathError> {
        if xpath.contains("!!") {
            return Err(XPathError::compile(format!("unexpected token in '{xpath}'")));
        }
        self.compiled.lock().push(xpath.to_string());
        Ok(CompiledXPath::new(xpath, namespaces, kind, is_function, ()))
    }
}

fn registry() -> (Arc<RecordingCompiler>, BindingRegistry) {
    let compiler = Arc::new(RecordingCompiler::default());
    let registry = BindingRegistry::new(compiler.clone());
    (compiler, registry)
}

#[derive(Debug, Default)]
struct Person {
    name: String,
    age: i32,
    nicknames: Vec<String>,
}

impl XmlModel for Person {
    fn declare(model: &mut ModelDeclaration<Self>) {
        model.root_xpath("person/");
        model.element("name", "/name", field!(Person, name));
        model.attribute("age", "age", field!(Person, age));
        model.element("nicknames", "nickname", field!(Person, nicknames));
    }
}
bindable!(model Person);

#[derive(Debug, Default)]
struct Contacts {
    count: usize,
}

impl XmlModel for Contacts {
    fn declare(model: &mut ModelDeclaration<Self>) {
        model.xpath("count", "count(contacts/person)", field!(Contacts, count));
    }
}
bindable!(model Contacts);

#[derive(Debug, Default)]
struct TreeNode {
    label: String,
    next: Option<Box<TreeNode>>,
    children: Vec<TreeNode>,
}

impl XmlModel for TreeNode {
    fn declare(model: &mut ModelDeclaration<Self>) {
        model.attribute("label", "label", field!(TreeNode, label));
        model.element("next", "next", field!(TreeNode, next));
        model.element("children", "node", field!(TreeNode, children));
    }
}
bindable!(model TreeNode);

#[derive(Debug, Clone, PartialEq)]
struct Coord {
    x: f64,
    y: f64,
}

impl XmlConstruct for Coord {
    fn constructors(constructors: &mut Constructors<Self>) {
        constructors.add(|(x, y): (f64, f64)| Coord { x, y });
    }
}
bindable!(construct Coord);

#[derive(Debug, Default)]
struct Map {
    origin: Option<Coord>,
    scores: HashMap<String, i32>,
}

impl XmlModel for Map {
    fn declare(model: &mut ModelDeclaration<Self>) {
        model.namespace("m", "urn:map");
        model.xpath_rows("origin", "m:origin", &["@x", "@y"], field!(Map, origin));
        model.xpath_rows("scores", "m:score", &["@name", "."], field!(Map, scores));
    }
}
bindable!(model Map);

#[derive(Debug, Default)]
struct BadScores {
    scores: HashMap<String, i32>,
}

impl XmlModel for BadScores {
    fn declare(model: &mut ModelDeclaration<Self>) {
        model.xpath_rows("scores", "score", &["@name"], field!(BadScores, scores));
    }
}
bindable!(model BadScores);

#[derive(Debug, Default)]
struct Broken {
    value: String,
}

impl XmlModel for Broken {
    fn declare(model: &mut ModelDeclaration<Self>) {
        model.element("value", "value!!", field!(Broken, value));
    }
}
bindable!(model Broken);

#[derive(Debug, Default)]
struct HoldsBroken {
    title: String,
    inner: Option<Broken>,
}

impl XmlModel for HoldsBroken {
    fn declare(model: &mut ModelDeclaration<Self>) {
        model.element("title", "title", field!(HoldsBroken, title));
        model.element("inner", "inner", field!(HoldsBroken, inner));
    }
}
bindable!(model HoldsBroken);

#[test]
fn test_descriptor_is_cached() {
    let (_, registry) = registry();
    assert!(registry.is_empty());

    let first = registry.resolve::<Person>().unwrap();
    let second = registry.register::<Person>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(registry.contains::<Person>());
    assert_eq!(registry.len(), 1);
    assert!(first.is_initialized());
}

#[test]
fn test_property_order_and_paths() {
    let (compiler, registry) = registry();
    let descriptor = registry.resolve::<Person>().unwrap();

    let names: Vec<_> = descriptor.properties().iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["name", "age", "nicknames"]);

    let age = descriptor.property("age").unwrap();
    assert_eq!(age.root_query().text(), "person/@age");
    assert_eq!(age.element_kind(), ElementKind::Number);
    assert!(age.root_query().is_function());

    let name = descriptor.property("name").unwrap();
    assert_eq!(name.root_query().text(), "person/name");
    assert!(name.root_query().is_function());

    let nicknames = descriptor.property("nicknames").unwrap();
    assert_eq!(nicknames.cardinality(), Cardinality::GenericCollection);
    assert_eq!(nicknames.element_kind(), ElementKind::Text);
    assert!(!nicknames.root_query().is_function());

    assert_eq!(compiler.compiled.lock().len(), 3);
}

#[test]
fn test_function_expression_without_root() {
    let (_, registry) = registry();
    let descriptor = registry.resolve::<Contacts>().unwrap();
    let count = descriptor.property("count").unwrap();
    assert_eq!(count.root_query().text(), "count(contacts/person)");
    assert_eq!(count.element_kind(), ElementKind::Number);
    assert!(count.root_query().is_function());
}

#[test]
fn test_self_referential_descriptor() {
    let (_, registry) = registry();
    let descriptor = registry.resolve::<TreeNode>().unwrap();

    let next = descriptor.property("next").unwrap();
    assert_eq!(next.element_kind(), ElementKind::Complex);
    assert_eq!(next.cardinality(), Cardinality::Scalar);
    assert!(Arc::ptr_eq(&next.nested_descriptor().unwrap(), &descriptor));

    let children = descriptor.property("children").unwrap();
    assert_eq!(children.cardinality(), Cardinality::GenericCollection);
    assert!(Arc::ptr_eq(&children.nested_descriptor().unwrap(), &descriptor));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_row_bindings() {
    let (_, registry) = registry();
    let descriptor = registry.resolve::<Map>().unwrap();
    assert_eq!(descriptor.namespaces(), &[Namespace::new("m", "urn:map")]);

    let origin = descriptor.property("origin").unwrap();
    assert_eq!(origin.element_kind(), ElementKind::Complex);
    assert_eq!(origin.argument_kinds(), &[ElementKind::Number, ElementKind::Number]);
    assert!(!origin.root_query().is_function());
    assert!(origin.child_queries().iter().all(|query| query.is_function()));

    let scores = descriptor.property("scores").unwrap();
    assert_eq!(scores.cardinality(), Cardinality::GenericDictionary);
    assert_eq!(scores.argument_kinds(), &[ElementKind::Text, ElementKind::Number]);
    assert_eq!(scores.key_type().unwrap().name(), std::any::type_name::<String>());
    assert_eq!(scores.child_queries()[1].namespaces(), &[Namespace::new("m", "urn:map")]);
}

#[test]
fn test_dictionary_arity_is_checked_eagerly() {
    let (_, registry) = registry();
    let err = registry.resolve::<BadScores>().unwrap_err();
    assert!(matches!(
        err,
        Error::ArityMismatch { ref property, expected: 2, actual: 1 } if property == "scores"
    ));
    insta::assert_snapshot!(
        err.to_string(),
        @"Property 'scores' declares 1 child XPath(s) but its shape requires 2"
    );
    assert!(registry.is_empty());
}

#[test]
fn test_compile_failure_rolls_back_the_whole_build() {
    let (_, registry) = registry();
    let err = registry.resolve::<HoldsBroken>().unwrap_err();
    match err {
        Error::XPathCompilation { property, xpath, .. } => {
            assert_eq!(property, "value");
            assert_eq!(xpath, "value!!");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!registry.contains::<HoldsBroken>());
    assert!(!registry.contains::<Broken>());

    registry.resolve::<Person>().unwrap();
    assert_eq!(registry.len(), 1);
}

#[derive(Debug, Default)]
struct Segment {
    span: Option<Coord>,
}

impl XmlModel for Segment {
    fn declare(model: &mut ModelDeclaration<Self>) {
        model.xpath_rows("span", "span", &["@x", "@y", "@z"], field!(Segment, span));
    }
}
bindable!(model Segment);

#[test]
fn test_missing_constructor_is_reported_eagerly() {
    let (_, registry) = registry();
    let err = registry.resolve::<Segment>().unwrap_err();
    assert!(matches!(err, Error::Constructor { arity: 3, .. }));
}

#[test]
fn test_property_accessor_reads_members() {
    let (_, registry) = registry();
    let descriptor = registry.resolve::<Person>().unwrap();
    let person = Person {
        name: "Ada".to_string(),
        age: 36,
        nicknames: Vec::new(),
    };
    let age = descriptor.property("age").unwrap();
    let value = age.get(&person).unwrap();
    assert_eq!(value.downcast_ref::<i32>(), Some(&36));
    assert!(age.get(&42_u8).is_none());

    let instance = descriptor.create_instance();
    assert!(instance.is::<Person>());
}

#[test]
fn test_non_model_type_is_not_found() {
    let (_, registry) = registry();
    let err = registry.resolve::<i32>().unwrap_err();
    assert!(matches!(err, Error::BindingNotFound { .. }));
    let err = registry.resolve::<Coord>().unwrap_err();
    assert!(matches!(err, Error::BindingNotFound { .. }));
}

#[test]
fn test_concurrent_first_use() {
    let (_, registry) = registry();
    let descriptors: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = &registry;
                scope.spawn(move || {
                    if i % 2 == 0 {
                        registry.resolve::<TreeNode>().unwrap()
                    } else {
                        let person = registry.resolve::<Person>().unwrap();
                        assert!(person.is_initialized());
                        registry.resolve::<TreeNode>().unwrap()
                    }
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert!(descriptors.iter().all(|d| Arc::ptr_eq(d, &descriptors[0])));
    assert!(descriptors[0].is_initialized());
    assert_eq!(registry.len(), 2);
}

struct FixedKind(Option<ElementKind>);

impl CustomBindingResolver for FixedKind {
    fn initialize(&self, property: &PropertyInfo<'_>) -> xbind_core::Result<ElementKind> {
        assert_eq!(property.declaring_type, std::any::type_name::<Invoice>());
        self.0.ok_or_else(|| Error::config(format!("cannot resolve {}", property.name)))
    }

    fn resolve(&self, _values: &[&dyn XmlData]) -> xbind_core::Result<Option<BoxedValue>> {
        Ok(None)
    }
}

#[derive(Debug, Default)]
struct Invoice {
    total: String,
    lines: Vec<String>,
}

impl XmlModel for Invoice {
    fn declare(model: &mut ModelDeclaration<Self>) {
        model
            .element("total", "total", field!(Invoice, total))
            .resolver(FixedKind(Some(ElementKind::RawFragment)));
        model
            .element("lines", "line", field!(Invoice, lines))
            .resolver(FixedKind(None));
    }
}
bindable!(model Invoice);

#[test]
fn test_custom_resolver_initialization() {
    let (_, registry) = registry();
    let descriptor = registry.resolve::<Invoice>().unwrap();

    let total = descriptor.property("total").unwrap();
    assert!(total.has_custom_resolver());
    assert_eq!(total.element_kind(), ElementKind::RawFragment);
    assert!(!total.root_query().is_function());

    let lines = descriptor.property("lines").unwrap();
    assert!(!lines.has_custom_resolver());
    assert_eq!(lines.element_kind(), ElementKind::Text);
}
