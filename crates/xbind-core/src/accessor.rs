//! Compiled accessors, constructors and shape probes.
//!
//! Every delegate here is either a monomorphized function pointer or a
//! closure over one, created once when a type is described. Binding never
//! goes through a per-call reflective lookup.

use std::any::{type_name, Any};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::AssignError;
use crate::model::{model_schema, ModelSchema, XmlModel};
use crate::types::{Bindable, BoxedValue, TypeInfo, TypeShape};

/// Wraps a boxed `T` into its wrapper type (`Option<T>`, `Box<T>`)
pub type WrapFn = fn(BoxedValue) -> Result<BoxedValue, AssignError>;

fn downcast_item<T: Any>(value: BoxedValue) -> Result<T, AssignError> {
    value.downcast::<T>().map_err(|value| AssignError {
        expected: type_name::<T>(),
        actual: value.type_name(),
    })
}

fn wrong_target<T>() -> AssignError {
    AssignError {
        expected: type_name::<T>(),
        actual: "a different target type",
    }
}

/// Creates a value with its `Default` implementation
pub fn default_constructor<T: Default + Any>() -> BoxedValue {
    BoxedValue::new(T::default())
}

fn wrap_option<T: Any>(value: BoxedValue) -> Result<BoxedValue, AssignError> {
    downcast_item::<T>(value).map(|value| BoxedValue::new(Some(value)))
}

fn wrap_box<T: Any>(value: BoxedValue) -> Result<BoxedValue, AssignError> {
    downcast_item::<T>(value).map(|value| BoxedValue::new(Box::new(value)))
}

fn materialize_array<T: Any>(items: Vec<BoxedValue>) -> Result<BoxedValue, AssignError> {
    let items = items
        .into_iter()
        .map(downcast_item::<T>)
        .collect::<Result<Vec<T>, _>>()?;
    Ok(BoxedValue::new(items.into_boxed_slice()))
}

fn collection_add<C, T>(target: &mut dyn Any, item: BoxedValue) -> Result<(), AssignError>
where
    C: Extend<T> + Any,
    T: Any,
{
    let item = downcast_item::<T>(item)?;
    let collection = target.downcast_mut::<C>().ok_or_else(wrong_target::<C>)?;
    collection.extend(Some(item));
    Ok(())
}

/// Map types that can be populated pair by pair
pub trait MapLike<K, V>: Default + Any {
    fn contains(&self, key: &K) -> bool;
    fn put(&mut self, key: K, value: V);
}

impl<K: Eq + Hash + 'static, V: 'static> MapLike<K, V> for HashMap<K, V> {
    fn contains(&self, key: &K) -> bool {
        self.contains_key(key)
    }

    fn put(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

impl<K: Ord + 'static, V: 'static> MapLike<K, V> for BTreeMap<K, V> {
    fn contains(&self, key: &K) -> bool {
        self.contains_key(key)
    }

    fn put(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

fn dictionary_contains<D, K, V>(target: &dyn Any, key: &BoxedValue) -> bool
where
    D: MapLike<K, V>,
    K: Any,
{
    match (target.downcast_ref::<D>(), key.downcast_ref::<K>()) {
        (Some(map), Some(key)) => map.contains(key),
        _ => false,
    }
}

fn dictionary_insert<D, K, V>(
    target: &mut dyn Any,
    key: BoxedValue,
    value: BoxedValue,
) -> Result<(), AssignError>
where
    D: MapLike<K, V>,
    K: Any,
    V: Any,
{
    let key = downcast_item::<K>(key)?;
    let value = downcast_item::<V>(value)?;
    let map = target.downcast_mut::<D>().ok_or_else(wrong_target::<D>)?;
    map.put(key, value);
    Ok(())
}

/// `Option<T>` or `Box<T>` around an inner bindable type
#[derive(Clone, Copy)]
pub struct WrapperShape {
    inner: TypeInfo,
    wrap: WrapFn,
}

impl WrapperShape {
    pub fn option<T: Bindable>() -> Self {
        Self {
            inner: TypeInfo::of::<T>(),
            wrap: wrap_option::<T>,
        }
    }

    pub fn boxed<T: Bindable>() -> Self {
        Self {
            inner: TypeInfo::of::<T>(),
            wrap: wrap_box::<T>,
        }
    }

    pub fn inner(&self) -> TypeInfo {
        self.inner
    }

    pub fn wrap_fn(&self) -> WrapFn {
        self.wrap
    }
}

/// Boxed slice of `T`
#[derive(Clone, Copy)]
pub struct ArrayShape {
    element: TypeInfo,
    materialize: fn(Vec<BoxedValue>) -> Result<BoxedValue, AssignError>,
}

impl ArrayShape {
    pub fn of<T: Bindable>() -> Self {
        Self {
            element: TypeInfo::of::<T>(),
            materialize: materialize_array::<T>,
        }
    }

    pub fn element(&self) -> TypeInfo {
        self.element
    }

    /// Build the typed array from untyped items
    pub fn materialize(&self, items: Vec<BoxedValue>) -> Result<BoxedValue, AssignError> {
        (self.materialize)(items)
    }
}

/// Growable collection with one element type
#[derive(Clone, Copy)]
pub struct CollectionShape {
    element: TypeInfo,
    create: fn() -> BoxedValue,
    add: fn(&mut dyn Any, BoxedValue) -> Result<(), AssignError>,
}

impl CollectionShape {
    pub fn of<C, T>() -> Self
    where
        C: Default + Extend<T> + Any,
        T: Bindable,
    {
        Self {
            element: TypeInfo::of::<T>(),
            create: default_constructor::<C>,
            add: collection_add::<C, T>,
        }
    }

    pub fn element(&self) -> TypeInfo {
        self.element
    }

    pub fn create(&self) -> BoxedValue {
        (self.create)()
    }

    pub fn add(&self, target: &mut dyn Any, item: BoxedValue) -> Result<(), AssignError> {
        (self.add)(target, item)
    }

    /// Create the collection and add every item in order
    pub fn populate(&self, items: Vec<BoxedValue>) -> Result<BoxedValue, AssignError> {
        let mut collection = self.create();
        for item in items {
            self.add(collection.as_any_mut(), item)?;
        }
        Ok(collection)
    }
}

/// Key/value map
#[derive(Clone, Copy)]
pub struct DictionaryShape {
    key: TypeInfo,
    value: TypeInfo,
    create: fn() -> BoxedValue,
    contains_key: fn(&dyn Any, &BoxedValue) -> bool,
    insert: fn(&mut dyn Any, BoxedValue, BoxedValue) -> Result<(), AssignError>,
}

impl DictionaryShape {
    pub fn of<D, K, V>() -> Self
    where
        D: MapLike<K, V>,
        K: Bindable,
        V: Bindable,
    {
        Self {
            key: TypeInfo::of::<K>(),
            value: TypeInfo::of::<V>(),
            create: default_constructor::<D>,
            contains_key: dictionary_contains::<D, K, V>,
            insert: dictionary_insert::<D, K, V>,
        }
    }

    pub fn key(&self) -> TypeInfo {
        self.key
    }

    pub fn value(&self) -> TypeInfo {
        self.value
    }

    pub fn create(&self) -> BoxedValue {
        (self.create)()
    }

    pub fn contains_key(&self, target: &dyn Any, key: &BoxedValue) -> bool {
        (self.contains_key)(target, key)
    }

    pub fn insert(
        &self,
        target: &mut dyn Any,
        key: BoxedValue,
        value: BoxedValue,
    ) -> Result<(), AssignError> {
        (self.insert)(target, key, value)
    }

    /// Create the map and insert every pair; the first pair for a key wins
    pub fn populate(
        &self,
        pairs: Vec<(BoxedValue, BoxedValue)>,
    ) -> Result<BoxedValue, AssignError> {
        let mut map = self.create();
        for (key, value) in pairs {
            if self.contains_key(map.as_any(), &key) {
                continue;
            }
            self.insert(map.as_any_mut(), key, value)?;
        }
        Ok(map)
    }
}

/// Field-less enum parsed by variant name
pub trait XmlEnum: Clone + 'static {
    const VARIANTS: &'static [(&'static str, Self)];
}

fn enum_variants<E: XmlEnum>() -> Vec<&'static str> {
    E::VARIANTS.iter().map(|(name, _)| *name).collect()
}

fn enum_parse<E: XmlEnum>(text: &str, ignore_case: bool) -> Option<BoxedValue> {
    E::VARIANTS
        .iter()
        .find(|(name, _)| {
            if ignore_case {
                name.eq_ignore_ascii_case(text)
            } else {
                *name == text
            }
        })
        .map(|(_, value)| BoxedValue::new(value.clone()))
}

#[derive(Clone, Copy)]
pub struct EnumShape {
    variants: fn() -> Vec<&'static str>,
    parse: fn(&str, bool) -> Option<BoxedValue>,
}

impl EnumShape {
    pub fn of<E: XmlEnum>() -> Self {
        Self {
            variants: enum_variants::<E>,
            parse: enum_parse::<E>,
        }
    }

    pub fn variants(&self) -> Vec<&'static str> {
        (self.variants)()
    }

    pub fn parse(&self, text: &str, ignore_case: bool) -> Option<BoxedValue> {
        (self.parse)(text, ignore_case)
    }
}

/// A model type bound property by property
#[derive(Clone, Copy)]
pub struct ModelShape {
    create: fn() -> BoxedValue,
    schema: fn() -> ModelSchema,
}

impl ModelShape {
    pub fn of<M: XmlModel>() -> Self {
        Self {
            create: default_constructor::<M>,
            schema: model_schema::<M>,
        }
    }

    pub fn create_fn(&self) -> fn() -> BoxedValue {
        self.create
    }

    /// Run the model's declaration
    pub fn schema(&self) -> ModelSchema {
        (self.schema)()
    }
}

/// A value type built from one or more parsed arguments
#[derive(Clone, Copy)]
pub struct ConstructedShape {
    constructors: fn() -> Vec<Constructor>,
}

fn declared_constructors<T: XmlConstruct>() -> Vec<Constructor> {
    let mut constructors = Constructors::new();
    T::constructors(&mut constructors);
    constructors.list
}

fn tuple_constructor<T: ConstructorArgs>() -> Vec<Constructor> {
    vec![Constructor::new(|args: T| args)]
}

impl ConstructedShape {
    pub fn of<T: XmlConstruct>() -> Self {
        Self {
            constructors: declared_constructors::<T>,
        }
    }

    /// Tuples have exactly one constructor taking every field in order
    pub fn tuple<T: ConstructorArgs>() -> Self {
        Self {
            constructors: tuple_constructor::<T>,
        }
    }

    pub fn constructors(&self) -> Vec<Constructor> {
        (self.constructors)()
    }
}

/// Argument list of a constructor, as a tuple of bindable types
pub trait ConstructorArgs: Sized + 'static {
    fn parameters() -> Vec<TypeInfo>;
    fn from_values(values: Vec<BoxedValue>) -> Result<Self, AssignError>;
}

macro_rules! constructor_args {
    ($($arg:ident),+) => {
        impl<$($arg: Bindable),+> ConstructorArgs for ($($arg,)+) {
            fn parameters() -> Vec<TypeInfo> {
                vec![$(TypeInfo::of::<$arg>()),+]
            }

            fn from_values(values: Vec<BoxedValue>) -> Result<Self, AssignError> {
                let mut values = values.into_iter();
                Ok(($(
                    downcast_item::<$arg>(values.next().ok_or(AssignError {
                        expected: type_name::<$arg>(),
                        actual: "nothing",
                    })?)?,
                )+))
            }
        }
    };
}

constructor_args!(A);
constructor_args!(A, B);
constructor_args!(A, B, C);
constructor_args!(A, B, C, D);
constructor_args!(A, B, C, D, E);
constructor_args!(A, B, C, D, E, F);
constructor_args!(A, B, C, D, E, F, G);
constructor_args!(A, B, C, D, E, F, G, H);

type InvokeFn = dyn Fn(Vec<BoxedValue>) -> Result<BoxedValue, AssignError> + Send + Sync;

/// Type-erased constructor taking positional boxed arguments
#[derive(Clone)]
pub struct Constructor {
    parameters: Vec<TypeInfo>,
    invoke: Arc<InvokeFn>,
}

impl Constructor {
    pub fn new<A, T, F>(construct: F) -> Self
    where
        A: ConstructorArgs,
        T: Any,
        F: Fn(A) -> T + Send + Sync + 'static,
    {
        Self {
            parameters: A::parameters(),
            invoke: Arc::new(move |values: Vec<BoxedValue>| -> Result<BoxedValue, AssignError> {
                A::from_values(values).map(|args| BoxedValue::new(construct(args)))
            }),
        }
    }

    pub fn parameters(&self) -> &[TypeInfo] {
        &self.parameters
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Arguments must match [`parameters`](Self::parameters) in order and type
    pub fn invoke(&self, args: Vec<BoxedValue>) -> Result<BoxedValue, AssignError> {
        (self.invoke)(args)
    }
}

/// Constructor list declared by an [`XmlConstruct`] type
pub struct Constructors<T> {
    list: Vec<Constructor>,
    _target: PhantomData<fn() -> T>,
}

impl<T: Any> Constructors<T> {
    fn new() -> Self {
        Self {
            list: Vec::new(),
            _target: PhantomData,
        }
    }

    pub fn add<A, F>(&mut self, construct: F) -> &mut Self
    where
        A: ConstructorArgs,
        F: Fn(A) -> T + Send + Sync + 'static,
    {
        self.list.push(Constructor::new(construct));
        self
    }
}

/// Value types built from parsed strings through declared constructors.
///
/// A single-argument constructor taking a built-in scalar lets the type be
/// parsed from one string; constructors with more arguments back tuple-shaped
/// properties bound to several child XPaths.
pub trait XmlConstruct: Sized + 'static {
    fn constructors(constructors: &mut Constructors<Self>);
}

type GetFn = dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync;
type SetFn = dyn Fn(&mut dyn Any, BoxedValue) -> Result<(), AssignError> + Send + Sync;

fn getter<F>(get: F) -> F
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any>,
{
    get
}

/// Typed accessor pair for one member of a model; see [`field!`](crate::field)
pub struct Field<M, P> {
    get: Arc<dyn Fn(&M) -> &P + Send + Sync>,
    get_mut: Arc<dyn Fn(&mut M) -> &mut P + Send + Sync>,
}

impl<M: Any, P: Any> Field<M, P> {
    pub fn new<G, S>(get: G, get_mut: S) -> Self
    where
        G: Fn(&M) -> &P + Send + Sync + 'static,
        S: Fn(&mut M) -> &mut P + Send + Sync + 'static,
    {
        Self {
            get: Arc::new(get),
            get_mut: Arc::new(get_mut),
        }
    }

    pub fn get<'a>(&self, model: &'a M) -> &'a P {
        (self.get)(model)
    }

    pub fn get_mut<'a>(&self, model: &'a mut M) -> &'a mut P {
        (self.get_mut)(model)
    }

    pub(crate) fn erase(self) -> PropertyAccessor {
        let Field { get, get_mut } = self;
        PropertyAccessor {
            get: Arc::new(getter(move |target| {
                target.downcast_ref::<M>().map(|model| get(model) as &dyn Any)
            })),
            set: Arc::new(
                move |target: &mut dyn Any, value: BoxedValue| -> Result<(), AssignError> {
                    let model = target.downcast_mut::<M>().ok_or_else(wrong_target::<M>)?;
                    *get_mut(model) = downcast_item::<P>(value)?;
                    Ok(())
                },
            ),
        }
    }
}

/// Type-erased getter/setter for a model member
#[derive(Clone)]
pub struct PropertyAccessor {
    get: Arc<GetFn>,
    set: Arc<SetFn>,
}

impl PropertyAccessor {
    pub fn get<'a>(&self, target: &'a dyn Any) -> Option<&'a dyn Any> {
        (self.get)(target)
    }

    pub fn set(&self, target: &mut dyn Any, value: BoxedValue) -> Result<(), AssignError> {
        (self.set)(target, value)
    }
}

/// Element type when `info` is an array
pub fn array_element_type(info: &TypeInfo) -> Option<TypeInfo> {
    match info.shape() {
        TypeShape::Array(shape) => Some(shape.element()),
        _ => None,
    }
}

/// Element type when `info` is a generic collection
pub fn collection_element_type(info: &TypeInfo) -> Option<TypeInfo> {
    match info.shape() {
        TypeShape::Collection(shape) => Some(shape.element()),
        _ => None,
    }
}

/// Key and value types when `info` is a generic dictionary
pub fn dictionary_entry_types(info: &TypeInfo) -> Option<(TypeInfo, TypeInfo)> {
    match info.shape() {
        TypeShape::Dictionary(shape) => Some((shape.key(), shape.value())),
        _ => None,
    }
}

/// Wrapped type when `info` is `Option<T>`
pub fn nullable_inner_type(info: &TypeInfo) -> Option<TypeInfo> {
    match info.shape() {
        TypeShape::Nullable(shape) => Some(shape.inner()),
        _ => None,
    }
}

/// True for arrays, collections and dictionaries; text is never enumerable
pub fn is_enumerable(info: &TypeInfo) -> bool {
    matches!(
        info.shape(),
        TypeShape::Array(_) | TypeShape::Collection(_) | TypeShape::Dictionary(_)
    )
}

/// Strip `Option`/`Box` layers, returning the core type and the wrap
/// functions to re-apply, outermost first
pub fn peel_wrappers(info: TypeInfo) -> (TypeInfo, Vec<WrapFn>) {
    let mut current = info;
    let mut wraps = Vec::new();
    loop {
        match current.shape() {
            TypeShape::Nullable(shape) | TypeShape::Boxed(shape) => {
                wraps.push(shape.wrap_fn());
                current = shape.inner();
            }
            _ => return (current, wraps),
        }
    }
}

/// Apply wrap functions produced by [`peel_wrappers`]
pub fn rewrap(mut value: BoxedValue, wraps: &[WrapFn]) -> Result<BoxedValue, AssignError> {
    for wrap in wraps.iter().rev() {
        value = wrap(value)?;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, VecDeque};

    #[derive(Debug, Clone, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    impl XmlConstruct for Point {
        fn constructors(constructors: &mut Constructors<Self>) {
            constructors
                .add(|(x, y): (i32, i32)| Point { x, y })
                .add(|(x,): (i32,)| Point { x, y: 0 });
        }
    }

    #[derive(Default)]
    struct Holder {
        label: String,
    }

    #[test]
    fn test_probes() {
        let info = TypeInfo::of::<Box<[u8]>>();
        assert_eq!(array_element_type(&info), Some(TypeInfo::of::<u8>()));
        assert_eq!(collection_element_type(&info), None);

        let info = TypeInfo::of::<VecDeque<String>>();
        assert_eq!(collection_element_type(&info), Some(TypeInfo::of::<String>()));

        let info = TypeInfo::of::<HashMap<String, f64>>();
        assert_eq!(
            dictionary_entry_types(&info),
            Some((TypeInfo::of::<String>(), TypeInfo::of::<f64>()))
        );

        assert_eq!(
            nullable_inner_type(&TypeInfo::of::<Option<i64>>()),
            Some(TypeInfo::of::<i64>())
        );
        assert!(is_enumerable(&TypeInfo::of::<BTreeSet<u32>>()));
        assert!(!is_enumerable(&TypeInfo::of::<String>()));
    }

    #[test]
    fn test_constructors_by_arity() {
        let shape = ConstructedShape::of::<Point>();
        let constructors = shape.constructors();
        assert_eq!(constructors.len(), 2);
        assert_eq!(constructors[0].arity(), 2);

        let point = constructors[0]
            .invoke(vec![BoxedValue::new(3_i32), BoxedValue::new(4_i32)])
            .unwrap();
        assert_eq!(point.downcast::<Point>().unwrap(), Point { x: 3, y: 4 });

        let err = constructors[1]
            .invoke(vec![BoxedValue::new("3".to_string())])
            .unwrap_err();
        assert_eq!(err.expected, "i32");
    }

    #[test]
    fn test_dictionary_first_write_wins() {
        let shape = DictionaryShape::of::<HashMap<String, i32>, String, i32>();
        let map = shape
            .populate(vec![
                (BoxedValue::new("a".to_string()), BoxedValue::new(1)),
                (BoxedValue::new("b".to_string()), BoxedValue::new(2)),
                (BoxedValue::new("a".to_string()), BoxedValue::new(3)),
            ])
            .unwrap()
            .downcast::<HashMap<String, i32>>()
            .unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], 1);
    }

    #[test]
    fn test_field_accessor() {
        let accessor =
            Field::new(|h: &Holder| &h.label, |h: &mut Holder| &mut h.label).erase();
        let mut holder = Holder::default();

        accessor
            .set(&mut holder, BoxedValue::new("hello".to_string()))
            .unwrap();
        assert_eq!(holder.label, "hello");

        let read = accessor.get(&holder).unwrap();
        assert_eq!(read.downcast_ref::<String>().unwrap(), "hello");

        assert!(accessor.set(&mut holder, BoxedValue::new(5_u8)).is_err());
    }

    #[test]
    fn test_peel_and_rewrap() {
        let (core, wraps) = peel_wrappers(TypeInfo::of::<Option<Box<u8>>>());
        assert_eq!(core, TypeInfo::of::<u8>());
        assert_eq!(wraps.len(), 2);

        let value = rewrap(BoxedValue::new(7_u8), &wraps).unwrap();
        assert_eq!(value.downcast::<Option<Box<u8>>>().unwrap(), Some(Box::new(7)));
    }
}
