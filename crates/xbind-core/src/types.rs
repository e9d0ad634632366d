//! Type-erased values and the shape system that describes bindable types

use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::accessor::{
    ArrayShape, CollectionShape, ConstructedShape, DictionaryShape, EnumShape, ModelShape,
    WrapperShape,
};

/// An owned value whose concrete type is only known at runtime
pub struct BoxedValue {
    value: Box<dyn Any>,
    type_name: &'static str,
}

impl BoxedValue {
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Name of the concrete type held
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Take the value out, or give the box back if `T` is the wrong type
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let type_name = self.type_name;
        match self.value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(Self { value, type_name }),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn as_any(&self) -> &dyn Any {
        &*self.value
    }

    pub fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut *self.value
    }
}

impl fmt::Debug for BoxedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoxedValue").field(&self.type_name).finish()
    }
}

/// Runtime identity of a bindable type plus a handle to its shape
#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
    shape: fn() -> TypeShape,
}

impl TypeInfo {
    pub fn of<T: Bindable>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            shape: T::type_shape,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn shape(&self) -> TypeShape {
        (self.shape)()
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Built-in scalar types parsed directly from text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Char,
    Bool,
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
    Decimal,
    Uuid,
}

/// Date and time types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalKind {
    Date,
    DateTime,
    Time,
    Utc,
    FixedOffset,
}

/// What a type looks like to the binder
#[derive(Clone, Copy)]
pub enum TypeShape {
    Scalar(ScalarKind),
    Temporal(TemporalKind),
    Enum(EnumShape),
    /// Receives the outer XML of the matched node
    Fragment,
    Model(ModelShape),
    Constructed(ConstructedShape),
    Nullable(WrapperShape),
    Boxed(WrapperShape),
    Array(ArrayShape),
    Collection(CollectionShape),
    Dictionary(DictionaryShape),
}

impl fmt::Debug for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeShape::Scalar(kind) => f.debug_tuple("Scalar").field(kind).finish(),
            TypeShape::Temporal(kind) => f.debug_tuple("Temporal").field(kind).finish(),
            TypeShape::Enum(_) => f.write_str("Enum"),
            TypeShape::Fragment => f.write_str("Fragment"),
            TypeShape::Model(_) => f.write_str("Model"),
            TypeShape::Constructed(_) => f.write_str("Constructed"),
            TypeShape::Nullable(shape) => f.debug_tuple("Nullable").field(&shape.inner()).finish(),
            TypeShape::Boxed(shape) => f.debug_tuple("Boxed").field(&shape.inner()).finish(),
            TypeShape::Array(shape) => f.debug_tuple("Array").field(&shape.element()).finish(),
            TypeShape::Collection(shape) => {
                f.debug_tuple("Collection").field(&shape.element()).finish()
            }
            TypeShape::Dictionary(shape) => f
                .debug_tuple("Dictionary")
                .field(&shape.key())
                .field(&shape.value())
                .finish(),
        }
    }
}

/// A type the binder can produce.
///
/// Implemented here for scalars, temporal types, wrappers and containers.
/// Model types, constructed value types and enums opt in through
/// [`bindable!`](crate::bindable) and [`xml_enum!`](crate::xml_enum).
pub trait Bindable: Any {
    fn type_shape() -> TypeShape;
}

/// Raw outer XML of a matched node
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct XmlFragment(pub String);

impl XmlFragment {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for XmlFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Bindable for XmlFragment {
    fn type_shape() -> TypeShape {
        TypeShape::Fragment
    }
}

macro_rules! scalar_bindable {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Bindable for $ty {
                fn type_shape() -> TypeShape {
                    TypeShape::Scalar(ScalarKind::$kind)
                }
            }
        )*
    };
}

scalar_bindable! {
    String => String,
    char => Char,
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    u128 => U128,
    usize => Usize,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    Uuid => Uuid,
}

macro_rules! temporal_bindable {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Bindable for $ty {
                fn type_shape() -> TypeShape {
                    TypeShape::Temporal(TemporalKind::$kind)
                }
            }
        )*
    };
}

temporal_bindable! {
    NaiveDate => Date,
    NaiveDateTime => DateTime,
    NaiveTime => Time,
    DateTime<Utc> => Utc,
    DateTime<FixedOffset> => FixedOffset,
}

impl<T: Bindable> Bindable for Option<T> {
    fn type_shape() -> TypeShape {
        TypeShape::Nullable(WrapperShape::option::<T>())
    }
}

impl<T: Bindable> Bindable for Box<T> {
    fn type_shape() -> TypeShape {
        TypeShape::Boxed(WrapperShape::boxed::<T>())
    }
}

impl<T: Bindable> Bindable for Box<[T]> {
    fn type_shape() -> TypeShape {
        TypeShape::Array(ArrayShape::of::<T>())
    }
}

impl<T: Bindable> Bindable for Vec<T> {
    fn type_shape() -> TypeShape {
        TypeShape::Collection(CollectionShape::of::<Self, T>())
    }
}

impl<T: Bindable> Bindable for VecDeque<T> {
    fn type_shape() -> TypeShape {
        TypeShape::Collection(CollectionShape::of::<Self, T>())
    }
}

impl<T: Bindable> Bindable for LinkedList<T> {
    fn type_shape() -> TypeShape {
        TypeShape::Collection(CollectionShape::of::<Self, T>())
    }
}

impl<T: Bindable + Eq + Hash> Bindable for HashSet<T> {
    fn type_shape() -> TypeShape {
        TypeShape::Collection(CollectionShape::of::<Self, T>())
    }
}

impl<T: Bindable + Ord> Bindable for BTreeSet<T> {
    fn type_shape() -> TypeShape {
        TypeShape::Collection(CollectionShape::of::<Self, T>())
    }
}

impl<K: Bindable + Eq + Hash, V: Bindable> Bindable for HashMap<K, V> {
    fn type_shape() -> TypeShape {
        TypeShape::Dictionary(DictionaryShape::of::<Self, K, V>())
    }
}

impl<K: Bindable + Ord, V: Bindable> Bindable for BTreeMap<K, V> {
    fn type_shape() -> TypeShape {
        TypeShape::Dictionary(DictionaryShape::of::<Self, K, V>())
    }
}

macro_rules! tuple_bindable {
    ($($arg:ident),+) => {
        impl<$($arg: Bindable),+> Bindable for ($($arg,)+) {
            fn type_shape() -> TypeShape {
                TypeShape::Constructed(ConstructedShape::tuple::<Self>())
            }
        }
    };
}

tuple_bindable!(A, B);
tuple_bindable!(A, B, C);
tuple_bindable!(A, B, C, D);
