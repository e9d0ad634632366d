//! Declaration helpers

/// Typed getter/setter pair for a struct member.
///
/// ```ignore
/// model.attribute("name", "name", field!(Person, name));
/// ```
#[macro_export]
macro_rules! field {
    ($model:ty, $member:ident) => {
        $crate::Field::new(
            |model: &$model| &model.$member,
            |model: &mut $model| &mut model.$member,
        )
    };
}

/// Register a user type with the binder.
///
/// - `bindable!(model T)` for an [`XmlModel`](crate::XmlModel)
/// - `bindable!(construct T)` for an [`XmlConstruct`](crate::XmlConstruct) value type
/// - `bindable!(enum T)` for a hand-written [`XmlEnum`](crate::XmlEnum)
#[macro_export]
macro_rules! bindable {
    (model $ty:ty) => {
        impl $crate::Bindable for $ty {
            fn type_shape() -> $crate::TypeShape {
                $crate::TypeShape::Model($crate::accessor::ModelShape::of::<$ty>())
            }
        }
    };
    (construct $ty:ty) => {
        impl $crate::Bindable for $ty {
            fn type_shape() -> $crate::TypeShape {
                $crate::TypeShape::Constructed($crate::accessor::ConstructedShape::of::<$ty>())
            }
        }
    };
    (enum $ty:ty) => {
        impl $crate::Bindable for $ty {
            fn type_shape() -> $crate::TypeShape {
                $crate::TypeShape::Enum($crate::accessor::EnumShape::of::<$ty>())
            }
        }
    };
}

/// Declare a field-less enum parsed from its variant names.
///
/// The enum must derive `Clone`: parsing hands out copies of the variant
/// table entries.
///
/// ```
/// xbind_core::xml_enum! {
///     #[derive(Debug, Clone, Copy, PartialEq)]
///     pub enum Status {
///         Active,
///         Retired,
///     }
/// }
/// ```
///
/// ```compile_fail
/// xbind_core::xml_enum! {
///     enum Plain {
///         A,
///         B,
///     }
/// }
/// ```
#[macro_export]
macro_rules! xml_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),+
        }

        impl $crate::XmlEnum for $name {
            const VARIANTS: &'static [(&'static str, Self)] = &[
                $((stringify!($variant), $name::$variant)),+
            ];
        }

        $crate::bindable!(enum $name);
    };
}
