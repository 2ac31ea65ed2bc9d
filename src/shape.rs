//! Compile-time type shapes.
//!
//! Every describable type implements [`Typed`], which hands out a [`TypeInfo`]:
//! the type's identity, its display name and its [`Shape`]. Nested types are
//! referenced through plain `fn() -> TypeInfo` pointers, so a record that
//! points at itself is described without ever being expanded eagerly.

use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Coarse classification of a type, as reported in diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Bool,
    Int,
    Uint,
    Float,
    Char,
    String,
    Unit,
    Record,
    Map,
    Sequence,
    Pointer,
}

impl Kind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Uint => "uint",
            Kind::Float => "float",
            Kind::Char => "char",
            Kind::String => "string",
            Kind::Unit => "unit",
            Kind::Record => "record",
            Kind::Map => "map",
            Kind::Sequence => "sequence",
            Kind::Pointer => "pointer",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structure of a type, with lazy links to nested types.
#[derive(Clone, Copy)]
pub enum Shape {
    Scalar(Kind),
    Record { fields: fn() -> Vec<FieldDef> },
    Map {
        key: fn() -> TypeInfo,
        value: fn() -> TypeInfo,
    },
    Sequence { elem: fn() -> TypeInfo },
    Pointer { target: fn() -> TypeInfo },
}

/// Static description of one declared field, emitted by `#[derive(Record)]`.
#[derive(Clone, Copy, Debug)]
pub struct FieldDef {
    pub name: &'static str,
    /// Declared plain `pub`.
    pub public: bool,
    /// `(namespace, raw tag)` pairs.
    pub tags: &'static [(&'static str, &'static str)],
    pub ty: fn() -> TypeInfo,
}

impl FieldDef {
    /// Raw tag under `namespace`; an undeclared tag reads as `""`.
    pub fn tag(&self, namespace: &str) -> &'static str {
        self.tags
            .iter()
            .find(|(ns, _)| *ns == namespace)
            .map(|(_, raw)| *raw)
            .unwrap_or("")
    }
}

/// Copyable type token: identity, name and shape.
///
/// Equality and hashing only consider the [`TypeId`].
#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
    shape: Shape,
}

impl TypeInfo {
    /// Token for `T`.
    #[inline]
    pub fn of<T: Typed>() -> Self {
        T::type_info()
    }

    pub fn scalar<T: 'static>(kind: Kind) -> Self {
        Self::with_shape::<T>(Shape::Scalar(kind))
    }

    pub fn record<T: 'static>(fields: fn() -> Vec<FieldDef>) -> Self {
        Self::with_shape::<T>(Shape::Record { fields })
    }

    pub fn map<T: 'static, K: Typed, V: Typed>() -> Self {
        Self::with_shape::<T>(Shape::Map {
            key: K::type_info,
            value: V::type_info,
        })
    }

    pub fn sequence<T: 'static, E: Typed>() -> Self {
        Self::with_shape::<T>(Shape::Sequence {
            elem: E::type_info,
        })
    }

    pub fn pointer<T: 'static, P: Typed>() -> Self {
        Self::with_shape::<T>(Shape::Pointer {
            target: P::type_info,
        })
    }

    fn with_shape<T: 'static>(shape: Shape) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            shape,
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn kind(&self) -> Kind {
        match self.shape {
            Shape::Scalar(kind) => kind,
            Shape::Record { .. } => Kind::Record,
            Shape::Map { .. } => Kind::Map,
            Shape::Sequence { .. } => Kind::Sequence,
            Shape::Pointer { .. } => Kind::Pointer,
        }
    }

    #[inline]
    pub fn is_record(&self) -> bool {
        matches!(self.shape, Shape::Record { .. })
    }

    /// Declared fields, for record types.
    pub fn fields(&self) -> Option<Vec<FieldDef>> {
        match self.shape {
            Shape::Record { fields } => Some(fields()),
            _ => None,
        }
    }

    /// Key type of a map.
    pub fn key_type(&self) -> Option<TypeInfo> {
        match self.shape {
            Shape::Map { key, .. } => Some(key()),
            _ => None,
        }
    }

    /// Value type of a map, or element type of a sequence.
    pub fn elem_type(&self) -> Option<TypeInfo> {
        match self.shape {
            Shape::Map { value, .. } => Some(value()),
            Shape::Sequence { elem } => Some(elem()),
            _ => None,
        }
    }

    /// The record this type denotes: itself, or the end of a pointer chain.
    ///
    /// `Node`, `Box<Node>` and `Option<Box<Node>>` all resolve to `Node`.
    pub fn record_target(&self) -> Option<TypeInfo> {
        let mut current = *self;
        loop {
            match current.shape {
                Shape::Record { .. } => return Some(current),
                Shape::Pointer { target } => current = target(),
                _ => return None,
            }
        }
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl std::hash::Hash for TypeInfo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Scalar(kind) => write!(f, "Scalar({kind})"),
            Shape::Record { .. } => f.write_str("Record"),
            Shape::Map { key, value } => write!(f, "Map<{}, {}>", key(), value()),
            Shape::Sequence { elem } => write!(f, "Sequence<{}>", elem()),
            Shape::Pointer { target } => write!(f, "Pointer<{}>", target()),
        }
    }
}

/// Types with a static [`TypeInfo`].
///
/// Implemented here for std scalars and containers, and by `#[derive(Record)]`
/// for user structs.
pub trait Typed: 'static {
    fn type_info() -> TypeInfo
    where
        Self: Sized;
}

// =============================================================================
// Built-in shapes
// =============================================================================

macro_rules! impl_scalar {
    ($kind:ident => $($ty:ty),+ $(,)?) => {
        $(
            impl Typed for $ty {
                fn type_info() -> TypeInfo {
                    TypeInfo::scalar::<Self>(Kind::$kind)
                }
            }
        )+
    };
}

impl_scalar!(Bool => bool);
impl_scalar!(Int => i8, i16, i32, i64, i128, isize);
impl_scalar!(Uint => u8, u16, u32, u64, u128, usize);
impl_scalar!(Float => f32, f64);
impl_scalar!(Char => char);
impl_scalar!(String => String, &'static str);
impl_scalar!(Unit => ());

impl<T: Typed> Typed for Vec<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::sequence::<Self, T>()
    }
}

impl<T: Typed> Typed for VecDeque<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::sequence::<Self, T>()
    }
}

impl<T: Typed, const N: usize> Typed for [T; N] {
    fn type_info() -> TypeInfo {
        TypeInfo::sequence::<Self, T>()
    }
}

impl<T: Typed, S: 'static> Typed for HashSet<T, S> {
    fn type_info() -> TypeInfo {
        TypeInfo::sequence::<Self, T>()
    }
}

impl<T: Typed> Typed for BTreeSet<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::sequence::<Self, T>()
    }
}

impl<K: Typed, V: Typed, S: 'static> Typed for HashMap<K, V, S> {
    fn type_info() -> TypeInfo {
        TypeInfo::map::<Self, K, V>()
    }
}

impl<K: Typed, V: Typed> Typed for BTreeMap<K, V> {
    fn type_info() -> TypeInfo {
        TypeInfo::map::<Self, K, V>()
    }
}

impl<T: Typed> Typed for Box<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::pointer::<Self, T>()
    }
}

impl<T: Typed> Typed for Rc<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::pointer::<Self, T>()
    }
}

impl<T: Typed> Typed for Arc<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::pointer::<Self, T>()
    }
}

impl<T: Typed> Typed for Option<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::pointer::<Self, T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_kinds() {
        assert_eq!(TypeInfo::of::<bool>().kind(), Kind::Bool);
        assert_eq!(TypeInfo::of::<i32>().kind(), Kind::Int);
        assert_eq!(TypeInfo::of::<u64>().kind(), Kind::Uint);
        assert_eq!(TypeInfo::of::<f32>().kind(), Kind::Float);
        assert_eq!(TypeInfo::of::<String>().kind(), Kind::String);
        assert_eq!(TypeInfo::of::<&'static str>().kind(), Kind::String);
        assert_eq!(TypeInfo::of::<()>().kind(), Kind::Unit);
    }

    #[test]
    fn map_has_key_and_elem() {
        let info = TypeInfo::of::<HashMap<String, i64>>();
        assert_eq!(info.kind(), Kind::Map);
        assert_eq!(info.key_type(), Some(TypeInfo::of::<String>()));
        assert_eq!(info.elem_type(), Some(TypeInfo::of::<i64>()));
    }

    #[test]
    fn sequence_has_only_elem() {
        for info in [
            TypeInfo::of::<Vec<u8>>(),
            TypeInfo::of::<[u8; 4]>(),
            TypeInfo::of::<BTreeSet<u8>>(),
        ] {
            assert_eq!(info.kind(), Kind::Sequence);
            assert_eq!(info.key_type(), None);
            assert_eq!(info.elem_type(), Some(TypeInfo::of::<u8>()));
        }
    }

    #[test]
    fn scalars_and_pointers_have_no_sub_types() {
        for info in [TypeInfo::of::<String>(), TypeInfo::of::<Box<u8>>()] {
            assert_eq!(info.key_type(), None);
            assert_eq!(info.elem_type(), None);
        }
    }

    #[test]
    fn record_target_rejects_non_records() {
        assert_eq!(TypeInfo::of::<u8>().record_target(), None);
        assert_eq!(TypeInfo::of::<Option<Box<u8>>>().record_target(), None);
        assert_eq!(TypeInfo::of::<Vec<u8>>().record_target(), None);
    }

    #[test]
    fn identity_ignores_shape() {
        assert_eq!(TypeInfo::of::<Vec<u8>>(), TypeInfo::of::<Vec<u8>>());
        assert_ne!(TypeInfo::of::<Vec<u8>>(), TypeInfo::of::<Vec<i8>>());
        assert_ne!(TypeInfo::of::<Box<u8>>(), TypeInfo::of::<u8>());
    }

    #[test]
    fn field_def_tag_defaults_to_empty() {
        let def = FieldDef {
            name: "dummy",
            public: true,
            tags: &[("test", "dummytag")],
            ty: <String as Typed>::type_info,
        };
        assert_eq!(def.tag("test"), "dummytag");
        assert_eq!(def.tag("json"), "");
    }

    #[test]
    fn kind_display_is_lowercase() {
        assert_eq!(Kind::String.to_string(), "string");
        assert_eq!(Kind::Sequence.to_string(), "sequence");
    }
}
