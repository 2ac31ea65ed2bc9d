//! Resolution of cache inputs to record types.
//!
//! The cache accepts a record value, a pointer to a record (`Box`, `&`, `&mut`,
//! `Rc`, `Arc`) or a [`TypeInfo`] token. Anything else resolves to
//! [`Error::InvalidInputKind`] carrying the observed kind.

use std::rc::Rc;
use std::sync::Arc;

use crate::access::Record;
use crate::error::{Error, Result};
use crate::shape::{Kind, TypeInfo};

/// A value the cache can resolve to a record type.
///
/// `#[derive(Record)]` implements this for the struct itself.
pub trait Source {
    /// Kind of this value, reported when it does not resolve.
    fn kind(&self) -> Kind;

    /// Record type denoted by this value.
    fn record_type(&self) -> Option<TypeInfo>;

    /// Live record behind this value.
    fn as_record(&self) -> Option<&dyn Record> {
        None
    }

    /// Live record behind this value, reached through an exclusive borrow.
    ///
    /// `None` for shared pointers and type tokens.
    fn as_record_mut(&mut self) -> Option<&mut dyn Record> {
        None
    }
}

/// Resolve `src` to the record type it denotes.
pub fn resolve<S: Source + ?Sized>(src: &S) -> Result<TypeInfo> {
    src.record_type()
        .ok_or_else(|| Error::InvalidInputKind { kind: src.kind() })
}

impl Source for TypeInfo {
    fn kind(&self) -> Kind {
        TypeInfo::kind(self)
    }

    /// Accepts record tokens and pointer-to-record tokens.
    fn record_type(&self) -> Option<TypeInfo> {
        self.record_target()
    }
}

impl<T: Record> Source for Box<T> {
    fn kind(&self) -> Kind {
        Kind::Pointer
    }

    fn record_type(&self) -> Option<TypeInfo> {
        Some(T::type_info())
    }

    fn as_record(&self) -> Option<&dyn Record> {
        Some(&**self)
    }

    fn as_record_mut(&mut self) -> Option<&mut dyn Record> {
        Some(&mut **self)
    }
}

impl<S: Source + ?Sized> Source for &mut S {
    fn kind(&self) -> Kind {
        (**self).kind()
    }

    fn record_type(&self) -> Option<TypeInfo> {
        (**self).record_type()
    }

    fn as_record(&self) -> Option<&dyn Record> {
        (**self).as_record()
    }

    fn as_record_mut(&mut self) -> Option<&mut dyn Record> {
        (**self).as_record_mut()
    }
}

macro_rules! impl_shared_pointer_source {
    ($($ptr:ident),+) => {
        $(
            impl<T: Record> Source for $ptr<T> {
                fn kind(&self) -> Kind {
                    Kind::Pointer
                }

                fn record_type(&self) -> Option<TypeInfo> {
                    Some(T::type_info())
                }

                fn as_record(&self) -> Option<&dyn Record> {
                    Some(&**self)
                }
            }
        )+
    };
}

impl_shared_pointer_source!(Rc, Arc);

impl<T: Record> Source for &T {
    fn kind(&self) -> Kind {
        Kind::Pointer
    }

    fn record_type(&self) -> Option<TypeInfo> {
        Some(T::type_info())
    }

    fn as_record(&self) -> Option<&dyn Record> {
        Some(*self)
    }
}

// Values that never resolve; implemented so callers get a descriptive error
// instead of a trait-bound failure.

macro_rules! impl_unresolvable_source {
    ($kind:ident => $($ty:ty),+) => {
        $(
            impl Source for $ty {
                fn kind(&self) -> Kind {
                    Kind::$kind
                }

                fn record_type(&self) -> Option<TypeInfo> {
                    None
                }
            }
        )+
    };
}

impl_unresolvable_source!(Int => i32, i64);
impl_unresolvable_source!(String => String, str);

/// A writer target, consumed by [`DescriptorCache::new_writer`](crate::DescriptorCache::new_writer).
///
/// Exclusive borrows (`&mut T`, `&mut Box<T>`) hand out the record behind
/// them. Owned records, shared borrows, `Rc`, `Arc` and type tokens do not.
pub trait Writable<'a>: Source {
    fn into_record_mut(self) -> Option<&'a mut dyn Record>;
}

impl<'a, S: Source + ?Sized> Writable<'a> for &'a mut S {
    fn into_record_mut(self) -> Option<&'a mut dyn Record> {
        S::as_record_mut(self)
    }
}

impl<'a, T: Record> Writable<'a> for &'a T {
    fn into_record_mut(self) -> Option<&'a mut dyn Record> {
        None
    }
}

impl<'a, T: Record> Writable<'a> for Rc<T> {
    fn into_record_mut(self) -> Option<&'a mut dyn Record> {
        None
    }
}

impl<'a, T: Record> Writable<'a> for Arc<T> {
    fn into_record_mut(self) -> Option<&'a mut dyn Record> {
        None
    }
}

impl<'a> Writable<'a> for TypeInfo {
    fn into_record_mut(self) -> Option<&'a mut dyn Record> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_rejected_with_their_kind() {
        let err = resolve("test").unwrap_err();
        assert!(matches!(err, Error::InvalidInputKind { kind: Kind::String }));
        assert!(err.to_string().contains("\"string\""));

        let err = resolve(&String::from("test")).unwrap_err();
        assert!(matches!(err, Error::InvalidInputKind { kind: Kind::String }));
    }

    #[test]
    fn integers_are_rejected() {
        let err = resolve(&7i32).unwrap_err();
        assert!(matches!(err, Error::InvalidInputKind { kind: Kind::Int }));
    }

    #[test]
    fn scalar_type_tokens_are_rejected() {
        let err = resolve(&TypeInfo::of::<u32>()).unwrap_err();
        assert!(matches!(err, Error::InvalidInputKind { kind: Kind::Uint }));
    }
}
