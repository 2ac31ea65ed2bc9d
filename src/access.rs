//! Field readers and writers over live records.
//!
//! A [`Reader`] pairs a cached [`TypeDescriptor`] with a borrowed record and
//! resolves each descriptor field to its live value. A [`Writer`] does the
//! same over a mutable borrow and type-checks every assignment against the
//! field's declared type.

use std::any::Any;

use crate::descriptor::{FieldDescriptor, TypeDescriptor};
use crate::error::{Error, Result};
use crate::shape::{FieldDef, Typed};

/// Positional field access, generated by `#[derive(Record)]`.
///
/// Positions are declaration indices and match [`FieldDescriptor::position`].
pub trait Record: Typed {
    /// Every declared field, in declaration order.
    fn fields() -> Vec<FieldDef>
    where
        Self: Sized;

    fn field(&self, position: usize) -> Option<&dyn Any>;

    fn field_mut(&mut self, position: usize) -> Option<&mut dyn Any>;
}

// =============================================================================
// Reader
// =============================================================================

/// Read access to a record through its descriptor.
#[derive(Clone, Copy)]
pub struct Reader<'a> {
    descriptor: &'a TypeDescriptor,
    record: &'a dyn Record,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(descriptor: &'a TypeDescriptor, record: &'a dyn Record) -> Self {
        Self { descriptor, record }
    }

    #[inline]
    pub fn descriptor(&self) -> &'a TypeDescriptor {
        self.descriptor
    }

    /// One reader per descriptor field, in descriptor order.
    pub fn fields(&self) -> Vec<FieldReader<'a>> {
        self.descriptor
            .fields()
            .iter()
            .map(|field| FieldReader {
                field,
                record: self.record,
            })
            .collect()
    }

    /// Reader for the field declared as `name`.
    pub fn field(&self, name: &str) -> Option<FieldReader<'a>> {
        self.descriptor.field(name).map(|field| FieldReader {
            field,
            record: self.record,
        })
    }
}

/// A single readable field.
#[derive(Clone, Copy)]
pub struct FieldReader<'a> {
    field: &'a FieldDescriptor,
    record: &'a dyn Record,
}

impl<'a> FieldReader<'a> {
    #[inline]
    pub fn descriptor(&self) -> &'a FieldDescriptor {
        self.field
    }

    /// The live field value.
    ///
    /// `None` only if a hand-written [`Record`] disagrees with its own field table.
    pub fn value(&self) -> Option<&'a dyn Any> {
        self.record.field(self.field.position())
    }

    /// The live field value, if it is a `T`.
    pub fn value_as<T: Any>(&self) -> Option<&'a T> {
        self.value()?.downcast_ref::<T>()
    }
}

impl std::ops::Deref for FieldReader<'_> {
    type Target = FieldDescriptor;

    fn deref(&self) -> &Self::Target {
        self.field
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Write access to a record through its descriptor.
pub struct Writer<'a> {
    descriptor: &'a TypeDescriptor,
    record: &'a mut dyn Record,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(descriptor: &'a TypeDescriptor, record: &'a mut dyn Record) -> Self {
        Self { descriptor, record }
    }

    #[inline]
    pub fn descriptor(&self) -> &'a TypeDescriptor {
        self.descriptor
    }

    /// Read view of the same record.
    pub fn reader(&self) -> Reader<'_> {
        Reader::new(self.descriptor, &*self.record)
    }

    /// Writable descriptor fields, in descriptor order.
    pub fn fields(&self) -> &'a [FieldDescriptor] {
        self.descriptor.fields()
    }

    /// Writer for the field declared as `name`.
    pub fn field(&mut self, name: &str) -> Option<FieldWriter<'_>> {
        let field = self.descriptor.field(name)?;
        Some(FieldWriter {
            field,
            record: &mut *self.record,
        })
    }

    /// Writer for the descriptor field at `index` (not the declaration position).
    pub fn field_at(&mut self, index: usize) -> Option<FieldWriter<'_>> {
        let field = self.descriptor.fields().get(index)?;
        Some(FieldWriter {
            field,
            record: &mut *self.record,
        })
    }
}

/// A single writable field.
pub struct FieldWriter<'w> {
    field: &'w FieldDescriptor,
    record: &'w mut dyn Record,
}

impl FieldWriter<'_> {
    #[inline]
    pub fn descriptor(&self) -> &FieldDescriptor {
        self.field
    }

    pub fn value(&self) -> Option<&dyn Any> {
        self.record.field(self.field.position())
    }

    /// Replace the field value.
    ///
    /// Fails with [`Error::FieldTypeMismatch`] unless `V` is exactly the
    /// field's declared type.
    pub fn set_value<V: Any>(&mut self, value: V) -> Result<()> {
        let mismatch = || Error::FieldTypeMismatch {
            field: self.field.name(),
            expected: self.field.field_type().name(),
            found: std::any::type_name::<V>(),
        };

        let slot = self
            .record
            .field_mut(self.field.position())
            .ok_or_else(mismatch)?;
        match slot.downcast_mut::<V>() {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(mismatch()),
        }
    }
}

impl std::ops::Deref for FieldWriter<'_> {
    type Target = FieldDescriptor;

    fn deref(&self) -> &Self::Target {
        self.field
    }
}
