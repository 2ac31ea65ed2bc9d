//! Type and field descriptors.
//!
//! A [`TypeDescriptor`] is built from a record's static field table under one
//! tag namespace. Construction never recurses and never validates; both are
//! the cache's job.

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::shape::{FieldDef, TypeInfo};
use crate::tag::TagMetadata;

/// Metadata for one accessible field of a record.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    /// Owning record. A type token, not an owning link; resolve it through the cache.
    parent: TypeInfo,
    position: usize,
    name: &'static str,
    tag: TagMetadata,
    field_type: TypeInfo,
    key_type: Option<TypeInfo>,
    elem_type: Option<TypeInfo>,
}

impl FieldDescriptor {
    /// Describe `def`, declared at `position` in `parent`.
    ///
    /// Returns `None` for fields that are not plain `pub` or whose label under
    /// `namespace` is `-`.
    pub fn new(parent: TypeInfo, position: usize, def: &FieldDef, namespace: &str) -> Option<Self> {
        if !def.public {
            return None;
        }

        let tag = TagMetadata::parse(def.tag(namespace));
        if tag.is_excluded() {
            return None;
        }

        let field_type = (def.ty)();
        Some(Self {
            parent,
            position,
            name: def.name,
            tag,
            field_type,
            key_type: field_type.key_type(),
            elem_type: field_type.elem_type(),
        })
    }

    #[inline]
    pub fn parent(&self) -> TypeInfo {
        self.parent
    }

    /// Declaration index within the parent record.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// External name: the tag label, or the declared name when the label is empty.
    pub fn label(&self) -> &str {
        match self.tag.label() {
            Some(label) if !label.is_empty() => label,
            _ => self.name,
        }
    }

    #[inline]
    pub fn tag(&self) -> &TagMetadata {
        &self.tag
    }

    #[inline]
    pub fn field_type(&self) -> TypeInfo {
        self.field_type
    }

    /// Key type, for map fields.
    #[inline]
    pub fn key_type(&self) -> Option<TypeInfo> {
        self.key_type
    }

    /// Element type, for map and sequence fields.
    #[inline]
    pub fn elem_type(&self) -> Option<TypeInfo> {
        self.elem_type
    }

    /// Records reachable from this field's own, key and element types.
    pub(crate) fn nested_records(&self) -> impl Iterator<Item = TypeInfo> + '_ {
        [Some(self.field_type), self.key_type, self.elem_type]
            .into_iter()
            .flatten()
            .filter_map(|ty| ty.record_target())
    }
}

/// Metadata for one record type under one tag namespace.
#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    type_info: TypeInfo,
    namespace: String,
    fields: Vec<FieldDescriptor>,
    field_names: Vec<&'static str>,
    /// Caller-controlled extension values.
    attrs: HashMap<String, Arc<dyn Any + Send + Sync>>,
    complete: bool,
}

impl TypeDescriptor {
    /// Describe the record `type_info` under `namespace`.
    ///
    /// # Errors
    ///
    /// [`Error::NotARecord`] if `type_info` is not a record type.
    pub fn new(type_info: TypeInfo, namespace: &str) -> Result<Self> {
        let defs = type_info.fields().ok_or(Error::NotARecord {
            name: type_info.name(),
        })?;

        let fields: Vec<FieldDescriptor> = defs
            .iter()
            .enumerate()
            .filter_map(|(position, def)| FieldDescriptor::new(type_info, position, def, namespace))
            .collect();
        let field_names = fields.iter().map(|f| f.name).collect();

        Ok(Self {
            type_info,
            namespace: namespace.to_string(),
            fields,
            field_names,
            attrs: HashMap::new(),
            complete: false,
        })
    }

    #[inline]
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Accessible, non-excluded fields in declaration order.
    #[inline]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Declared names, parallel to [`fields`](Self::fields).
    #[inline]
    pub fn field_names(&self) -> &[&'static str] {
        &self.field_names
    }

    /// Field declared as `name`.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether validation passed and the descriptor is committed.
    ///
    /// Observed `false` only while a self-referential type graph is still
    /// being registered.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub(crate) fn mark_complete(&mut self) {
        self.complete = true;
    }

    /// Attach `value` under `key`.
    ///
    /// The bag only grows: an occupied key keeps its value and the call fails
    /// with [`Error::AttributeExists`].
    pub fn insert_attr<T: Any + Send + Sync>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<()> {
        match self.attrs.entry(key.into()) {
            Entry::Occupied(slot) => Err(Error::AttributeExists {
                key: slot.key().clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(value));
                Ok(())
            }
        }
    }

    /// Attribute under `key`, if it was stored as a `T`.
    pub fn get_attr<T: Any>(&self, key: &str) -> Option<&T> {
        self.attrs.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    #[inline]
    pub fn has_attr(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    pub fn attr_keys(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }
}
