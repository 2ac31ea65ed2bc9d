//! Bevy integration for the descriptor cache.
//!
//! Provides:
//! - `DescriptorPlugin`: builder-pattern plugin that registers record types at
//!   app build time and inserts the cache as a Resource
//!
//! # Example
//!
//! ```ignore
//! use bevy::prelude::*;
//! use fieldtag::plugin::DescriptorPlugin;
//! use fieldtag::{DescriptorCache, Record};
//!
//! #[derive(Record)]
//! pub struct Settings {
//!     #[tag(json = "volume,omitempty")]
//!     pub volume: f32,
//! }
//!
//! fn main() {
//!     App::new()
//!         .add_plugins(DescriptorPlugin::new("json").with_type::<Settings>())
//!         .add_systems(Startup, dump)
//!         .run();
//! }
//!
//! fn dump(cache: Res<DescriptorCache>) {
//!     for desc in cache.descriptors() {
//!         info!("{}: {:?}", desc.type_info(), desc.field_names());
//!     }
//! }
//! ```

use std::sync::Arc;

use bevy::prelude::*;

use crate::access::Record;
use crate::cache::{DescriptorCache, Validator};
use crate::descriptor::TypeDescriptor;
use crate::error::BoxError;
use crate::shape::TypeInfo;

// =============================================================================
// Plugin
// =============================================================================

/// Bevy plugin building a [`DescriptorCache`] resource for one tag namespace.
///
/// Use the builder pattern to configure:
///
/// ```ignore
/// App::new()
///     .add_plugins(
///         DescriptorPlugin::new("json")
///             .with_type::<Settings>()
///             .with_validator(|_, desc| check(desc))
///     )
/// ```
///
/// Registration happens in [`Plugin::build`] and panics on failure, so a
/// misdeclared type stops the app at startup.
pub struct DescriptorPlugin {
    namespace: String,
    types: Vec<TypeInfo>,
    validator: Option<Validator>,
}

impl DescriptorPlugin {
    /// Create a plugin for `namespace` with no types.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            types: Vec::new(),
            validator: None,
        }
    }

    /// Register `T` (and the records it reaches) when the app is built.
    pub fn with_type<T: Record>(mut self) -> Self {
        self.types.push(TypeInfo::of::<T>());
        self
    }

    /// Validation hook installed before any type is registered.
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&DescriptorCache, &TypeDescriptor) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }
}

impl Plugin for DescriptorPlugin {
    fn build(&self, app: &mut App) {
        let mut cache = DescriptorCache::new(self.namespace.clone());
        if let Some(validator) = &self.validator {
            cache.set_shared_validator(validator.clone());
        }

        for ty in &self.types {
            cache.register_or_panic(ty);
        }

        app.insert_resource(cache);
    }
}

// =============================================================================
// Resource impl for DescriptorCache
// =============================================================================

impl Resource for DescriptorCache {}

// =============================================================================
// Tests
// =============================================================================
