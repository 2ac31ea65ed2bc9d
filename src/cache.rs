//! Descriptor cache: registration, lookup and validation of record descriptors.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::access::{Reader, Writer};
use crate::descriptor::TypeDescriptor;
use crate::error::{BoxError, Error, Result};
use crate::shape::TypeInfo;
use crate::source::{resolve, Source, Writable};

/// Hook run over every descriptor before it is committed.
///
/// It sees the cache as it is mid-registration: the candidate itself and any
/// nested types it pulled in are already present.
pub type Validator =
    Arc<dyn Fn(&DescriptorCache, &TypeDescriptor) -> Result<(), BoxError> + Send + Sync>;

/// Cache key: one descriptor per type and tag namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct DescriptorKey {
    type_id: TypeId,
    namespace: String,
}

impl DescriptorKey {
    fn new(info: TypeInfo, namespace: &str) -> Self {
        Self {
            type_id: info.id(),
            namespace: namespace.to_string(),
        }
    }
}

/// Cache of record descriptors keyed by `(type, tag namespace)`.
///
/// Provides:
/// - Idempotent registration, recursing into nested record types
/// - Termination on self-referential type graphs (eager insertion)
/// - A validation hook with rollback on rejection
/// - Readers and writers over live records
///
/// Registration takes `&mut self`; hosts that share a cache across threads
/// wrap it in a lock so each registration appears atomic.
#[derive(Clone)]
pub struct DescriptorCache {
    /// Namespace used by [`register`](Self::register) and [`lookup`](Self::lookup).
    namespace: String,
    descriptors: HashMap<DescriptorKey, TypeDescriptor>,
    validator: Validator,
}

impl DescriptorCache {
    /// Create an empty cache for the tag namespace `namespace` (e.g. `"json"`).
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            descriptors: HashMap::new(),
            validator: Arc::new(|_, _| Ok(())),
        }
    }

    /// Builder form of [`set_validator`](Self::set_validator).
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&DescriptorCache, &TypeDescriptor) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.set_validator(validator);
        self
    }

    /// Replace the validation hook. Already committed descriptors are unaffected.
    pub fn set_validator<F>(&mut self, validator: F)
    where
        F: Fn(&DescriptorCache, &TypeDescriptor) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.validator = Arc::new(validator);
    }

    pub(crate) fn set_shared_validator(&mut self, validator: Validator) {
        self.validator = validator;
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Number of cached descriptors across all namespaces.
    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Iterate all cached descriptors (unordered).
    pub fn descriptors(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.descriptors.values()
    }

    /// Check if the type denoted by `src` has a descriptor in the default namespace.
    pub fn contains<S: Source + ?Sized>(&self, src: &S) -> bool {
        self.lookup(src).is_ok()
    }

    /// Register the record type denoted by `src` under the default namespace.
    ///
    /// `src` may be a record value, a pointer to one or a [`TypeInfo`] token.
    /// Nested record types (fields, map keys and values, sequence elements,
    /// through any pointer chain) are registered as well.
    ///
    /// Registering an already cached type is a no-op.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInputKind`] if `src` does not denote a record
    /// - [`Error::ValidationFailed`] if the hook rejects this or a nested type
    ///
    /// On error the descriptor for `src` is removed again. Nested types that
    /// were committed before the failure stay cached; they are valid on
    /// their own.
    pub fn register<S: Source + ?Sized>(&mut self, src: &S) -> Result<()> {
        let namespace = self.namespace.clone();
        self.register_in(src, &namespace)
    }

    /// [`register`](Self::register) under an explicit namespace.
    pub fn register_in<S: Source + ?Sized>(&mut self, src: &S, namespace: &str) -> Result<()> {
        let info = resolve(src)?;
        self.register_type(info, namespace)
    }

    /// Register `src`, panicking on failure.
    ///
    /// For initialization code that treats a bad registration as a bug.
    pub fn register_or_panic<S: Source + ?Sized>(&mut self, src: &S) {
        if let Err(err) = self.register(src) {
            panic!("fieldtag: {err}");
        }
    }

    fn register_type(&mut self, info: TypeInfo, namespace: &str) -> Result<()> {
        let key = DescriptorKey::new(info, namespace);

        // Also the base case for recursive types: a type still under
        // construction is already present here.
        if self.descriptors.contains_key(&key) {
            trace!(ty = info.name(), namespace, "descriptor already cached");
            return Ok(());
        }

        let descriptor = TypeDescriptor::new(info, namespace)?;
        let nested: Vec<TypeInfo> = descriptor
            .fields()
            .iter()
            .flat_map(|f| f.nested_records())
            .collect();

        // Insert before recursing so cycles terminate.
        self.descriptors.insert(key.clone(), descriptor);

        for sub in nested {
            trace!(ty = info.name(), nested = sub.name(), "registering nested record");
            if let Err(err) = self.register_type(sub, namespace) {
                warn!(ty = info.name(), namespace, %err, "nested registration failed, rolling back");
                self.descriptors.remove(&key);
                return Err(err);
            }
        }

        let verdict = match self.descriptors.get(&key) {
            Some(descriptor) => (self.validator)(self, descriptor),
            None => Ok(()),
        };
        if let Err(source) = verdict {
            warn!(ty = info.name(), namespace, error = %source, "validation rejected descriptor");
            self.descriptors.remove(&key);
            return Err(Error::ValidationFailed {
                name: info.name(),
                source,
            });
        }

        if let Some(descriptor) = self.descriptors.get_mut(&key) {
            descriptor.mark_complete();
            debug!(
                ty = info.name(),
                namespace,
                fields = descriptor.fields().len(),
                "descriptor registered"
            );
        }
        Ok(())
    }

    /// Cached descriptor for the type denoted by `src` in the default namespace.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInputKind`] or [`Error::NotRegistered`].
    pub fn lookup<S: Source + ?Sized>(&self, src: &S) -> Result<&TypeDescriptor> {
        self.lookup_in(src, &self.namespace)
    }

    /// [`lookup`](Self::lookup) under an explicit namespace.
    pub fn lookup_in<S: Source + ?Sized>(&self, src: &S, namespace: &str) -> Result<&TypeDescriptor> {
        let info = resolve(src)?;
        self.descriptors
            .get(&DescriptorKey::new(info, namespace))
            .ok_or_else(|| Error::NotRegistered {
                name: info.name(),
                namespace: namespace.to_string(),
            })
    }

    /// Mutable access to a cached descriptor.
    ///
    /// Only the attribute bag can change, and only by adding keys.
    pub fn lookup_mut<S: Source + ?Sized>(&mut self, src: &S) -> Result<&mut TypeDescriptor> {
        let info = resolve(src)?;
        let key = DescriptorKey::new(info, &self.namespace);
        self.descriptors
            .get_mut(&key)
            .ok_or_else(|| Error::NotRegistered {
                name: info.name(),
                namespace: key.namespace.clone(),
            })
    }

    /// Reader over the record behind `src`.
    ///
    /// # Errors
    ///
    /// Lookup errors, or [`Error::NotAnInstance`] for a bare type token.
    pub fn new_reader<'a, S: Source + ?Sized>(&'a self, src: &'a S) -> Result<Reader<'a>> {
        let descriptor = self.lookup(src)?;
        let record = src.as_record().ok_or(Error::NotAnInstance {
            name: descriptor.type_info().name(),
        })?;
        Ok(Reader::new(descriptor, record))
    }

    /// Writer over the record behind `dst`.
    ///
    /// `dst` must be an exclusive borrow (`&mut T`, `&mut Box<T>`). Owned
    /// records, shared pointers and type tokens are rejected with
    /// [`Error::NotWritable`].
    pub fn new_writer<'a, W: Writable<'a>>(&'a self, dst: W) -> Result<Writer<'a>> {
        let descriptor = self.lookup(&dst)?;
        let record = dst.into_record_mut().ok_or(Error::NotWritable {
            name: descriptor.type_info().name(),
        })?;
        Ok(Writer::new(descriptor, record))
    }
}

impl fmt::Debug for DescriptorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorCache")
            .field("namespace", &self.namespace)
            .field("descriptors", &self.descriptors.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{FieldDef, Kind, Typed};

    // Hand-written shapes; the derive-based tests live under `tests/`.

    struct Leaf;
    struct Branch;
    struct Cyclic;

    impl Typed for Leaf {
        fn type_info() -> TypeInfo {
            TypeInfo::record::<Self>(|| {
                vec![FieldDef {
                    name: "value",
                    public: true,
                    tags: &[],
                    ty: <u32 as Typed>::type_info,
                }]
            })
        }
    }

    impl Typed for Branch {
        fn type_info() -> TypeInfo {
            TypeInfo::record::<Self>(|| {
                vec![
                    FieldDef {
                        name: "leaf",
                        public: true,
                        tags: &[],
                        ty: <Leaf as Typed>::type_info,
                    },
                    FieldDef {
                        name: "hidden",
                        public: true,
                        tags: &[("test", "-")],
                        ty: <Option<Leaf> as Typed>::type_info,
                    },
                ]
            })
        }
    }

    impl Typed for Cyclic {
        fn type_info() -> TypeInfo {
            TypeInfo::record::<Self>(|| {
                vec![FieldDef {
                    name: "next",
                    public: true,
                    tags: &[],
                    ty: <Option<Box<Cyclic>> as Typed>::type_info,
                }]
            })
        }
    }

    fn leaf() -> TypeInfo {
        TypeInfo::of::<Leaf>()
    }

    fn branch() -> TypeInfo {
        TypeInfo::of::<Branch>()
    }

    fn cyclic() -> TypeInfo {
        TypeInfo::of::<Cyclic>()
    }

    #[test]
    fn register_and_lookup() {
        let mut cache = DescriptorCache::new("test");
        cache.register(&branch()).unwrap();

        assert_eq!(cache.len(), 2);
        let desc = cache.lookup(&branch()).unwrap();
        assert!(desc.is_complete());
        assert_eq!(desc.field_names(), ["leaf"]);
        assert!(cache.lookup(&leaf()).unwrap().is_complete());
    }

    #[test]
    fn register_idempotent() {
        let mut cache = DescriptorCache::new("test");
        cache.register(&leaf()).unwrap();
        cache.register(&leaf()).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cyclic_type_terminates() {
        let mut cache = DescriptorCache::new("test");
        cache.register(&cyclic()).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup(&cyclic()).unwrap().is_complete());
    }

    #[test]
    fn lookup_unregistered() {
        let cache = DescriptorCache::new("test");
        let err = cache.lookup(&leaf()).unwrap_err();
        assert!(matches!(err, Error::NotRegistered { .. }));
        assert!(err.to_string().contains("'test'"));
    }

    #[test]
    fn rejects_non_record_input() {
        let mut cache = DescriptorCache::new("test");
        let err = cache.register("test").unwrap_err();
        assert!(matches!(err, Error::InvalidInputKind { kind: Kind::String }));
        assert!(cache.is_empty());
    }

    #[test]
    fn validation_failure_rolls_back_top_level_only() {
        let mut cache = DescriptorCache::new("test").with_validator(|_, desc| {
            if desc.type_info() == branch() {
                Err("branches are not allowed".into())
            } else {
                Ok(())
            }
        });

        let err = cache.register(&branch()).unwrap_err();
        assert!(matches!(err, Error::ValidationFailed { .. }));
        assert!(err.to_string().contains("branches are not allowed"));

        assert!(!cache.contains(&branch()));
        // Committed before the failure; kept.
        assert!(cache.lookup(&leaf()).unwrap().is_complete());
    }

    #[test]
    fn nested_failure_removes_parent() {
        let mut cache = DescriptorCache::new("test").with_validator(|_, desc| {
            if desc.type_info() == leaf() {
                Err("no leaves".into())
            } else {
                Ok(())
            }
        });

        assert!(cache.register(&branch()).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn validator_runs_once_per_new_type() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let mut cache = DescriptorCache::new("test").with_validator(move |_, _| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        });

        cache.register(&branch()).unwrap();
        cache.register(&branch()).unwrap();
        cache.register(&leaf()).unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn validator_runs_once_for_self_referential_type() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let mut cache = DescriptorCache::new("test").with_validator(move |_, _| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        });

        cache.register(&cyclic()).unwrap();
        cache.register(&TypeInfo::of::<Box<Cyclic>>()).unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn set_validator_affects_later_registrations() {
        let mut cache = DescriptorCache::new("test");
        cache.register(&leaf()).unwrap();

        cache.set_validator(|_, _| Err("closed".into()));
        assert!(cache.register(&branch()).is_err());
        assert!(cache.contains(&leaf()));
    }

    #[test]
    fn namespaces_are_independent() {
        let mut cache = DescriptorCache::new("test");
        cache.register(&branch()).unwrap();
        cache.register_in(&branch(), "json").unwrap();

        assert_eq!(cache.len(), 4);
        assert_eq!(cache.lookup(&branch()).unwrap().field_names(), ["leaf"]);
        assert_eq!(
            cache.lookup_in(&branch(), "json").unwrap().field_names(),
            ["leaf", "hidden"]
        );
        assert!(cache.lookup_in(&cyclic(), "json").is_err());
    }

    #[test]
    fn validator_sees_incomplete_self() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = seen.clone();
        let mut cache = DescriptorCache::new("test").with_validator(move |cache, desc| {
            let current = cache.lookup(&desc.type_info())?;
            if let Ok(mut log) = log.lock() {
                log.push(current.is_complete());
            }
            Ok(())
        });

        cache.register(&cyclic()).unwrap();
        assert_eq!(*seen.lock().unwrap(), [false]);
    }

    #[test]
    fn attributes_via_lookup_mut() {
        let mut cache = DescriptorCache::new("test");
        cache.register(&leaf()).unwrap();

        let desc = cache.lookup_mut(&leaf()).unwrap();
        desc.insert_attr("weight", 5u32).unwrap();
        assert!(desc.insert_attr("weight", 6u32).is_err());
        assert_eq!(cache.lookup(&leaf()).unwrap().get_attr::<u32>("weight"), Some(&5));
    }

    #[test]
    fn reader_requires_instance() {
        let mut cache = DescriptorCache::new("test");
        cache.register(&leaf()).unwrap();
        let token = leaf();
        let err = cache.new_reader(&token).err().unwrap();
        assert!(matches!(err, Error::NotAnInstance { .. }));
    }

    #[test]
    #[should_panic(expected = "fieldtag:")]
    fn register_or_panic_panics() {
        let mut cache = DescriptorCache::new("test");
        cache.register_or_panic("seven");
    }

    #[test]
    fn debug_shows_size() {
        let cache = DescriptorCache::new("test");
        assert!(format!("{cache:?}").contains("\"test\""));
    }
}
