//! # Tagged Record Descriptors (fieldtag)
//!
//! Derives reusable descriptions of struct fields: which fields are accessible,
//! their tags under a chosen namespace, and the key/element types of container
//! fields. Descriptions are cached per `(type, tag namespace)` and drive generic
//! field readers and writers.
//!
//! ## Design
//!
//! Rust has no runtime struct reflection, so `#[derive(Record)]` emits a static
//! field table. The [`DescriptorCache`] turns that table into a
//! [`TypeDescriptor`] and walks nested record types:
//!
//! ```text
//! register(User)
//!   ├─ build TypeDescriptor(User)        complete = false
//!   ├─ insert into cache                 (stops cycles: User → Vec<Box<User>>)
//!   ├─ register nested records           Address, Vec<Box<User>> → User (cached)
//!   ├─ run validator                     error → remove User, propagate
//!   └─ complete = true
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use fieldtag::{DescriptorCache, Record, TypeInfo};
//!
//! #[derive(Record)]
//! pub struct User {
//!     #[tag(json = "name")]
//!     pub name: String,
//!     #[tag(json = ",omitempty")]
//!     pub age: u32,
//!     #[tag(json = "-")]
//!     pub password: String,
//!     pub friends: Vec<Box<User>>,
//! }
//!
//! let mut cache = DescriptorCache::new("json");
//! cache.register(&TypeInfo::of::<User>())?;
//!
//! let user = User { /* ... */ };
//! for field in cache.new_reader(&user)?.fields() {
//!     println!("{} = {:?}", field.label(), field.value());
//! }
//! ```

// Lets `#[derive(Record)]` output (which names `::fieldtag`) expand inside this crate.
extern crate self as fieldtag;

pub mod access;
pub mod cache;
pub mod descriptor;
pub mod error;
pub mod plugin;
pub mod shape;
pub mod source;
pub mod tag;

pub use access::{FieldReader, FieldWriter, Reader, Record, Writer};
pub use cache::{DescriptorCache, Validator};
pub use descriptor::{FieldDescriptor, TypeDescriptor};
pub use error::{BoxError, Error, Result};
pub use fieldtag_macro::Record;
pub use shape::{FieldDef, Kind, Shape, TypeInfo, Typed};
pub use source::{resolve, Source, Writable};
pub use tag::{TagMetadata, EXCLUDE_LABEL, TAG_DELIMITER};
