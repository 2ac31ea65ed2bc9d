use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::spanned::Spanned;
use syn::{
    parse_quote, Data, DeriveInput, Fields, GenericParam, Generics, Ident, Index, LitStr, Member,
    Result, Type, Visibility,
};

use proc_macro_crate::{crate_name, FoundCrate};

/// One `namespace = "raw tag"` pair from a `#[tag(...)]` attribute.
struct TagAttr {
    namespace: Ident,
    raw: LitStr,
}

/// A struct field as seen by the derive.
struct FieldInput {
    /// `self.<member>` accessor (named or positional).
    member: Member,
    /// Declared name; tuple fields use their index.
    name: String,
    ty: Type,
    /// Only plain `pub` counts as externally accessible.
    public: bool,
    tags: Vec<TagAttr>,
}

// =============================================================================
// Attribute parsing
// =============================================================================

/// Collect every `#[tag(ns = "...", ...)]` on a field.
///
/// Multiple attributes are merged; naming a namespace twice on the same field
/// is an error since a field carries a single tag string per namespace.
fn parse_tag_attrs(attrs: &[syn::Attribute]) -> Result<Vec<TagAttr>> {
    let mut tags: Vec<TagAttr> = Vec::new();

    for attr in attrs.iter().filter(|a| a.path().is_ident("tag")) {
        attr.parse_nested_meta(|meta| {
            let namespace = meta.path.require_ident()?.clone();
            let raw: LitStr = meta.value()?.parse()?;

            if tags.iter().any(|t| t.namespace == namespace) {
                return Err(meta.error(format!(
                    "duplicate tag namespace `{}` on the same field",
                    namespace
                )));
            }

            tags.push(TagAttr { namespace, raw });
            Ok(())
        })?;
    }

    Ok(tags)
}

fn collect_fields(input: &DeriveInput) -> Result<Vec<FieldInput>> {
    let data = match &input.data {
        Data::Struct(data) => data,
        Data::Enum(e) => {
            return Err(syn::Error::new(
                e.enum_token.span(),
                "Record can only be derived for structs",
            ))
        }
        Data::Union(u) => {
            return Err(syn::Error::new(
                u.union_token.span(),
                "Record can only be derived for structs",
            ))
        }
    };

    let mut out = Vec::new();
    match &data.fields {
        Fields::Named(named) => {
            for field in &named.named {
                let Some(ident) = field.ident.clone() else {
                    return Err(syn::Error::new_spanned(field, "field must have a name"));
                };
                out.push(FieldInput {
                    name: ident.to_string(),
                    member: Member::Named(ident),
                    ty: field.ty.clone(),
                    public: matches!(field.vis, Visibility::Public(_)),
                    tags: parse_tag_attrs(&field.attrs)?,
                });
            }
        }
        Fields::Unnamed(unnamed) => {
            for (idx, field) in unnamed.unnamed.iter().enumerate() {
                out.push(FieldInput {
                    name: idx.to_string(),
                    member: Member::Unnamed(Index::from(idx)),
                    ty: field.ty.clone(),
                    public: matches!(field.vis, Visibility::Public(_)),
                    tags: parse_tag_attrs(&field.attrs)?,
                });
            }
        }
        Fields::Unit => {}
    }

    Ok(out)
}

/// Every type parameter must itself be describable.
fn add_typed_bounds(mut generics: Generics, krate: &TokenStream2) -> Generics {
    for param in &mut generics.params {
        if let GenericParam::Type(ty) = param {
            ty.bounds.push(parse_quote!(#krate::Typed));
        }
    }
    generics
}

// =============================================================================
// Crate path resolution
// =============================================================================

fn fieldtag_crate_path() -> TokenStream2 {
    match crate_name("fieldtag") {
        Ok(FoundCrate::Itself) => {
            quote!(::fieldtag)
        }
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Err(_) => quote!(::fieldtag),
    }
}

// =============================================================================
// Code generation
// =============================================================================

/// Generate the `FieldDef` table entries.
fn generate_field_defs(fields: &[FieldInput], krate: &TokenStream2) -> Vec<TokenStream2> {
    fields
        .iter()
        .map(|f| {
            let name = LitStr::new(&f.name, Span::call_site());
            let ty = &f.ty;
            let public = f.public;
            let tags = f.tags.iter().map(|t| {
                let ns = LitStr::new(&t.namespace.to_string(), t.namespace.span());
                let raw = &t.raw;
                quote!((#ns, #raw))
            });

            quote! {
                #krate::FieldDef {
                    name: #name,
                    public: #public,
                    tags: &[#(#tags),*],
                    ty: <#ty as #krate::Typed>::type_info,
                }
            }
        })
        .collect()
}

/// Expand `#[derive(Record)]`.
///
/// For
/// ```ignore
/// #[derive(Record)]
/// pub struct User {
///     #[tag(json = "id,omitempty")]
///     pub id: u64,
///     pub friends: Vec<Box<User>>,
/// }
/// ```
/// this generates `Typed`, `Record`, `Source` and `Writable` impls. Field positions are
/// declaration indices, so `field(0)` is `id` and `field(1)` is `friends`.
fn expand(input: &DeriveInput, krate: &TokenStream2) -> Result<TokenStream2> {
    let fields = collect_fields(input)?;
    let name = &input.ident;

    let generics = add_typed_bounds(input.generics.clone(), krate);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    // An owned record is never a writer target; only the impl needs the lifetime.
    let mut with_lifetime = generics.clone();
    with_lifetime.params.insert(0, parse_quote!('__fieldtag));
    let (writable_generics, _, _) = with_lifetime.split_for_impl();

    let defs = generate_field_defs(&fields, krate);
    let positions: Vec<usize> = (0..fields.len()).collect();
    let members: Vec<&Member> = fields.iter().map(|f| &f.member).collect();

    Ok(quote! {
        impl #impl_generics #krate::Typed for #name #ty_generics #where_clause {
            fn type_info() -> #krate::TypeInfo {
                #krate::TypeInfo::record::<Self>(<Self as #krate::Record>::fields)
            }
        }

        impl #impl_generics #krate::Record for #name #ty_generics #where_clause {
            fn fields() -> ::std::vec::Vec<#krate::FieldDef> {
                ::std::vec![#(#defs),*]
            }

            fn field(&self, position: usize) -> ::core::option::Option<&dyn ::core::any::Any> {
                match position {
                    #(#positions => ::core::option::Option::Some(&self.#members as &dyn ::core::any::Any),)*
                    _ => ::core::option::Option::None,
                }
            }

            fn field_mut(
                &mut self,
                position: usize,
            ) -> ::core::option::Option<&mut dyn ::core::any::Any> {
                match position {
                    #(#positions => ::core::option::Option::Some(&mut self.#members as &mut dyn ::core::any::Any),)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl #impl_generics #krate::Source for #name #ty_generics #where_clause {
            fn kind(&self) -> #krate::Kind {
                #krate::Kind::Record
            }

            fn record_type(&self) -> ::core::option::Option<#krate::TypeInfo> {
                ::core::option::Option::Some(<Self as #krate::Typed>::type_info())
            }

            fn as_record(&self) -> ::core::option::Option<&dyn #krate::Record> {
                ::core::option::Option::Some(self)
            }

            fn as_record_mut(&mut self) -> ::core::option::Option<&mut dyn #krate::Record> {
                ::core::option::Option::Some(self)
            }
        }

        impl #writable_generics #krate::Writable<'__fieldtag> for #name #ty_generics #where_clause {
            fn into_record_mut(
                self,
            ) -> ::core::option::Option<&'__fieldtag mut dyn #krate::Record> {
                ::core::option::Option::None
            }
        }
    })
}

// =============================================================================
// Entry point
// =============================================================================

/// Derives the field table used by the `fieldtag` descriptor cache.
///
/// Field tags are declared per namespace:
///
/// ```ignore
/// #[derive(Record)]
/// pub struct Item {
///     #[tag(json = "name", db = "item_name")]
///     pub name: String,
///     #[tag(json = "-")]
///     pub secret: String,
/// }
/// ```
#[proc_macro_derive(Record, attributes(tag))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    let krate = fieldtag_crate_path();

    match expand(&input, &krate) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
