//! `#[derive(CommandOptions)]` implementation.
//!
//! # Generated code
//!
//! ```rust,ignore
//! impl CommandOptions for BanArgs {
//!     fn options() -> Vec<CommandOption> {
//!         vec![option_schema::<User>("user", Some("Who to ban"), false, false), ...]
//!     }
//!
//!     fn from_options(options: &ResolvedOptions<'_>) -> Result<Self, OptionError> {
//!         Ok(Self { user: options.get::<User>("user")?, ... })
//!     }
//! }
//! ```

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Expr, Field, Fields, LitStr, Token, spanned::Spanned};

use crate::attr::{crate_path, doc_summary};

// ============================================================================
// Attribute structures
// ============================================================================

/// Per-field `#[option(…)]` settings.
#[derive(Default)]
struct OptionAttrs {
    description: Option<String>,
    rename: Option<String>,
    default: Option<Option<Expr>>,
    autocomplete: bool,
}

fn parse_field_attrs(field: &Field) -> syn::Result<OptionAttrs> {
    let mut result = OptionAttrs::default();

    for attr in &field.attrs {
        if !attr.path().is_ident("option") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("description") {
                result.description = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("rename") {
                result.rename = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("default") {
                if meta.input.peek(Token![=]) {
                    result.default = Some(Some(meta.value()?.parse::<Expr>()?));
                } else {
                    result.default = Some(None);
                }
            } else if meta.path.is_ident("autocomplete") {
                result.autocomplete = true;
            } else {
                return Err(meta.error(
                    "unknown option attribute, expected one of: description, rename, default, autocomplete",
                ));
            }
            Ok(())
        })?;
    }

    if result.description.is_none() {
        result.description = doc_summary(&field.attrs);
    }
    Ok(result)
}

// ============================================================================
// Entry point
// ============================================================================

pub fn derive_command_options(input: &DeriveInput) -> syn::Result<TokenStream> {
    let krate = crate_path(&input.attrs)?;
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            Fields::Unit => {
                return Ok(quote! {
                    impl #krate::options::CommandOptions for #name {
                        fn options() -> ::std::vec::Vec<#krate::__private::CommandOption> {
                            ::std::vec::Vec::new()
                        }

                        fn from_options(
                            _: &#krate::options::ResolvedOptions<'_>,
                        ) -> ::std::result::Result<Self, #krate::error::OptionError> {
                            ::std::result::Result::Ok(Self)
                        }
                    }
                });
            }
            Fields::Unnamed(_) => {
                return Err(syn::Error::new(
                    input.span(),
                    "CommandOptions requires named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "CommandOptions can only be derived for structs",
            ));
        }
    };

    let mut schemas = Vec::with_capacity(fields.len());
    let mut bindings = Vec::with_capacity(fields.len());

    for field in fields {
        let attrs = parse_field_attrs(field)?;
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let ty = &field.ty;
        let option_name = attrs
            .rename
            .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_owned());

        let description = match &attrs.description {
            Some(text) => quote!(::std::option::Option::Some(#text)),
            None => quote!(::std::option::Option::None),
        };
        let has_default = attrs.default.is_some();
        let autocomplete = attrs.autocomplete;
        schemas.push(quote! {
            #krate::options::option_schema::<#ty>(#option_name, #description, #has_default, #autocomplete)
        });

        let value = match attrs.default {
            None => quote!(options.get::<#ty>(#option_name)?),
            Some(None) => quote! {
                options.get_or::<#ty>(#option_name, ::std::default::Default::default)?
            },
            Some(Some(expr)) => quote!(options.get_or::<#ty>(#option_name, || #expr)?),
        };
        bindings.push(quote!(#ident: #value));
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #krate::options::CommandOptions for #name #ty_generics #where_clause {
            fn options() -> ::std::vec::Vec<#krate::__private::CommandOption> {
                ::std::vec![#(#schemas),*]
            }

            fn from_options(
                options: &#krate::options::ResolvedOptions<'_>,
            ) -> ::std::result::Result<Self, #krate::error::OptionError> {
                ::std::result::Result::Ok(Self {
                    #(#bindings,)*
                })
            }
        }
    })
}
