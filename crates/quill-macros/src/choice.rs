//! `#[derive(OptionChoice)]` implementation.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, Variant, spanned::Spanned};

use crate::attr::{crate_path, snake_case};

struct Choice<'a> {
    variant: &'a Variant,
    name: String,
    value: String,
}

fn parse_variant(variant: &Variant) -> syn::Result<Choice<'_>> {
    if !matches!(variant.fields, Fields::Unit) {
        return Err(syn::Error::new(
            variant.span(),
            "OptionChoice variants cannot carry fields",
        ));
    }

    let ident = variant.ident.to_string();
    let mut name = None;
    let mut value = None;
    for attr in &variant.attrs {
        if !attr.path().is_ident("choice") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("value") {
                value = Some(meta.value()?.parse::<LitStr>()?.value());
            } else {
                return Err(meta.error("unknown choice attribute, expected `name` or `value`"));
            }
            Ok(())
        })?;
    }

    Ok(Choice {
        variant,
        value: value.unwrap_or_else(|| snake_case(&ident)),
        name: name.unwrap_or(ident),
    })
}

pub fn derive_option_choice(input: &DeriveInput) -> syn::Result<TokenStream> {
    let krate = crate_path(&input.attrs)?;
    let name = &input.ident;

    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new(
            input.span(),
            "OptionChoice can only be derived for enums",
        ));
    };
    if data.variants.is_empty() {
        return Err(syn::Error::new(
            input.span(),
            "OptionChoice needs at least one variant",
        ));
    }

    let choices = data
        .variants
        .iter()
        .map(parse_variant)
        .collect::<syn::Result<Vec<_>>>()?;

    let schema = choices.iter().map(|c| {
        let (label, value) = (&c.name, &c.value);
        quote!(#krate::__private::CommandChoice::new(#label, #value))
    });
    let arms = choices.iter().map(|c| {
        let (variant, value) = (&c.variant.ident, &c.value);
        quote!(::std::option::Option::Some(#value) => ::std::result::Result::Ok(Self::#variant))
    });

    Ok(quote! {
        impl #krate::options::OptionValue for #name {
            const KIND: #krate::__private::CommandOptionType =
                #krate::__private::CommandOptionType::String;

            fn choices() -> ::std::vec::Vec<#krate::__private::CommandChoice> {
                ::std::vec![#(#schema),*]
            }

            fn from_value(
                value: &#krate::__private::Value,
                _: &#krate::__private::ResolvedData,
            ) -> ::std::result::Result<Self, ::std::string::String> {
                match value.as_str() {
                    #(#arms,)*
                    ::std::option::Option::Some(other) => ::std::result::Result::Err(
                        ::std::format!("'{}' is not one of the offered choices", other),
                    ),
                    ::std::option::Option::None => ::std::result::Result::Err(
                        ::std::format!("expected a string, got {}", value),
                    ),
                }
            }
        }
    })
}
