//! Attribute helpers shared by both derives.

use syn::{Attribute, Expr, Lit, LitStr, Meta, Path};

/// Path of the framework crate, from `#[quill(crate = "...")]`.
pub fn crate_path(attrs: &[Attribute]) -> syn::Result<Path> {
    let mut path: Option<Path> = None;

    for attr in attrs {
        if !attr.path().is_ident("quill") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("crate") {
                path = Some(meta.value()?.parse::<LitStr>()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unknown quill attribute, expected `crate`"))
            }
        })?;
    }

    Ok(path.unwrap_or_else(|| syn::parse_quote!(::quill_framework)))
}

/// First paragraph of the item's doc comment, joined into one line.
pub fn doc_summary(attrs: &[Attribute]) -> Option<String> {
    let mut lines = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("doc") {
            continue;
        }
        let Meta::NameValue(nv) = &attr.meta else {
            continue;
        };
        let Expr::Lit(lit) = &nv.value else {
            continue;
        };
        let Lit::Str(text) = &lit.lit else {
            continue;
        };
        let line = text.value().trim().to_owned();
        if line.is_empty() {
            if !lines.is_empty() {
                break;
            }
            continue;
        }
        lines.push(line);
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}

/// `DarkBlue` -> `dark_blue`.
pub fn snake_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    for (i, c) in ident.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
