//! Procedural macros for the Quill interactions framework.
//!
//! This crate provides:
//!
//! - `#[derive(CommandOptions)]` - Declares the options of a slash command
//!   and binds the values sent with each invocation
//! - `#[derive(OptionChoice)]` - Turns a unit enum into a string option with
//!   fixed choices
//!
//! Both are re-exported by `quill-framework`; depend on that crate instead
//! of this one.
//!
//! # CommandOptions
//!
//! ```rust,ignore
//! use quill::prelude::*;
//!
//! #[derive(CommandOptions)]
//! struct BanArgs {
//!     /// Who to ban
//!     user: User,
//!     #[option(description = "Why they are banned")]
//!     reason: Option<String>,
//!     #[option(rename = "delete-days", default = 0)]
//!     delete_days: i64,
//!     #[option(autocomplete)]
//!     rule: String,
//! }
//! ```
//!
//! # OptionChoice
//!
//! ```rust,ignore
//! #[derive(OptionChoice)]
//! enum Color {
//!     Red,
//!     #[choice(name = "Dark blue", value = "navy")]
//!     DarkBlue,
//! }
//! ```

mod attr;
mod choice;
mod options;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `CommandOptions` for a struct with named fields.
///
/// Every field becomes one option, in declaration order. Field types must
/// implement `OptionValue`; `Option<T>` fields are optional.
///
/// # Field attributes
///
/// - `#[option(description = "...")]` - Option description. Falls back to
///   the field's doc comment, then to a description derived from the type
/// - `#[option(rename = "...")]` - Option name (default: the field name)
/// - `#[option(default)]` / `#[option(default = expr)]` - Makes the option
///   optional and binds `Default::default()` or `expr` when it is not sent
/// - `#[option(autocomplete)]` - Marks the option for autocompletion
///
/// # Container attributes
///
/// - `#[quill(crate = "...")]` - Path of the framework crate
///   (default: `::quill_framework`)
#[proc_macro_derive(CommandOptions, attributes(option, quill))]
pub fn derive_command_options(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match options::derive_command_options(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derives `OptionValue` for a unit-only enum, as a string option whose
/// choices are the variants.
///
/// # Variant attributes
///
/// - `#[choice(name = "...")]` - Name shown to the user (default: the
///   variant name)
/// - `#[choice(value = "...")]` - Value sent back (default: the variant name
///   in snake case)
#[proc_macro_derive(OptionChoice, attributes(choice, quill))]
pub fn derive_option_choice(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match choice::derive_option_choice(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
