//! # quorum-macros
//!
//! `#[bridge_api(namespace = "...")]` marks a trait as a bridge surface.
//!
//! The macro does not generate code. It checks the trait-level and
//! method-level markers with the same parser the contract generator uses,
//! reports problems as compile errors at the offending attribute, and strips
//! the inert `#[bridge(...)]` method markers so the trait compiles as
//! written. The stable-id table itself is produced by the runtime crate's
//! build script.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use quorum_contract::markers::{is_marker, ApiMarker, MethodMarker, METHOD_MARKER};
use syn::{parse_macro_input, ItemTrait, TraitItem};

#[proc_macro_attribute]
pub fn bridge_api(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut marker = ApiMarker::default();
    let parser = syn::meta::parser(|meta| marker.parse_meta(meta));
    parse_macro_input!(attr with parser);

    let mut item_trait = parse_macro_input!(item as ItemTrait);
    let mut errors = Vec::new();

    if marker.namespace.is_empty() {
        errors.push(syn::Error::new(
            Span::call_site(),
            "bridge_api requires `namespace = \"...\"`",
        ));
    }

    for trait_item in &mut item_trait.items {
        let TraitItem::Fn(method) = trait_item else {
            continue;
        };
        let mut markers = 0;
        method.attrs.retain(|attr| {
            if !is_marker(attr, METHOD_MARKER) {
                return true;
            }
            markers += 1;
            let checked = MethodMarker::from_attribute(attr).and_then(|parsed| {
                parsed
                    .validate()
                    .map_err(|message| syn::Error::new_spanned(attr, message))
            });
            if let Err(err) = checked {
                errors.push(err);
            }
            false
        });
        if markers > 1 {
            errors.push(syn::Error::new_spanned(
                &method.sig.ident,
                "a bridged method takes a single #[bridge] marker",
            ));
        }
    }

    let errors = errors.iter().map(syn::Error::to_compile_error);
    quote!(
        #item_trait
        #(#errors)*
    )
    .into()
}
