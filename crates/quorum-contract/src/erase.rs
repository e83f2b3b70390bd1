//! Type-name erasure.
//!
//! Bridged methods are matched on erased names, so erasure has to be
//! stable and independent of how a signature spells a type:
//! - references and lifetimes are dropped
//! - `Arc`, `Box`, `Rc`, `Result` and `BridgeResult` are transparent
//! - `dyn A + B` and `impl A + B` erase to `A`
//! - any other path erases to its last segment without generic arguments
//! - the unit type erases to `()`

use quote::ToTokens;
use syn::punctuated::Punctuated;
use syn::token::Plus;
use syn::{GenericArgument, PathArguments, ReturnType, Type, TypeParamBound};

const TRANSPARENT: &[&str] = &["Arc", "Box", "Rc", "Result", "BridgeResult"];

/// Erased name of a parameter or return type.
pub fn erase_type(ty: &Type) -> String {
    match ty {
        Type::Reference(reference) => erase_type(&reference.elem),
        Type::Paren(paren) => erase_type(&paren.elem),
        Type::Group(group) => erase_type(&group.elem),
        Type::Path(path) => {
            let Some(last) = path.path.segments.last() else {
                return "_".to_string();
            };
            let ident = last.ident.to_string();
            if TRANSPARENT.contains(&ident.as_str()) {
                if let Some(inner) = first_type_argument(&last.arguments) {
                    return erase_type(inner);
                }
            }
            ident
        }
        Type::TraitObject(object) => {
            first_trait_bound(&object.bounds).unwrap_or_else(|| "dyn".to_string())
        }
        Type::ImplTrait(implemented) => {
            first_trait_bound(&implemented.bounds).unwrap_or_else(|| "impl".to_string())
        }
        Type::Tuple(tuple) if tuple.elems.is_empty() => "()".to_string(),
        Type::Slice(slice) => format!("[{}]", erase_type(&slice.elem)),
        Type::Array(array) => format!("[{}]", erase_type(&array.elem)),
        other => other.to_token_stream().to_string().replace(' ', ""),
    }
}

/// Erased name of a method's return type; `()` when none is written.
pub fn erase_return(output: &ReturnType) -> String {
    match output {
        ReturnType::Default => "()".to_string(),
        ReturnType::Type(_, ty) => erase_type(ty),
    }
}

/// Upper-case token used in alias constant names, e.g. `OwnerRef` -> `OWNERREF`.
pub fn alias_token(erased: &str) -> String {
    let token: String = erased
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    match token.trim_matches('_') {
        "" => "UNIT".to_string(),
        trimmed => trimmed.to_string(),
    }
}

fn first_type_argument(arguments: &PathArguments) -> Option<&Type> {
    let PathArguments::AngleBracketed(generics) = arguments else {
        return None;
    };
    generics.args.iter().find_map(|argument| match argument {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}

fn first_trait_bound(bounds: &Punctuated<TypeParamBound, Plus>) -> Option<String> {
    bounds.iter().find_map(|bound| match bound {
        TypeParamBound::Trait(bound) => bound
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        _ => None,
    })
}
