//! Parsing of the `#[bridge_api]` and `#[bridge]` markers.
//!
//! The attribute macro and the build-time generator share these parsers so
//! that a marker the compiler accepts is a marker the generator understands.

use syn::meta::ParseNestedMeta;
use syn::{Attribute, LitInt, LitStr, Meta};

/// Name of the trait-level marker.
pub const API_MARKER: &str = "bridge_api";

/// Name of the method-level marker.
pub const METHOD_MARKER: &str = "bridge";

/// How a derived stable id encodes the parameter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignaturePolicy {
    /// `ns#name(T1,T2)`
    #[default]
    Full,
    /// `ns#name/arity`
    ArityOnly,
}

/// Whether a declaring name may be overloaded inside its namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverloadPolicy {
    #[default]
    Allow,
    Error,
}

/// Options of `#[bridge_api(namespace = "...")]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiMarker {
    pub namespace: String,
}

impl ApiMarker {
    /// Consume one `key = value` item of the marker.
    pub fn parse_meta(&mut self, meta: ParseNestedMeta<'_>) -> syn::Result<()> {
        if meta.path.is_ident("namespace") {
            let lit: LitStr = meta.value()?.parse()?;
            let namespace = lit.value().trim().to_string();
            if namespace.is_empty() {
                return Err(meta.error("bridge namespace must not be blank"));
            }
            self.namespace = namespace;
            Ok(())
        } else {
            Err(meta.error("unsupported bridge_api option, expected `namespace`"))
        }
    }

    /// Parse a full `#[bridge_api(...)]` attribute.
    pub fn from_attribute(attr: &Attribute) -> syn::Result<Self> {
        let mut marker = Self::default();
        attr.parse_nested_meta(|meta| marker.parse_meta(meta))?;
        if marker.namespace.is_empty() {
            return Err(syn::Error::new_spanned(
                attr,
                "bridge_api requires `namespace = \"...\"`",
            ));
        }
        Ok(marker)
    }
}

/// Options of `#[bridge(...)]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMarker {
    pub stable_id: Option<String>,
    pub overload_key: Option<String>,
    pub signature: SignaturePolicy,
    pub overloads: OverloadPolicy,
    pub since: u32,
}

impl Default for MethodMarker {
    fn default() -> Self {
        Self {
            stable_id: None,
            overload_key: None,
            signature: SignaturePolicy::Full,
            overloads: OverloadPolicy::Allow,
            since: 1,
        }
    }
}

impl MethodMarker {
    /// Parse a `#[bridge]` or `#[bridge(...)]` attribute.
    ///
    /// A blank `stable_id` is kept as-is so [`MethodMarker::validate`] can
    /// report it with the method's location.
    pub fn from_attribute(attr: &Attribute) -> syn::Result<Self> {
        let mut marker = Self::default();
        if matches!(attr.meta, Meta::Path(_)) {
            return Ok(marker);
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("stable_id") {
                let lit: LitStr = meta.value()?.parse()?;
                marker.stable_id = Some(lit.value());
            } else if meta.path.is_ident("overload_key") {
                let lit: LitStr = meta.value()?.parse()?;
                let key = lit.value().trim().to_string();
                marker.overload_key = (!key.is_empty()).then_some(key);
            } else if meta.path.is_ident("signature") {
                let lit: LitStr = meta.value()?.parse()?;
                marker.signature = match lit.value().as_str() {
                    "full" => SignaturePolicy::Full,
                    "arity_only" => SignaturePolicy::ArityOnly,
                    _ => return Err(meta.error("signature must be \"full\" or \"arity_only\"")),
                };
            } else if meta.path.is_ident("overloads") {
                let lit: LitStr = meta.value()?.parse()?;
                marker.overloads = match lit.value().as_str() {
                    "allow" => OverloadPolicy::Allow,
                    "error" => OverloadPolicy::Error,
                    _ => return Err(meta.error("overloads must be \"allow\" or \"error\"")),
                };
            } else if meta.path.is_ident("since") {
                let lit: LitInt = meta.value()?.parse()?;
                marker.since = lit.base10_parse()?;
            } else {
                return Err(meta.error(
                    "unsupported bridge option, expected one of \
                     `stable_id`, `overload_key`, `signature`, `overloads`, `since`",
                ));
            }
            Ok(())
        })?;

        Ok(marker)
    }

    /// Semantic checks that do not depend on sibling methods.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(id) = &self.stable_id {
            if id.trim().is_empty() {
                return Err("`stable_id` must not be blank".to_string());
            }
        }
        if self.since == 0 {
            return Err("`since` must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Whether `attr` is the marker called `name`, in any path form
/// (`bridge`, `quorum::bridge`, ...).
pub fn is_marker(attr: &Attribute, name: &str) -> bool {
    attr.path()
        .segments
        .last()
        .is_some_and(|segment| segment.ident == name)
}
