//! Side-effect free request shaping: bind identity and attribute list repair.

use std::borrow::Cow;

use crate::filter::{self, FilterError};
use crate::ldap_protocol::SearchRequest;

/// Bind DNs are compared case-insensitively downstream; the original case is dropped.
pub fn canonical_bind_dn(bind_dn: &str) -> String {
    bind_dn.to_lowercase()
}

/// Split attribute entries that a client sent comma-joined (`"cn,mail,uid"`).
///
/// Pieces are trimmed and empty pieces dropped; everything else keeps its
/// position. When no entry contains a comma the input is handed back borrowed.
pub fn normalize_attributes(attributes: &[String]) -> Cow<'_, [String]> {
    if !attributes.iter().any(|attr| attr.contains(',')) {
        return Cow::Borrowed(attributes);
    }

    let mut result = Vec::with_capacity(attributes.len());
    for attr in attributes {
        if attr.contains(',') {
            result.extend(
                attr.split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string),
            );
        } else {
            result.push(attr.clone());
        }
    }
    Cow::Owned(result)
}

/// Outcome of the pure part of request construction.
#[derive(Debug, Clone)]
pub struct NormalizedSearch {
    pub bind_dn: String,
    pub search: SearchRequest,
    /// Object class lookup result; `Err` is turned into an empty class by the caller.
    pub object_class: Result<String, FilterError>,
    pub attributes_repaired: bool,
}

/// Lower-case the bind DN, look up the filter object class and produce an owned
/// copy of the search with a repaired attribute list. The caller's request is not modified.
pub fn normalize_search(bind_dn: &str, raw: &SearchRequest) -> NormalizedSearch {
    let object_class = filter::filter_object_class(&raw.filter);
    let mut search = raw.clone();
    let attributes_repaired = match normalize_attributes(&raw.attributes) {
        Cow::Owned(attributes) => {
            search.attributes = attributes;
            true
        }
        Cow::Borrowed(_) => false,
    };
    NormalizedSearch {
        bind_dn: canonical_bind_dn(bind_dn),
        search,
        object_class,
        attributes_repaired,
    }
}
