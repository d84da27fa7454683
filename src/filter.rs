//! Object class lookup on RFC 4515 string filters.
//!
//! Parsing is done by ldap3, which turns the string form into the BER filter
//! structure sent to backends; this module only walks that structure.

use ldap3::asn1::{Tag, TagClass};
use thiserror::Error;

// Filter CHOICE tags (RFC 4511 4.5.1)
const AND_FILTER: u64 = 0;
const OR_FILTER: u64 = 1;
const NOT_FILTER: u64 = 2;
const EQUALITY_MATCH: u64 = 3;

/// Nesting limit for `&`, `|` and `!`; filters arrive from untrusted clients.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("empty filter")]
    Empty,
    #[error("filter does not start with '('")]
    MissingOpenParen,
    #[error("filter nested too deeply")]
    TooDeep,
    #[error("invalid filter syntax")]
    Syntax,
}

/// Parse a string filter into its BER structure. The filter must be fully parenthesized.
pub fn parse(filter: &str) -> Result<Tag, FilterError> {
    if filter.is_empty() {
        return Err(FilterError::Empty);
    }
    if !filter.starts_with('(') {
        return Err(FilterError::MissingOpenParen);
    }
    // Parentheses inside values must be escaped as \28 / \29, so raw ones are structure.
    let mut depth = 0usize;
    for b in filter.bytes() {
        match b {
            b'(' => {
                depth += 1;
                if depth > MAX_DEPTH {
                    return Err(FilterError::TooDeep);
                }
            }
            b')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    ldap3::parse_filter(filter).map_err(|()| FilterError::Syntax)
}

/// Lower-cased object class the filter targets, or an empty string when the
/// filter is valid but does not constrain `objectClass`.
pub fn filter_object_class(filter: &str) -> Result<String, FilterError> {
    let parsed = parse(filter)?;
    Ok(object_class(&parsed).unwrap_or_default().to_lowercase())
}

/// Value of an `objectClass` equality match, searching through `&`, `|` and
/// `!`. With several candidates the last non-empty one wins.
fn object_class(tag: &Tag) -> Option<String> {
    match tag {
        Tag::Sequence(seq) if seq.class == TagClass::Context => match seq.id {
            AND_FILTER | OR_FILTER => seq
                .inner
                .iter()
                .filter_map(object_class)
                .filter(|oc| !oc.is_empty())
                .last(),
            EQUALITY_MATCH => match seq.inner.as_slice() {
                [Tag::OctetString(attr), Tag::OctetString(value)]
                    if attr.inner.eq_ignore_ascii_case(b"objectclass") =>
                {
                    Some(String::from_utf8_lossy(&value.inner).into_owned())
                }
                _ => None,
            },
            _ => None,
        },
        Tag::ExplicitTag(not) if not.class == TagClass::Context && not.id == NOT_FILTER => {
            object_class(&not.inner)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_filters() {
        for filter in [
            "(uid=bob)",
            "(objectClass=*)",
            "(&(objectClass=user)(|(uid=bob)(!(mail=x))))",
            "(cn=ab*cd*ef)",
            "(uidNumber>=1000)",
            "(cn~=bob)",
            "(cn:dn:caseExactMatch:=Fred)",
            "(&)",
        ] {
            assert!(parse(filter).is_ok(), "{} should parse", filter);
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("").unwrap_err(), FilterError::Empty);
        assert_eq!(parse("uid=bob").unwrap_err(), FilterError::MissingOpenParen);
        assert_eq!(parse("(uid=bob").unwrap_err(), FilterError::Syntax);
        assert_eq!(parse("(uid=bob))").unwrap_err(), FilterError::Syntax);
        assert_eq!(parse("(=bob)").unwrap_err(), FilterError::Syntax);
        assert_eq!(parse("(&(uid=bob)").unwrap_err(), FilterError::Syntax);
        assert_eq!(parse("(uid)").unwrap_err(), FilterError::Syntax);
    }

    #[test]
    fn test_parse_too_deep() {
        let depth = MAX_DEPTH + 2;
        let filter = format!("{}(uid=bob){}", "(!".repeat(depth), ")".repeat(depth));
        assert_eq!(parse(&filter).unwrap_err(), FilterError::TooDeep);
    }

    #[test]
    fn test_filter_object_class() {
        assert_eq!(filter_object_class("(objectClass=User)").unwrap(), "user");
        assert_eq!(filter_object_class("(objectclass=group)").unwrap(), "group");
        assert_eq!(
            filter_object_class("(&(objectClass=person)(|(objectClass=inetOrgPerson)(uid=bob)))").unwrap(),
            "inetorgperson"
        );
        assert_eq!(filter_object_class("(!(objectClass=computer))").unwrap(), "computer");
        assert_eq!(filter_object_class("(objectClass=\\55ser)").unwrap(), "user");
    }

    #[test]
    fn test_filter_object_class_last_non_empty_wins() {
        assert_eq!(
            filter_object_class("(|(objectClass=group)(objectClass=user)(uid=bob))").unwrap(),
            "user"
        );
        assert_eq!(filter_object_class("(&(objectClass=group)(objectClass=))").unwrap(), "group");
    }

    #[test]
    fn test_filter_object_class_none() {
        assert_eq!(filter_object_class("(uid=bob)").unwrap(), "");
        assert_eq!(filter_object_class("(objectClass=*)").unwrap(), "");
        assert_eq!(filter_object_class("(objectClass=us*)").unwrap(), "");
        assert_eq!(filter_object_class("(&)").unwrap(), "");
    }

    #[test]
    fn test_filter_object_class_errors() {
        assert_eq!(filter_object_class(""), Err(FilterError::Empty));
        assert_eq!(filter_object_class("(objectClass=user"), Err(FilterError::Syntax));
        assert_eq!(filter_object_class("objectClass=user"), Err(FilterError::MissingOpenParen));
    }
}
