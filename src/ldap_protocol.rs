// LDAP search request model as handed over by the wire codec
// Only the SearchRequest part of RFC 4511 is modelled here

use anyhow::{bail, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base_object: String,
    pub scope: SearchScope,
    pub deref_aliases: i32,
    pub size_limit: i32,
    pub time_limit: i32,
    pub types_only: bool,
    pub filter: String,
    pub attributes: Vec<String>,
}

impl SearchRequest {
    /// Request with no size/time limits and no attribute selection.
    pub fn new(base_object: impl Into<String>, scope: SearchScope, filter: impl Into<String>) -> Self {
        Self {
            base_object: base_object.into(),
            scope,
            deref_aliases: 0,
            size_limit: 0,
            time_limit: 0,
            types_only: false,
            filter: filter.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_limits(mut self, size_limit: i32, time_limit: i32) -> Self {
        self.size_limit = size_limit;
        self.time_limit = time_limit;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    BaseObject = 0,
    SingleLevel = 1,
    WholeSubtree = 2,
}

impl SearchScope {
    /// Human-readable scope name used in span descriptions and log fields.
    pub fn name(self) -> &'static str {
        match self {
            SearchScope::BaseObject => "Base Object",
            SearchScope::SingleLevel => "Single Level",
            SearchScope::WholeSubtree => "Whole Subtree",
        }
    }

    /// Short form accepted on the command line: base, one, sub, or the
    /// numeric wire value.
    pub fn from_short_name(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "base" => Ok(SearchScope::BaseObject),
            "one" | "onelevel" => Ok(SearchScope::SingleLevel),
            "sub" | "subtree" => Ok(SearchScope::WholeSubtree),
            other => match other.parse::<u8>() {
                Ok(value) => SearchScope::try_from(value),
                Err(_) => bail!("Invalid search scope: {}", s),
            },
        }
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for SearchScope {
    type Error = anyhow::Error;
    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SearchScope::BaseObject),
            1 => Ok(SearchScope::SingleLevel),
            2 => Ok(SearchScope::WholeSubtree),
            _ => bail!("Invalid search scope: {}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_scope_try_from() {
        assert_eq!(SearchScope::try_from(0).unwrap(), SearchScope::BaseObject);
        assert_eq!(SearchScope::try_from(1).unwrap(), SearchScope::SingleLevel);
        assert_eq!(SearchScope::try_from(2).unwrap(), SearchScope::WholeSubtree);
        assert!(SearchScope::try_from(3).is_err());
        assert!(SearchScope::try_from(255).is_err());
    }

    #[test]
    fn test_scope_names() {
        assert_eq!(SearchScope::BaseObject.name(), "Base Object");
        assert_eq!(SearchScope::SingleLevel.name(), "Single Level");
        assert_eq!(SearchScope::WholeSubtree.to_string(), "Whole Subtree");
    }

    #[test]
    fn test_scope_from_short_name() {
        assert_eq!(SearchScope::from_short_name("base").unwrap(), SearchScope::BaseObject);
        assert_eq!(SearchScope::from_short_name("ONE").unwrap(), SearchScope::SingleLevel);
        assert_eq!(SearchScope::from_short_name("sub").unwrap(), SearchScope::WholeSubtree);
        assert!(SearchScope::from_short_name("deep").is_err());
    }

    #[test]
    fn test_scope_from_numeric_name() {
        assert_eq!(SearchScope::from_short_name("0").unwrap(), SearchScope::BaseObject);
        assert_eq!(SearchScope::from_short_name("2").unwrap(), SearchScope::WholeSubtree);
        assert!(SearchScope::from_short_name("3").is_err());
        assert!(SearchScope::from_short_name("-1").is_err());
    }

    #[test]
    fn test_search_request_builder() {
        let req = SearchRequest::new("dc=example,dc=com", SearchScope::WholeSubtree, "(uid=bob)")
            .with_attributes(["cn", "mail"])
            .with_limits(10, 5);
        assert_eq!(req.base_object, "dc=example,dc=com");
        assert_eq!(req.attributes, vec!["cn".to_string(), "mail".to_string()]);
        assert_eq!(req.size_limit, 10);
        assert_eq!(req.time_limit, 5);
        assert!(!req.types_only);
    }
}
