//! Prefix to namespace URI lookup tables.
//!
//! [`NamespaceBindings`] is the mutable table callers fill in; [`NamespaceUnion`] layers two
//! contexts so that a primary table can override a fallback one.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::error::XPathError;

pub const XML_NS_PREFIX: &str = "xml";
pub const XML_NS_URI: &str = "http://www.w3.org/XML/1998/namespace";
pub const XMLNS_ATTRIBUTE: &str = "xmlns";
pub const XMLNS_ATTRIBUTE_NS_URI: &str = "http://www.w3.org/2000/xmlns/";
pub const DEFAULT_NS_PREFIX: &str = "";
pub const NULL_NS_URI: &str = "";

/// Read-only view used while evaluating expressions.
pub trait NamespaceContext: Send + Sync {
    /// Bound URI for `prefix`, or [`NULL_NS_URI`] when the prefix is unknown.
    fn namespace_uri(&self, prefix: &str) -> String;

    /// Some prefix bound to `namespace_uri`. Which one is returned when several match is
    /// unspecified.
    fn prefix(&self, namespace_uri: &str) -> Option<String>;

    /// Every prefix bound to `namespace_uri`, without duplicates.
    fn prefixes(&self, namespace_uri: &str) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceBindings {
    bindings: BTreeMap<String, String>,
}

impl NamespaceBindings {
    /// Creates a table holding only the reserved `xml`, `xmlns` and default bindings.
    pub fn new() -> Self {
        let mut bindings = BTreeMap::new();
        bindings.insert(XML_NS_PREFIX.to_owned(), XML_NS_URI.to_owned());
        bindings.insert(XMLNS_ATTRIBUTE.to_owned(), XMLNS_ATTRIBUTE_NS_URI.to_owned());
        bindings.insert(DEFAULT_NS_PREFIX.to_owned(), NULL_NS_URI.to_owned());
        Self { bindings }
    }

    /// Binds `prefix` to `namespace_uri`, replacing an earlier binding of the same prefix.
    /// `xml` and `xmlns` keep their fixed URIs.
    pub fn bind(
        &mut self,
        prefix: impl Into<String>,
        namespace_uri: impl Into<String>,
    ) -> Result<(), XPathError> {
        let prefix = prefix.into();
        let namespace_uri = namespace_uri.into();

        if !prefix.is_empty() && !is_ncname(&prefix) {
            return Err(XPathError::InvalidArgument(format!(
                "`{prefix}` is not a valid namespace prefix"
            )));
        }
        if !prefix.is_empty() && namespace_uri.is_empty() {
            return Err(XPathError::InvalidArgument(format!(
                "prefix `{prefix}` cannot be bound to the empty namespace"
            )));
        }
        let reserved = match prefix.as_str() {
            XML_NS_PREFIX => Some(XML_NS_URI),
            XMLNS_ATTRIBUTE => Some(XMLNS_ATTRIBUTE_NS_URI),
            _ => None,
        };
        if let Some(reserved) = reserved
            && reserved != namespace_uri
        {
            return Err(XPathError::InvalidArgument(format!(
                "reserved prefix `{prefix}` cannot be rebound"
            )));
        }

        self.bindings.insert(prefix, namespace_uri);
        Ok(())
    }

    pub fn with_binding(
        mut self,
        prefix: impl Into<String>,
        namespace_uri: impl Into<String>,
    ) -> Result<Self, XPathError> {
        self.bind(prefix, namespace_uri)?;
        Ok(self)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }
}

impl Default for NamespaceBindings {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceContext for NamespaceBindings {
    fn namespace_uri(&self, prefix: &str) -> String {
        self.bindings.get(prefix).cloned().unwrap_or_default()
    }

    fn prefix(&self, namespace_uri: &str) -> Option<String> {
        self.bindings
            .iter()
            .find(|(_, uri)| uri.as_str() == namespace_uri)
            .map(|(prefix, _)| prefix.clone())
    }

    fn prefixes(&self, namespace_uri: &str) -> Vec<String> {
        self.bindings
            .iter()
            .filter(|(_, uri)| uri.as_str() == namespace_uri)
            .map(|(prefix, _)| prefix.clone())
            .collect()
    }
}

/// Two contexts queried in order; the primary answer wins unless it is the empty sentinel.
#[derive(Clone)]
pub struct NamespaceUnion {
    primary: Arc<dyn NamespaceContext>,
    secondary: Arc<dyn NamespaceContext>,
}

impl NamespaceUnion {
    pub fn new(primary: Arc<dyn NamespaceContext>, secondary: Arc<dyn NamespaceContext>) -> Self {
        Self { primary, secondary }
    }

    pub fn primary(&self) -> Arc<dyn NamespaceContext> {
        Arc::clone(&self.primary)
    }

    pub fn secondary(&self) -> Arc<dyn NamespaceContext> {
        Arc::clone(&self.secondary)
    }
}

impl fmt::Debug for NamespaceUnion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceUnion").finish_non_exhaustive()
    }
}

impl NamespaceContext for NamespaceUnion {
    fn namespace_uri(&self, prefix: &str) -> String {
        let uri = self.primary.namespace_uri(prefix);
        if uri.is_empty() { self.secondary.namespace_uri(prefix) } else { uri }
    }

    fn prefix(&self, namespace_uri: &str) -> Option<String> {
        match self.primary.prefix(namespace_uri) {
            Some(prefix) if !prefix.is_empty() => Some(prefix),
            _ => Some(self.secondary.prefix(namespace_uri).unwrap_or_default()),
        }
    }

    fn prefixes(&self, namespace_uri: &str) -> Vec<String> {
        let mut union: BTreeSet<String> = self.primary.prefixes(namespace_uri).into_iter().collect();
        union.extend(self.secondary.prefixes(namespace_uri));
        union.into_iter().collect()
    }
}

/// XML non-colonized name check used for prefixes and expression names.
pub(crate) fn is_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_start(first) => chars.all(is_name_char),
        _ => false,
    }
}

pub(crate) fn is_name_start(ch: char) -> bool {
    ch == '_' || ch.is_alphabetic()
}

pub(crate) fn is_name_char(ch: char) -> bool {
    is_name_start(ch) || ch.is_numeric() || matches!(ch, '-' | '.' | '\u{b7}')
}
