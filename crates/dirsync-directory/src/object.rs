//! Directory object model.
//!
//! A [`DirectoryObject`] is one directory entry: a distinguished name, a set
//! of object classes, and a map of inherently multi-valued attributes.
//! Attribute names compare case-insensitively, values keep their order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A distinguished name.
///
/// The DN uniquely identifies an entry and encodes its position in the
/// hierarchy. Comparison and hashing are case-insensitive, matching
/// directory semantics; the original spelling is preserved for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dn(String);

impl Dn {
    /// Create a DN from its string form.
    pub fn new(dn: impl Into<String>) -> Self {
        Self(dn.into())
    }

    /// Build a DN from one RDN attribute/value pair and a parent DN.
    ///
    /// The value is escaped per RFC 4514.
    pub fn child_of(parent: &Dn, rdn_attribute: &str, rdn_value: &str) -> Self {
        Self(format!(
            "{}={},{}",
            rdn_attribute,
            escape_rdn_value(rdn_value),
            parent.0
        ))
    }

    /// The DN as entered.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased form used for comparison and map keys.
    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }

    /// The parent DN, or `None` for a single-RDN name.
    ///
    /// Splits on the first comma that is not backslash-escaped.
    pub fn parent(&self) -> Option<Dn> {
        let bytes = self.0.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b',' => {
                    let rest = self.0[i + 1..].trim_start();
                    if rest.is_empty() {
                        return None;
                    }
                    return Some(Dn::new(rest));
                }
                _ => i += 1,
            }
        }
        None
    }

    /// Whether `self` is an ancestor of `other` in the hierarchy.
    pub fn is_ancestor_of(&self, other: &Dn) -> bool {
        let own = self.normalized();
        let descendant = other.normalized();
        descendant.len() > own.len() && descendant.ends_with(&format!(",{own}"))
    }
}

impl PartialEq for Dn {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for Dn {}

impl std::hash::Hash for Dn {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Dn {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Escape special characters in a DN attribute value per RFC 4514.
///
/// Escaped: leading/trailing space, leading `#`, NUL, and the characters
/// `, + " \ < > ; =`.
pub fn escape_rdn_value(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let mut result = String::with_capacity(value.len() * 2);
    let char_count = value.chars().count();

    for (i, ch) in value.chars().enumerate() {
        let is_first = i == 0;
        let is_last = i == char_count - 1;

        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                result.push('\\');
                result.push(ch);
            }
            '\0' => result.push_str("\\00"),
            ' ' if is_first || is_last => result.push_str("\\20"),
            '#' if is_first => result.push_str("\\23"),
            _ => result.push(ch),
        }
    }

    result
}

/// Multi-valued attribute map with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes {
    // Keyed by lowercased attribute name.
    values: BTreeMap<String, Vec<String>>,
}

impl Attributes {
    /// Create an empty attribute map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all values under `name`.
    pub fn set(&mut self, name: &str, values: Vec<String>) {
        self.values.insert(name.to_lowercase(), values);
    }

    /// Replace `name` with a single value.
    pub fn set_single(&mut self, name: &str, value: impl Into<String>) {
        self.set(name, vec![value.into()]);
    }

    /// Append a value under `name` unless an equal value is already present.
    ///
    /// Returns whether the value was added.
    pub fn add_value(&mut self, name: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        let entry = self.values.entry(name.to_lowercase()).or_default();
        if entry.contains(&value) {
            return false;
        }
        entry.push(value);
        true
    }

    /// First value under `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_lowercase())
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// All values under `name`, in insertion order.
    pub fn all(&self, name: &str) -> &[String] {
        self.values
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Remove `name` and return its values.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.values.remove(&name.to_lowercase())
    }

    /// Whether any value is present under `name`.
    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(&name.to_lowercase())
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, values)` pairs. Names are lowercased.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// One directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryObject {
    /// Distinguished name, unique within the directory.
    pub dn: Dn,
    /// Object classes of the entry.
    pub object_classes: Vec<String>,
    /// Entry attributes.
    pub attributes: Attributes,
}

impl DirectoryObject {
    /// Create an entry with no classes or attributes.
    pub fn new(dn: Dn) -> Self {
        Self {
            dn,
            object_classes: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    /// Add an object class.
    #[must_use]
    pub fn with_object_class(mut self, class: impl Into<String>) -> Self {
        self.object_classes.push(class.into());
        self
    }

    /// Set a single-valued attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.set_single(name, value);
        self
    }

    /// Whether the entry carries the given object class (case-insensitive).
    pub fn has_object_class(&self, class: &str) -> bool {
        self.object_classes
            .iter()
            .any(|c| c.eq_ignore_ascii_case(class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dn_case_insensitive_eq() {
        let a = Dn::new("CN=Group1,OU=Groups,DC=test,DC=local");
        let b = Dn::new("cn=group1,ou=groups,dc=test,dc=local");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "CN=Group1,OU=Groups,DC=test,DC=local");
    }

    #[test]
    fn test_dn_parent() {
        let dn = Dn::new("cn=group1,ou=Groups,dc=test,dc=local");
        assert_eq!(dn.parent().unwrap(), Dn::new("ou=Groups,dc=test,dc=local"));
        assert!(Dn::new("dc=local").parent().is_none());
    }

    #[test]
    fn test_dn_parent_skips_escaped_comma() {
        let dn = Dn::new("cn=Smith\\, John,ou=People,dc=test,dc=local");
        assert_eq!(dn.parent().unwrap(), Dn::new("ou=People,dc=test,dc=local"));
    }

    #[test]
    fn test_dn_child_of_escapes_value() {
        let parent = Dn::new("ou=Groups,dc=test,dc=local");
        let dn = Dn::child_of(&parent, "cn", "a,b=c");
        assert_eq!(dn.as_str(), "cn=a\\,b\\=c,ou=Groups,dc=test,dc=local");
    }

    #[test]
    fn test_dn_ancestry() {
        let base = Dn::new("dc=test,dc=local");
        let group = Dn::new("cn=group1,ou=Groups,dc=test,dc=local");
        assert!(base.is_ancestor_of(&group));
        assert!(!group.is_ancestor_of(&base));
        assert!(!group.is_ancestor_of(&group));
    }

    #[test]
    fn test_escape_rdn_value_edges() {
        assert_eq!(escape_rdn_value(" padded "), "\\20padded\\20");
        assert_eq!(escape_rdn_value("#lead"), "\\23lead");
        assert_eq!(escape_rdn_value("a\\b"), "a\\\\b");
        assert_eq!(escape_rdn_value("plain"), "plain");
    }

    #[test]
    fn test_attributes_append_without_duplicates() {
        let mut attrs = Attributes::new();
        assert!(attrs.add_value("member", "cn=a"));
        assert!(attrs.add_value("member", "cn=b"));
        assert!(!attrs.add_value("member", "cn=a"));
        assert_eq!(attrs.all("member"), &["cn=a".to_string(), "cn=b".to_string()]);
    }

    #[test]
    fn test_attributes_case_insensitive_names() {
        let mut attrs = Attributes::new();
        attrs.set_single("mail", "john@email.org");
        assert_eq!(attrs.first("MAIL"), Some("john@email.org"));
        assert!(attrs.has("Mail"));
    }

    #[test]
    fn test_directory_object_serde_shape() {
        let entry = DirectoryObject::new(Dn::new("cn=group1,ou=Groups,dc=test,dc=local"))
            .with_object_class("groupOfNames")
            .with_attribute("description", "group1 - description");

        let json = serde_json::to_value(&entry).unwrap();
        // Dn and Attributes serialize transparently
        assert_eq!(json["dn"], "cn=group1,ou=Groups,dc=test,dc=local");
        assert_eq!(json["attributes"]["description"][0], "group1 - description");

        let back: DirectoryObject = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_directory_object_builder() {
        let entry = DirectoryObject::new(Dn::new("cn=group1,ou=Groups,dc=test,dc=local"))
            .with_object_class("top")
            .with_object_class("groupOfNames")
            .with_attribute("cn", "group1");

        assert!(entry.has_object_class("GROUPOFNAMES"));
        assert_eq!(entry.attributes.first("cn"), Some("group1"));
    }
}
