//! Attribute maps with case-insensitive names.

use serde::{Deserialize, Serialize};

/// One attribute of an entry: the name as first supplied plus its ordered values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name, spelled as first supplied.
    pub name: String,
    /// Values in insertion order.
    pub values: Vec<String>,
}

/// Attribute name to value-list mapping.
///
/// Names compare ignoring ASCII case (`userPassword` and `userpassword` are the same
/// attribute); the first spelling wins for display. A missing attribute is `None`, never an
/// empty list: every mutator that would leave an attribute without values removes it instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeMap {
    attributes: Vec<Attribute>,
}

impl AttributeMap {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attributes: Vec::new(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.attributes
            .iter()
            .position(|attr| attr.name.eq_ignore_ascii_case(name))
    }

    /// Values of `name`, if the attribute is set.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.position(name)
            .map(|idx| self.attributes[idx].values.as_slice())
    }

    /// First value of `name`, if any.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first().map(String::as_str))
    }

    /// True if `name` is set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// True if `name` is set and one of its values equals `value` exactly.
    #[must_use]
    pub fn contains_value(&self, name: &str, value: &str) -> bool {
        self.get(name)
            .is_some_and(|values| values.iter().any(|candidate| candidate == value))
    }

    /// Overwrites `name` with `values`. An empty value list removes the attribute.
    pub fn set(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        if values.is_empty() {
            self.remove(&name);
            return;
        }
        match self.position(&name) {
            Some(idx) => self.attributes[idx].values = values,
            None => self.attributes.push(Attribute { name, values }),
        }
    }

    /// Adds the values of `values` not already present, keeping existing order.
    pub fn append_unique(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        match self.position(&name) {
            Some(idx) => {
                let existing = &mut self.attributes[idx].values;
                for value in values {
                    if !existing.contains(&value) {
                        existing.push(value);
                    }
                }
            }
            None => {
                let mut unique: Vec<String> = Vec::with_capacity(values.len());
                for value in values {
                    if !unique.contains(&value) {
                        unique.push(value);
                    }
                }
                self.set(name, unique);
            }
        }
    }

    /// Removes `name`, returning its values if it was set.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.position(name)
            .map(|idx| self.attributes.remove(idx).values)
    }

    /// Iterates attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> + '_ {
        self.attributes.iter()
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// True if no attribute is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl<N, V> FromIterator<(N, V)> for AttributeMap
where
    N: Into<String>,
    V: IntoIterator,
    V::Item: Into<String>,
{
    /// Repeated names are merged with set-union semantics.
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (name, values) in iter {
            map.append_unique(name, values.into_iter().map(Into::into).collect());
        }
        map
    }
}

impl<'a> IntoIterator for &'a AttributeMap {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> AttributeMap {
        [
            ("cn", vec!["Ben Hacker"]),
            ("userPassword", vec!["123"]),
            ("mail", vec!["bhacker@ultraxinc.com"]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn lookup_ignores_case() {
        let map = person();
        assert_eq!(map.first("USERPASSWORD"), Some("123"));
        assert!(map.contains("Mail"));
        assert!(map.get("sn").is_none());
        assert!(map.contains_value("userpassword", "123"));
        assert!(!map.contains_value("userpassword", "1234"));
    }

    #[test]
    fn first_spelling_is_kept() {
        let mut map = person();
        map.set("USERPASSWORD", vec!["456".to_string()]);
        let names: Vec<&str> = map.iter().map(|attr| attr.name.as_str()).collect();
        assert_eq!(names, vec!["cn", "userPassword", "mail"]);
        assert_eq!(map.first("userpassword"), Some("456"));
    }

    #[test]
    fn append_unique_skips_duplicates() {
        let mut map = AttributeMap::new();
        map.append_unique("mail", vec!["a".to_string(), "b".to_string(), "a".to_string()]);
        map.append_unique("MAIL", vec!["b".to_string(), "c".to_string()]);
        assert_eq!(map.get("mail").unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn set_with_no_values_removes() {
        let mut map = person();
        map.set("mail", Vec::new());
        assert!(!map.contains("mail"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn from_iter_merges_repeated_names() {
        let map: AttributeMap = [("objectClass", vec!["top"]), ("objectclass", vec!["person"])]
            .into_iter()
            .collect();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("objectclass").unwrap(), ["top", "person"]);
    }

    #[test]
    fn remove_returns_values() {
        let mut map = person();
        assert_eq!(map.remove("CN"), Some(vec!["Ben Hacker".to_string()]));
        assert_eq!(map.remove("cn"), None);
    }
}
