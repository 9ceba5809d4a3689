//! Namespace introspection

use indexmap::IndexMap;

use crate::xml::model::Document;

/// Prefix standing in for the default namespace in XPath expressions
pub const DEFAULT_PREFIX: &str = "rootns";

/// Declared prefixes (empty string for the default namespace) and their URIs
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceMap {
    entries: IndexMap<String, String>,
}

impl NamespaceMap {
    /// Collect every declaration from the root element down; the first
    /// declaration of a prefix wins
    pub fn from_document(doc: &Document) -> Self {
        let mut entries = IndexMap::new();
        let Some(root) = doc.root_element() else {
            return Self { entries };
        };

        let elements = std::iter::once(root).chain(doc.descendants(root));
        for element in elements.filter_map(|id| doc.element(id)) {
            for (prefix, uri) in &element.declarations {
                if !uri.is_empty() && !entries.contains_key(prefix) {
                    entries.insert(prefix.clone(), uri.clone());
                }
            }
        }
        Self { entries }
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.entries.get(prefix).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }

    /// Prefix bindings to register with an XPath context.
    ///
    /// While a default namespace exists, the empty prefix, `"0"` and a
    /// declared `rootns` all register under [`DEFAULT_PREFIX`]. The default
    /// namespace itself is registered first so it wins that slot.
    pub fn registrations(&self, has_default: bool) -> IndexMap<String, String> {
        let mut bindings = IndexMap::new();
        if has_default {
            if let Some(uri) = self.get("") {
                bindings.insert(DEFAULT_PREFIX.to_string(), uri.to_string());
            }
        }
        for (prefix, uri) in self.iter() {
            let collides = prefix.is_empty() || prefix == "0" || prefix == DEFAULT_PREFIX;
            let prefix = match (collides, has_default) {
                (true, true) => DEFAULT_PREFIX,
                (true, false) if prefix.is_empty() => continue,
                _ => prefix,
            };
            bindings.entry(prefix.to_string()).or_insert_with(|| uri.to_string());
        }
        bindings
    }
}

impl<'a> IntoIterator for &'a NamespaceMap {
    type Item = (&'a String, &'a String);
    type IntoIter = indexmap::map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Whether the root element sits in an unprefixed default namespace.
///
/// The root must resolve a URI for the empty prefix, and that URI must not
/// also be reachable through a prefix in scope of the root.
pub fn has_default_namespace(doc: &Document) -> bool {
    let Some(root) = doc.root_element() else {
        return false;
    };
    match doc.lookup_namespace_uri(root, "") {
        Some(uri) => doc.lookup_prefix(root, uri).is_none(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::xml::parser::Parser;

    fn parse(input: &str) -> Result<Document> {
        Parser::new(input.as_bytes()).parse()
    }

    #[test]
    fn test_collects_nested_declarations() -> Result<()> {
        let doc = parse(r#"<a xmlns="urn:a"><b xmlns:x="urn:x"><c xmlns:x="urn:other"/></b></a>"#)?;
        let map = NamespaceMap::from_document(&doc);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(""), Some("urn:a"));
        assert_eq!(map.get("x"), Some("urn:x"));
        Ok(())
    }

    #[test]
    fn test_default_namespace_detection() -> Result<()> {
        assert!(has_default_namespace(&parse(r#"<a xmlns="urn:a"/>"#)?));
        assert!(!has_default_namespace(&parse(r#"<a xmlns:p="urn:a"/>"#)?));
        assert!(!has_default_namespace(&parse(
            r#"<a xmlns="urn:a" xmlns:p="urn:a"/>"#
        )?));
        assert!(!has_default_namespace(&parse("<a/>")?));
        Ok(())
    }

    #[test]
    fn test_registrations_map_default_to_rootns() -> Result<()> {
        let doc = parse(r#"<a xmlns="urn:a" xmlns:rootns="urn:clash" xmlns:p="urn:p"/>"#)?;
        let map = NamespaceMap::from_document(&doc);
        let bindings = map.registrations(true);
        assert_eq!(bindings.get(DEFAULT_PREFIX).map(String::as_str), Some("urn:a"));
        assert_eq!(bindings.get("p").map(String::as_str), Some("urn:p"));
        assert!(!bindings.contains_key(""));
        Ok(())
    }

    #[test]
    fn test_registrations_without_default() -> Result<()> {
        let doc = parse(r#"<p:a xmlns:p="urn:p"/>"#)?;
        let bindings = NamespaceMap::from_document(&doc).registrations(false);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings.get("p").map(String::as_str), Some("urn:p"));
        Ok(())
    }
}
