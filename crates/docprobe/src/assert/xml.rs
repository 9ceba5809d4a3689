//! Expectations about XML bodies

use crate::assert::{ensure, validation_expectation};
use crate::error::{Error, Result};
use crate::xml::XmlDocument;
use crate::xpath::NodeSet;

/// Assertions over a parsed XML body; XPath expressions may address the
/// default namespace with bare names
#[derive(Debug)]
pub struct XmlAssertions<'a> {
    doc: &'a XmlDocument,
}

impl<'a> XmlAssertions<'a> {
    pub const fn new(doc: &'a XmlDocument) -> Self {
        Self { doc }
    }

    /// The matching nodes; fails when there are none
    pub fn element_should_exist(&self, xpath: &str) -> Result<NodeSet<'a>> {
        let nodes = self.doc.try_query(xpath)?;
        if nodes.is_empty() {
            return Err(Error::expectation(format!(
                "The element '{xpath}' does not exist"
            )));
        }
        Ok(nodes)
    }

    pub fn element_should_not_exist(&self, xpath: &str) -> Result<()> {
        let nodes = self.doc.try_query(xpath)?;
        ensure(nodes.is_empty(), || format!("The element '{xpath}' exists"))
    }

    /// String value of the first match equals `text`
    pub fn element_should_be_equal_to(&self, xpath: &str, text: &str) -> Result<()> {
        let nodes = self.element_should_exist(xpath)?;
        let actual = nodes.first().map(|node| node.string_value()).unwrap_or_default();
        ensure(actual == text, || {
            format!("The element '{xpath}' value is '{actual}', expected '{text}'")
        })
    }

    pub fn element_should_have_count(&self, xpath: &str, count: usize) -> Result<()> {
        let found = self.doc.try_query(xpath)?.len();
        ensure(found == count, || {
            format!("{found} elements found for '{xpath}', expected {count}")
        })
    }

    /// Unprefixed attribute of the first match equals `value`
    pub fn attribute_should_be_equal_to(
        &self,
        xpath: &str,
        attribute: &str,
        value: &str,
    ) -> Result<()> {
        let nodes = self.element_should_exist(xpath)?;
        let actual = nodes
            .first()
            .and_then(|node| node.attribute(attribute))
            .ok_or_else(|| {
                Error::expectation(format!(
                    "The element '{xpath}' has no attribute '{attribute}'"
                ))
            })?;
        ensure(actual == value, || {
            format!("The attribute '{attribute}' of '{xpath}' is '{actual}', expected '{value}'")
        })
    }

    /// Conforms to its internal DTD subset
    pub fn should_be_valid(&self) -> Result<()> {
        self.doc.validate().map_err(validation_expectation)
    }

    pub fn should_be_valid_according_to_xsd(&self, schema: &str) -> Result<()> {
        self.doc.validate_xsd(schema).map_err(validation_expectation)
    }

    pub fn should_be_valid_according_to_relax_ng(&self, schema: &str) -> Result<()> {
        self.doc
            .validate_relax_ng(schema)
            .map_err(validation_expectation)
    }
}
