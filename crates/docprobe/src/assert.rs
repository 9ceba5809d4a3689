//! Expectations for scenario steps
//!
//! Every failed expectation is an [`ErrorKind::Expectation`] whose message
//! quotes the actual value, ready to be shown to the scenario author.

pub mod json;
pub mod response;
pub mod xml;

pub use json::JsonAssertions;
pub use response::ResponseAssertions;
pub use xml::XmlAssertions;

use crate::error::{Error, ErrorKind, Result};

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::expectation(message()))
    }
}

/// Grammar violations surface as expectations; broken grammars do not
fn validation_expectation(err: Error) -> Error {
    match err.kind() {
        ErrorKind::SchemaValidationFailed => Error::expectation(err.to_string()),
        _ => err,
    }
}
