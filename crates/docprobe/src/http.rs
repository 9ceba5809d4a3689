//! Boundary to the HTTP client driving a scenario
//!
//! The library never performs network I/O. A client adapter implements
//! [`HttpExchange`] and hands over the last request and response; tests and
//! the CLI use [`RecordedExchange`].

pub mod curl;
pub mod exchange;
pub mod headers;

pub use curl::curl_command;
pub use exchange::{server_parameter_name, CallResult, HttpExchange, RecordedExchange};
pub use headers::Headers;
