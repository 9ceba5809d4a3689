//! The last request/response pair of a scenario

use std::borrow::Cow;

use indexmap::IndexMap;

use crate::error::Result;
use crate::http::headers::Headers;

/// Request headers that CGI stores without the `HTTP_` prefix
const CONTENT_HEADERS: [&str; 3] = ["CONTENT_LENGTH", "CONTENT_MD5", "CONTENT_TYPE"];

/// Access to the request that was sent and the response that came back
pub trait HttpExchange {
    fn method(&self) -> &str;

    fn uri(&self) -> &str;

    /// CGI-style request environment, request headers included
    fn server_parameters(&self) -> &IndexMap<String, String>;

    /// Posted form fields
    fn parameters(&self) -> &IndexMap<String, String>;

    /// Raw response body
    fn content(&self) -> &[u8];

    /// Response headers
    fn headers(&self) -> &Headers;

    /// Set a header for the next request
    fn set_request_header(&mut self, name: &str, value: &str);

    /// Response header values joined with `", "`
    fn header(&self, name: &str) -> Result<String> {
        self.headers().get(name)
    }

    fn raw_header(&self, name: &str) -> Result<&[String]> {
        self.headers().get_all(name)
    }

    /// Body as UTF-8, invalid sequences replaced
    fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.content())
    }
}

impl<E: HttpExchange + ?Sized> HttpExchange for Box<E> {
    fn method(&self) -> &str {
        (**self).method()
    }

    fn uri(&self) -> &str {
        (**self).uri()
    }

    fn server_parameters(&self) -> &IndexMap<String, String> {
        (**self).server_parameters()
    }

    fn parameters(&self) -> &IndexMap<String, String> {
        (**self).parameters()
    }

    fn content(&self) -> &[u8] {
        (**self).content()
    }

    fn headers(&self) -> &Headers {
        (**self).headers()
    }

    fn set_request_header(&mut self, name: &str, value: &str) {
        (**self).set_request_header(name, value);
    }
}

/// Server parameter a request header is stored under: `X-Foo` becomes
/// `HTTP_X_FOO`, `Content-Type` becomes `CONTENT_TYPE`
pub fn server_parameter_name(header: &str) -> String {
    let name = header.to_uppercase().replace('-', "_");
    if CONTENT_HEADERS.contains(&name.as_str()) {
        name
    } else {
        format!("HTTP_{name}")
    }
}

/// An exchange held in memory
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordedExchange {
    method: String,
    uri: String,
    server: IndexMap<String, String>,
    parameters: IndexMap<String, String>,
    content: Vec<u8>,
    headers: Headers,
}

impl RecordedExchange {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Exchange whose only interesting part is the response body
    pub fn from_content(content: impl Into<Vec<u8>>) -> Self {
        Self::new("GET", "/").with_content(content)
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = content.into();
        self
    }

    /// Add a response header
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_server_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.server.insert(name.into(), value.into());
        self
    }

    /// Record a new response, clearing request headers for the next call
    pub fn respond(&mut self, content: impl Into<Vec<u8>>, headers: Headers) {
        self.content = content.into();
        self.headers = headers;
        self.server.clear();
    }
}

impl HttpExchange for RecordedExchange {
    fn method(&self) -> &str {
        &self.method
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn server_parameters(&self) -> &IndexMap<String, String> {
        &self.server
    }

    fn parameters(&self) -> &IndexMap<String, String> {
        &self.parameters
    }

    fn content(&self) -> &[u8] {
        &self.content
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn set_request_header(&mut self, name: &str, value: &str) {
        self.server
            .insert(server_parameter_name(name), value.to_string());
    }
}

/// The value produced by the last step, for later steps to inspect
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallResult<T> {
    value: T,
}

impl<T> CallResult<T> {
    pub const fn new(value: T) -> Self {
        Self { value }
    }

    pub fn update(&mut self, value: T) {
        self.value = value;
    }

    pub const fn value(&self) -> &T {
        &self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}
