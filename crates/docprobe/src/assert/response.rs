//! Expectations about the raw response

use encoding_rs::Encoding;
use regex::{Regex, RegexBuilder};
use time::format_description::well_known::Rfc2822;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::assert::ensure;
use crate::error::{Error, Result};
use crate::http::{curl_command, HttpExchange};

/// Assertions over the last response of an exchange
#[derive(Debug)]
pub struct ResponseAssertions<'a, E: HttpExchange + ?Sized> {
    exchange: &'a E,
}

impl<'a, E: HttpExchange + ?Sized> ResponseAssertions<'a, E> {
    pub const fn new(exchange: &'a E) -> Self {
        Self { exchange }
    }

    /// Body equals `expected`, after unescaping `\"`
    pub fn should_be_equal_to(&self, expected: &str) -> Result<()> {
        let expected = expected.replace("\\\"", "\"");
        let actual = self.exchange.text();
        ensure(actual == expected, || {
            format!("Actual response is '{actual}', but expected '{expected}'")
        })
    }

    pub fn should_be_empty(&self) -> Result<()> {
        let actual = self.exchange.text();
        ensure(actual.is_empty(), || {
            format!("The response of the current page is not empty, it is: {actual}")
        })
    }

    /// Case-insensitive comparison of the header value
    pub fn header_should_be_equal_to(&self, name: &str, value: &str) -> Result<()> {
        let actual = self.exchange.header(name)?;
        ensure(actual.to_lowercase() == value.to_lowercase(), || {
            format!("The header '{name}' should be equal to '{value}', but it is: '{actual}'")
        })
    }

    /// Passes when the header is absent
    pub fn header_should_not_be_equal_to(&self, name: &str, value: &str) -> Result<()> {
        match self.exchange.header(name) {
            Ok(actual) if actual.to_lowercase() == value.to_lowercase() => Err(
                Error::expectation(format!("The header '{name}' is equal to '{actual}'")),
            ),
            _ => Ok(()),
        }
    }

    pub fn header_should_contain(&self, name: &str, value: &str) -> Result<()> {
        let actual = self.exchange.header(name)?;
        ensure(actual.contains(value), || {
            format!(
                "The header '{name}' should contain value '{value}', but actual value is '{actual}'"
            )
        })
    }

    pub fn header_should_not_contain(&self, name: &str, value: &str) -> Result<()> {
        let actual = self.exchange.header(name)?;
        ensure(!actual.contains(value), || {
            format!("The header '{name}' contains '{value}'")
        })
    }

    /// The joined header value
    pub fn header_should_exist(&self, name: &str) -> Result<String> {
        self.exchange.header(name)
    }

    pub fn header_should_not_exist(&self, name: &str) -> Result<()> {
        ensure(!self.exchange.headers().contains(name), || {
            format!("The header '{name}' exists")
        })
    }

    /// `pattern` is a regex, optionally written `/body/flags`
    pub fn header_should_match(&self, name: &str, pattern: &str) -> Result<()> {
        let actual = self.exchange.header(name)?;
        let regex = compile_pattern(pattern)?;
        ensure(regex.is_match(&actual), || {
            format!("The header '{name}' should match '{pattern}', but it is: '{actual}'")
        })
    }

    /// Passes when the header is absent
    pub fn header_should_not_match(&self, name: &str, pattern: &str) -> Result<()> {
        let regex = compile_pattern(pattern)?;
        let matched = self
            .exchange
            .header(name)
            .is_ok_and(|actual| regex.is_match(&actual));
        ensure(!matched, || {
            format!("The header '{name}' should not match '{pattern}'")
        })
    }

    /// `Expires` is strictly later than `Date`
    pub fn should_expire_in_the_future(&self) -> Result<()> {
        let date = self.date_header("Date")?;
        let expires = self.date_header("Expires")?;
        ensure(expires > date, || {
            format!(
                "The response doesn't expire in the future ({})",
                format_atom(expires)
            )
        })
    }

    /// Body bytes are valid in `encoding` and `Content-Type` declares it
    pub fn should_be_encoded_in(&self, encoding: &str) -> Result<()> {
        let content = self.exchange.content();
        let valid = if matches!(encoding.to_ascii_uppercase().as_str(), "ASCII" | "US-ASCII") {
            content.is_ascii()
        } else {
            let Some(codec) = Encoding::for_label(encoding.trim().as_bytes()) else {
                return Err(Error::expectation(format!(
                    "The encoding '{encoding}' is not supported"
                )));
            };
            codec
                .decode_without_bom_handling_and_without_replacement(content)
                .is_some()
        };
        ensure(valid, || format!("The response is not encoded in {encoding}"))?;
        self.header_should_contain("Content-Type", &format!("charset={encoding}"))
    }

    /// `name: value` lines for every response header
    pub fn headers_listing(&self) -> String {
        self.exchange
            .headers()
            .iter()
            .map(|(name, values)| format!("{name}: {}\n", values.join(", ")))
            .collect()
    }

    /// Shell command reproducing the request
    pub fn curl_command(&self) -> String {
        curl_command(self.exchange)
    }

    fn date_header(&self, name: &str) -> Result<OffsetDateTime> {
        let raw = self.exchange.raw_header(name)?;
        let value = raw.first().map(String::as_str).unwrap_or_default();
        parse_http_date(value).ok_or_else(|| {
            Error::expectation(format!("The header '{name}' is not a valid date: '{value}'"))
        })
    }
}

/// RFC 2822 dates and the IMF-fixdate form `Sun, 06 Nov 1994 08:49:37 GMT`
fn parse_http_date(value: &str) -> Option<OffsetDateTime> {
    let value = value.trim();
    if let Ok(date) = OffsetDateTime::parse(value, &Rfc2822) {
        return Some(date);
    }
    let imf = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    PrimitiveDateTime::parse(value, imf)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

fn format_atom(date: OffsetDateTime) -> String {
    let atom = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
    );
    date.format(atom).unwrap_or_else(|_| date.to_string())
}

fn compile_pattern(pattern: &str) -> Result<Regex> {
    let (body, flags) = match pattern.strip_prefix('/').and_then(|rest| rest.rsplit_once('/')) {
        Some((body, flags)) if flags.chars().all(|c| c.is_ascii_alphabetic()) => (body, flags),
        _ => (pattern, ""),
    };
    RegexBuilder::new(body)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .build()
        .map_err(|err| Error::expectation(format!("The pattern '{pattern}' is invalid: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::RecordedExchange;

    fn exchange() -> RecordedExchange {
        RecordedExchange::new("GET", "http://localhost/api")
            .with_content(r#"{"ok":true}"#)
            .with_header("Content-Type", "application/json; charset=utf-8")
            .with_header("Cache-Control", "no-cache")
            .with_header("Cache-Control", "private")
            .with_header("Date", "Sun, 06 Nov 1994 08:49:37 GMT")
            .with_header("Expires", "Mon, 07 Nov 1994 08:49:37 GMT")
    }

    #[test]
    fn test_body_equality() -> Result<()> {
        let exchange = exchange();
        let response = ResponseAssertions::new(&exchange);
        response.should_be_equal_to(r#"{\"ok\":true}"#)?;
        let err = response.should_be_empty().err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some(r#"The response of the current page is not empty, it is: {"ok":true}"#)
        );
        Ok(())
    }

    #[test]
    fn test_header_equality_ignores_case() -> Result<()> {
        let exchange = exchange();
        let response = ResponseAssertions::new(&exchange);
        response.header_should_be_equal_to("content-type", "Application/JSON; charset=UTF-8")?;
        response.header_should_not_be_equal_to("X-Missing", "anything")?;
        let err = response
            .header_should_be_equal_to("Cache-Control", "no-cache")
            .err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("The header 'Cache-Control' should be equal to 'no-cache', but it is: 'no-cache, private'")
        );
        Ok(())
    }

    #[test]
    fn test_header_contains_and_exists() -> Result<()> {
        let exchange = exchange();
        let response = ResponseAssertions::new(&exchange);
        response.header_should_contain("Cache-Control", "private")?;
        response.header_should_not_contain("Cache-Control", "public")?;
        assert_eq!(response.header_should_exist("cache-control")?, "no-cache, private");
        response.header_should_not_exist("ETag")?;
        let err = response.header_should_exist("ETag").err();
        assert!(matches!(
            err.as_ref().map(Error::kind),
            Some(ErrorKind::HeaderNotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_header_patterns() -> Result<()> {
        let exchange = exchange();
        let response = ResponseAssertions::new(&exchange);
        response.header_should_match("Content-Type", "^application/json")?;
        response.header_should_match("Content-Type", "/^APPLICATION/i")?;
        response.header_should_not_match("Content-Type", "xml")?;
        response.header_should_not_match("X-Missing", ".*")?;
        assert!(response.header_should_match("Content-Type", "^text/").is_err());
        Ok(())
    }

    #[test]
    fn test_expiry() -> Result<()> {
        let exchange = exchange();
        ResponseAssertions::new(&exchange).should_expire_in_the_future()?;

        let stale = RecordedExchange::from_content("")
            .with_header("Date", "Mon, 07 Nov 1994 08:49:37 GMT")
            .with_header("Expires", "Sun, 06 Nov 1994 08:49:37 GMT");
        let err = ResponseAssertions::new(&stale).should_expire_in_the_future().err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("The response doesn't expire in the future (1994-11-06T08:49:37+00:00)")
        );
        Ok(())
    }

    #[test]
    fn test_encoding() -> Result<()> {
        let exchange = exchange();
        let response = ResponseAssertions::new(&exchange);
        response.should_be_encoded_in("utf-8")?;
        assert!(response.should_be_encoded_in("ISO-8859-1").is_err());

        let accented = RecordedExchange::from_content("café")
            .with_header("Content-Type", "text/plain; charset=US-ASCII");
        let err = ResponseAssertions::new(&accented).should_be_encoded_in("US-ASCII").err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("The response is not encoded in US-ASCII")
        );

        let err = response.should_be_encoded_in("klingon").err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("The encoding 'klingon' is not supported")
        );
        Ok(())
    }

    #[test]
    fn test_encoding_is_checked_on_body_bytes() -> Result<()> {
        let latin1 = RecordedExchange::from_content(b"caf\xe9".to_vec())
            .with_header("Content-Type", "text/plain; charset=ISO-8859-1");
        let response = ResponseAssertions::new(&latin1);
        response.should_be_encoded_in("ISO-8859-1")?;
        let err = response.should_be_encoded_in("UTF-8").err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("The response is not encoded in UTF-8")
        );
        assert_eq!(response.should_be_equal_to("caf\u{fffd}").ok(), Some(()));
        Ok(())
    }

    #[test]
    fn test_listing() {
        let exchange = RecordedExchange::from_content("")
            .with_header("Vary", "Accept")
            .with_header("ETag", "\"x\"");
        assert_eq!(
            ResponseAssertions::new(&exchange).headers_listing(),
            "vary: Accept\netag: \"x\"\n"
        );
    }
}
