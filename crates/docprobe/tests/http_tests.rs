use docprobe::{
    curl_command, CallResult, ErrorKind, Headers, HttpExchange, Inspector, JsonAssertions,
    JsonDocument, RecordedExchange, ResponseAssertions, XmlAssertions, XmlDocument,
};

fn json_response() -> RecordedExchange {
    RecordedExchange::new("GET", "http://localhost/api/orders?page=2")
        .with_content(r#"{"orders":[{"id":7,"state":"paid"}],"next":null}"#)
        .with_header("Content-Type", "application/json; charset=utf-8")
        .with_header("X-Trace", "a")
        .with_header("X-Trace", "b")
        .with_header("Date", "Tue, 15 Nov 1994 08:12:31 GMT")
        .with_header("Expires", "Thu, 01 Dec 1994 16:00:00 GMT")
}

#[test]
fn test_header_lookup() -> Result<(), Box<dyn std::error::Error>> {
    let exchange = json_response();
    assert_eq!(exchange.header("x-trace")?, "a, b");
    assert_eq!(exchange.raw_header("X-TRACE")?, ["a", "b"]);
    let err = exchange.header("Location").err();
    assert_eq!(
        err.map(|e| e.to_string()).as_deref(),
        Some("The header 'location' doesn't exist")
    );
    Ok(())
}

#[test]
fn test_step_flow_from_exchange_to_assertion() -> Result<(), Box<dyn std::error::Error>> {
    let exchange: Box<dyn HttpExchange> = Box::new(json_response());
    let doc = JsonDocument::parse(&exchange.text())?;
    let json = JsonAssertions::new(&doc, Inspector::default());
    json.node_should_be_equal_to("root.orders[0].state", "paid")?;
    json.node_should_be_null("root.next")?;
    json.node_should_have_elements("root.orders", 1)?;

    let response = ResponseAssertions::new(&*exchange);
    response.header_should_contain("Content-Type", "json")?;
    response.should_be_encoded_in("utf-8")?;
    response.should_expire_in_the_future()?;
    Ok(())
}

#[test]
fn test_expectation_failures_quote_actual_values() -> Result<(), Box<dyn std::error::Error>> {
    let exchange = json_response();
    let response = ResponseAssertions::new(&exchange);
    let err = response.header_should_match("X-Trace", "^z").err();
    assert_eq!(err.as_ref().map(|e| e.kind().clone()), Some(ErrorKind::Expectation));
    assert_eq!(
        err.map(|e| e.to_string()).as_deref(),
        Some("The header 'X-Trace' should match '^z', but it is: 'a, b'")
    );
    let err = response.header_should_not_exist("x-trace").err();
    assert_eq!(
        err.map(|e| e.to_string()).as_deref(),
        Some("The header 'x-trace' exists")
    );
    Ok(())
}

#[test]
fn test_request_headers_and_curl() {
    let mut exchange = RecordedExchange::new("PUT", "http://localhost/api/orders/7")
        .with_parameter("state", "shipped")
        .with_server_parameter("HTTPS", "on");
    exchange.set_request_header("Authorization", "Bearer t");
    exchange.set_request_header("Content-Type", "application/x-www-form-urlencoded");

    assert_eq!(
        exchange.server_parameters().get("HTTP_AUTHORIZATION").map(String::as_str),
        Some("Bearer t")
    );
    assert_eq!(
        curl_command(&exchange),
        "curl -X PUT --data 'state=shipped' -H 'CONTENT_TYPE: application/x-www-form-urlencoded' 'http://localhost/api/orders/7'"
    );
    assert_eq!(ResponseAssertions::new(&exchange).curl_command(), curl_command(&exchange));
}

#[test]
fn test_xml_response_assertions() -> Result<(), Box<dyn std::error::Error>> {
    let exchange = RecordedExchange::from_content(
        r#"<rss xmlns="urn:rss"><item id="1"><title>A</title></item><item id="2"><title>B</title></item></rss>"#,
    );
    let doc = XmlDocument::parse_bytes(exchange.content())?;
    let xml = XmlAssertions::new(&doc);
    xml.element_should_have_count("/rss/item", 2)?;
    xml.element_should_be_equal_to("/rss/item[2]/title", "B")?;
    xml.attribute_should_be_equal_to("/rss/item[1]", "id", "1")?;
    let err = xml.element_should_be_equal_to("/rss/item[1]/title", "B").err();
    assert_eq!(
        err.map(|e| e.to_string()).as_deref(),
        Some("The element '/rss/item[1]/title' value is 'A', expected 'B'")
    );
    Ok(())
}

#[test]
fn test_headers_collect_and_call_result() -> Result<(), Box<dyn std::error::Error>> {
    let headers: Headers = vec![("Link", "<a>"), ("LINK", "<b>")].into_iter().collect();
    let mut exchange = RecordedExchange::new("GET", "/");
    exchange.respond("[]", headers);
    assert_eq!(exchange.header("link")?, "<a>, <b>");

    let mut last = CallResult::new(JsonDocument::parse(&exchange.text())?);
    last.update(JsonDocument::parse("[1]")?);
    assert_eq!(last.value().read("root[0]")?, &serde_json::json!(1));
    Ok(())
}

#[test]
fn test_latin1_xml_body() -> Result<(), Box<dyn std::error::Error>> {
    let exchange = RecordedExchange::from_content(
        b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><city>M\xfcnchen</city>".to_vec(),
    )
    .with_header("Content-Type", "application/xml; charset=ISO-8859-1");
    let response = ResponseAssertions::new(&exchange);
    response.should_be_encoded_in("ISO-8859-1")?;
    assert!(response.should_be_encoded_in("UTF-8").is_err());

    let doc = docprobe::from_xml_bytes(exchange.content())?;
    XmlAssertions::new(&doc).element_should_be_equal_to("/city", "M\u{fc}nchen")?;
    Ok(())
}
