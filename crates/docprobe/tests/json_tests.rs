use docprobe::{EvaluationMode, ErrorKind, Inspector, JsonDocument};
use serde_json::json;

#[test]
fn test_scenario_body_lookup() -> Result<(), Box<dyn std::error::Error>> {
    let doc = JsonDocument::parse(r#"{"status":"ok","items":[1,2,3]}"#)?;
    assert_eq!(doc.read("root.items[2]")?, &json!(3));
    assert_eq!(doc.read("status")?, "ok");
    Ok(())
}

#[test]
fn test_whole_document_expressions() -> Result<(), Box<dyn std::error::Error>> {
    for body in [r#"{"a":1}"#, "[true]", "\"text\"", "12.5", "null"] {
        let doc = JsonDocument::parse(body)?;
        for expression in ["", "  ", "root"] {
            assert_eq!(doc.read(expression)?, doc.content(), "{body} / {expression:?}");
        }
    }
    Ok(())
}

#[test]
fn test_dialects_agree() -> Result<(), Box<dyn std::error::Error>> {
    let doc = JsonDocument::parse(r#"{"users":[{"name":"Ada","tags":["x","y"]}]}"#)?;
    let property = Inspector::new(EvaluationMode::Property);
    let javascript = Inspector::new(EvaluationMode::Javascript);
    assert_eq!(
        property.evaluate(&doc, "root.users[0].tags[1]")?,
        javascript.evaluate(&doc, "root->users->0->tags->1")?
    );
    assert_eq!(javascript.evaluate(&doc, "users->0->name")?, "Ada");
    Ok(())
}

#[test]
fn test_failures_are_uniform() -> Result<(), Box<dyn std::error::Error>> {
    let doc = JsonDocument::parse(r#"{"a":{"b":1},"list":["x","y"]}"#)?;
    let inspector = Inspector::default();
    for expression in ["root.a.c", "root.list[5]", "root.a[0]", "root.a.b.c", "root..a"] {
        let err = inspector.evaluate(&doc, expression).err();
        assert_eq!(
            err.as_ref().map(|e| e.kind().clone()),
            Some(ErrorKind::EvaluationFailed {
                expression: expression.to_string()
            })
        );
        assert_eq!(
            err.map(|e| e.to_string()),
            Some(format!("Failed to evaluate expression '{expression}'"))
        );
    }
    Ok(())
}

#[test]
fn test_null_values_are_found() -> Result<(), Box<dyn std::error::Error>> {
    let doc = JsonDocument::parse(r#"{"owner":null}"#)?;
    assert!(doc.read("root.owner")?.is_null());
    Ok(())
}

#[test]
fn test_invalid_bodies() {
    for body in ["", "{", "{'a': 1}", "[1,]", "{} trailing", "NaN"] {
        let err = JsonDocument::parse(body).err();
        assert_eq!(
            err.map(|e| e.message().to_string()),
            Some(format!("The string '{body}' is not valid json")),
        );
    }
}

#[test]
fn test_encode_for_display() -> Result<(), Box<dyn std::error::Error>> {
    let doc = JsonDocument::parse(r#"{"path":"/a/b","city":"Zürich","n":[1]}"#)?;
    assert_eq!(doc.encode(false)?, r#"{"path":"/a/b","city":"Zürich","n":[1]}"#);
    assert_eq!(
        doc.encode(true)?,
        "{\n    \"path\": \"/a/b\",\n    \"city\": \"Zürich\",\n    \"n\": [\n        1\n    ]\n}"
    );
    Ok(())
}

#[test]
fn test_replace_injects_value() -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = JsonDocument::parse("{}")?;
    doc.replace(json!({"computed": [42]}));
    assert_eq!(doc.read("root.computed[0]")?, &json!(42));
    Ok(())
}
