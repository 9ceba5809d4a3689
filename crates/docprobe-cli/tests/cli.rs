use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn docprobe() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("docprobe"))
}

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn json_read_prints_value() {
    let dir = TempDir::new().unwrap();
    let body = write(&dir, "body.json", r#"{"status":"ok","items":[1,2,3]}"#);
    docprobe()
        .args(["json", "read"])
        .arg(&body)
        .arg("root.items[2]")
        .assert()
        .success()
        .stdout("3\n");
}

#[test]
fn json_read_javascript_mode() {
    let dir = TempDir::new().unwrap();
    let body = write(&dir, "body.json", r#"{"user":{"name":"Ada"}}"#);
    docprobe()
        .args(["--mode", "javascript", "json", "read"])
        .arg(&body)
        .arg("root->user->name")
        .assert()
        .success()
        .stdout("\"Ada\"\n");
}

#[test]
fn json_read_from_stdin() {
    docprobe()
        .args(["json", "read", "-", "root[0]"])
        .write_stdin("[\"x\", \"y\"]")
        .assert()
        .success()
        .stdout("\"x\"\n");
}

#[test]
fn json_read_missing_node_fails() {
    let dir = TempDir::new().unwrap();
    let body = write(&dir, "body.json", r#"{"a":{"b":1}}"#);
    docprobe()
        .args(["json", "read"])
        .arg(&body)
        .arg("root.a.c")
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "Failed to evaluate expression 'root.a.c'",
        ));
}

#[test]
fn config_file_sets_mode_and_pretty() {
    let dir = TempDir::new().unwrap();
    let config = write(
        &dir,
        "docprobe.toml",
        "evaluation_mode = \"javascript\"\npretty = false\n",
    );
    let body = write(&dir, "body.json", r#"{"a":{"b":[1,2]}}"#);
    docprobe()
        .arg("--config")
        .arg(&config)
        .args(["json", "read"])
        .arg(&body)
        .arg("root->a")
        .assert()
        .success()
        .stdout("{\"b\":[1,2]}\n");
}

#[test]
fn json_fmt_pretty_and_compact() {
    let dir = TempDir::new().unwrap();
    let body = write(&dir, "body.json", r#"{ "a" : [ 1 ] }"#);
    docprobe()
        .args(["json", "fmt"])
        .arg(&body)
        .assert()
        .success()
        .stdout("{\n    \"a\": [\n        1\n    ]\n}\n");
    docprobe()
        .args(["json", "fmt", "--compact"])
        .arg(&body)
        .assert()
        .success()
        .stdout("{\"a\":[1]}\n");
}

#[test]
fn json_validate_reports_errors() {
    let dir = TempDir::new().unwrap();
    let schema = write(
        &dir,
        "schema.json",
        r#"{"type":"object","properties":{"age":{"type":"integer"}}}"#,
    );
    let good = write(&dir, "good.json", r#"{"age": 3}"#);
    let bad = write(&dir, "bad.json", r#"{"age": "three"}"#);

    docprobe()
        .args(["json", "validate"])
        .arg(&good)
        .arg("--schema")
        .arg(&schema)
        .assert()
        .success()
        .stdout("valid\n");
    docprobe()
        .args(["json", "validate"])
        .arg(&bad)
        .arg("--schema")
        .arg(&schema)
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("/age: "));
}

#[test]
fn invalid_json_is_an_error() {
    docprobe()
        .args(["json", "fmt"])
        .write_stdin("{nope")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("is not valid json"));
}

#[test]
fn xml_query_default_namespace() {
    let dir = TempDir::new().unwrap();
    let body = write(&dir, "body.xml", r#"<a xmlns="ns1"><b>hi</b><b>there</b></a>"#);
    docprobe()
        .args(["xml", "query"])
        .arg(&body)
        .arg("/a/b/text()")
        .assert()
        .success()
        .stdout("hi\nthere\n");
}

#[test]
fn xml_namespaces_lists_prefixes() {
    docprobe()
        .args(["xml", "namespaces"])
        .write_stdin(r#"<a xmlns="urn:d" xmlns:m="urn:m"><m:b/></a>"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("m=urn:m"))
        .stdout(predicate::str::contains("=urn:d"));
}

#[test]
fn xml_query_transcodes_declared_encoding() {
    let dir = TempDir::new().unwrap();
    let feed = dir.path().join("latin1.xml");
    fs::write(
        &feed,
        b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><city>M\xfcnchen</city>",
    )
    .unwrap();
    docprobe()
        .args(["xml", "query"])
        .arg(&feed)
        .arg("/city")
        .assert()
        .success()
        .stdout("M\u{fc}nchen\n");
}

#[test]
fn xml_fmt_indents() {
    docprobe()
        .args(["xml", "fmt"])
        .write_stdin("<a><b/></a>")
        .assert()
        .success()
        .stdout("<?xml version=\"1.0\"?>\n<a>\n  <b/>\n</a>\n");
}

#[test]
fn xml_validate_against_xsd() {
    let dir = TempDir::new().unwrap();
    let xsd = write(
        &dir,
        "count.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="count" type="xs:integer"/>
</xs:schema>"#,
    );
    let good = write(&dir, "good.xml", "<count>4</count>");
    let bad = write(&dir, "bad.xml", "<count>four</count>");

    docprobe()
        .args(["xml", "validate"])
        .arg(&good)
        .arg("--xsd")
        .arg(&xsd)
        .assert()
        .success();
    docprobe()
        .args(["xml", "validate"])
        .arg(&bad)
        .arg("--xsd")
        .arg(&xsd)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("count"));
}

#[test]
fn xml_validate_internal_dtd() {
    docprobe()
        .args(["xml", "validate", "--dtd"])
        .write_stdin("<!DOCTYPE a [<!ELEMENT a EMPTY>]>\n<a>text</a>")
        .assert()
        .code(1);
}

#[test]
fn grammar_flags_conflict() {
    docprobe()
        .args(["xml", "validate", "--dtd", "--xsd", "x.xsd"])
        .assert()
        .failure();
}

#[test]
fn malformed_xml_reports_line() {
    docprobe()
        .args(["xml", "fmt"])
        .write_stdin("<a>\n<b>\n</a>")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("at line"));
}
