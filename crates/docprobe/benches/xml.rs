use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use docprobe::{from_xml_str, Validate, XsdSchema};

const SIMPLE_XML: &str = "<root><child>text</child></root>";
const NAMESPACED_XML: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:m="urn:m"><entry m:id="1"><title>One</title></entry><entry m:id="2"><title>Two</title></entry></feed>"#;
const LIST_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="list">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="n" type="xs:int" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

fn bench_parse(c: &mut Criterion) {
    c.bench_function("xml_parse_simple", |b| {
        b.iter(|| from_xml_str(black_box(SIMPLE_XML)))
    });
    c.bench_function("xml_parse_namespaced", |b| {
        b.iter(|| from_xml_str(black_box(NAMESPACED_XML)))
    });
}

fn bench_xsd(c: &mut Criterion) {
    let numbers: String = (0..200).map(|n| format!("<n>{n}</n>")).collect();
    let instance = format!("<list>{numbers}</list>");
    let (Ok(schema), Ok(doc)) = (XsdSchema::parse(LIST_XSD), from_xml_str(&instance)) else {
        return;
    };
    c.bench_function("xml_validate_xsd", |b| {
        b.iter(|| schema.check(black_box(doc.document())))
    });
}

criterion_group!(benches, bench_parse, bench_xsd);
criterion_main!(benches);
