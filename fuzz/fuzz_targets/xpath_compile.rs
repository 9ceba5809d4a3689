#![no_main]
use docprobe::{XPath, XmlDocument};
use libfuzzer_sys::fuzz_target;

const DOC: &str = r#"<a xmlns:p="urn:p"><b id="1">x</b><p:c>y</p:c><b/></a>"#;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if XPath::compile(s).is_ok() {
            if let Ok(doc) = XmlDocument::parse(DOC) {
                let _ = doc.evaluate(s);
            }
        }
    }
});
