#![no_main]
use docprobe::from_xml_bytes;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(doc) = from_xml_bytes(data) {
        let _ = doc.serialize();
        let _ = doc.namespaces();
        let _ = doc.query("//*");
    }
});
