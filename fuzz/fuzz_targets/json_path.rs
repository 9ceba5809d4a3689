#![no_main]
use docprobe::{EvaluationMode, JsonDocument};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let (body, expression) = s.split_once('\n').unwrap_or((s, "root"));
        if let Ok(doc) = JsonDocument::parse(body) {
            let _ = doc.read_with(expression, EvaluationMode::Property);
            let _ = doc.read_with(expression, EvaluationMode::Javascript);
            let _ = doc.encode(true);
        }
    }
});
