use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use docprobe::{EvaluationMode, Inspector, JsonDocument};

const ORDERS: &str = r#"{"orders":[{"id":1,"lines":[{"sku":"A-1","qty":2},{"sku":"B-7","qty":1}]},{"id":2,"lines":[{"sku":"C-3","qty":5}]}],"meta":{"page":1,"next":"/orders?page=2"}}"#;

fn bench_parse(c: &mut Criterion) {
    c.bench_function("json_parse_orders", |b| {
        b.iter(|| JsonDocument::parse(black_box(ORDERS)))
    });
}

fn bench_read(c: &mut Criterion) {
    let Ok(doc) = JsonDocument::parse(ORDERS) else {
        return;
    };
    let javascript = Inspector::new(EvaluationMode::Javascript);
    c.bench_function("json_read_property", |b| {
        b.iter(|| doc.read(black_box("root.orders[0].lines[1].sku")))
    });
    c.bench_function("json_read_javascript", |b| {
        b.iter(|| javascript.evaluate(&doc, black_box("root->orders->0->lines->1->sku")))
    });
}

fn bench_encode(c: &mut Criterion) {
    let Ok(doc) = JsonDocument::parse(ORDERS) else {
        return;
    };
    c.bench_function("json_encode_pretty", |b| b.iter(|| doc.encode(black_box(true))));
}

criterion_group!(benches, bench_parse, bench_read, bench_encode);
criterion_main!(benches);
