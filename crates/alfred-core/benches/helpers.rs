use criterion::{criterion_group, criterion_main, Criterion};

use alfred_core::helper::populate::populate_random_helpers;
use alfred_core::{build_helpers, replace_helpers};

const MOCK_JSON: &[u8] = br#"{
    "name": "bench",
    "request": { "method": "POST", "url": "/bench" },
    "response": {
        "status": 200,
        "body": "{{ alfred.req.user.name }} {{ alfred.req.user.id }} {{ alfred.time.now.format('unix') }} {{ alfred.random.RandomIntBetween(1,100) @name:'n' }}",
        "headers": { "x-id": "{{ alfred.req.user.id }}" }
    }
}"#;

fn bench_build_helpers(c: &mut Criterion) {
    c.bench_function("build_helpers", |b| {
        b.iter(|| build_helpers(std::hint::black_box(MOCK_JSON)).unwrap());
    });
}

fn bench_substitution(c: &mut Criterion) {
    let helpers = build_helpers(MOCK_JSON).unwrap();
    let populated = populate_random_helpers(helpers);
    let body = "{{ alfred.random.RandomIntBetween(1,100) @name:'n' }} used three times: {{ alfred.random.RandomIntBetween(1,100) @name:'n' }} {{ alfred.random.RandomIntBetween(1,100) @name:'n' }}";

    c.bench_function("replace_helpers", |b| {
        b.iter(|| replace_helpers(std::hint::black_box(body), &populated));
    });
}

criterion_group!(benches, bench_build_helpers, bench_substitution);
criterion_main!(benches);
