use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use mimewalk::parser::mime::parse_message;
use mimewalk::walker::{EventLog, MessageWalker};

fn read_fixture(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).unwrap()
}

fn bench_parse_message(c: &mut Criterion) {
    let raw = read_fixture("multipart.eml");

    c.bench_function("parse_multipart_eml", |b| {
        b.iter(|| parse_message(&raw).unwrap())
    });
}

fn bench_walk(c: &mut Criterion) {
    let walker = MessageWalker::default();
    let multipart = parse_message(&read_fixture("multipart.eml")).unwrap();
    let tnef = parse_message(&read_fixture("tnef.eml")).unwrap();

    c.bench_function("walk_multipart", |b| {
        b.iter(|| {
            let mut log = EventLog::new();
            walker.parse(&multipart, &mut log).unwrap();
            log.events().len()
        })
    });
    c.bench_function("walk_tnef", |b| {
        b.iter(|| {
            let mut log = EventLog::new();
            walker.parse(&tnef, &mut log).unwrap();
            log.events().len()
        })
    });
}

criterion_group!(benches, bench_parse_message, bench_walk);
criterion_main!(benches);
