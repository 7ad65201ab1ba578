use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use criterion::{criterion_group, criterion_main, Criterion};
use losk_interpreter::Session;

// Counts the whole pipeline, scanning and parsing included
fn benchmark(c: &mut Criterion) {
    let src = include_str!("../../data/closures.lox");

    c.bench_function("closures 200x50", |b| {
        b.iter(|| {
            let mut session = Session::new(Rc::new(RefCell::new(io::sink())));
            session.run(src).unwrap();
        })
    });
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
