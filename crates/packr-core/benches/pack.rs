//! Lexer and pack benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use packr_core::{pack, Lexer, PackOptions};

const SAMPLE_SOURCE: &str = r#"
// Sample script for benchmarking
var Draggable = function(element, options) {
    var _startX = 0, _startY = 0;
    this.element = element;
    this.options = options || {};

    function onMove(event) {
        var deltaX = event.pageX - _startX;
        var deltaY = event.pageY - _startY;
        element.style.left = deltaX + 'px';
        element.style.top = deltaY + 'px';
    }

    this.start = function(event) {
        _startX = event.pageX;
        _startY = event.pageY;
        document.addEventListener('mousemove', onMove, false);
    };
};

Draggable.prototype.snap = function(value, grid) {
    if (!grid) return value;
    var steps = Math.round(value / grid);
    return steps * grid;
};

var pattern = /^(\d+)px$/;
var message = `moved ${Draggable.name} by ${pattern.source}`;
"#;

fn bench_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");
    group.throughput(Throughput::Bytes(SAMPLE_SOURCE.len() as u64));

    group.bench_function("sample", |b| {
        b.iter(|| {
            for token in Lexer::new(black_box(SAMPLE_SOURCE)) {
                black_box(token.unwrap());
            }
        });
    });

    group.finish();
}

fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack");
    group.throughput(Throughput::Bytes(SAMPLE_SOURCE.len() as u64));

    let configs = [
        ("compact", PackOptions::new()),
        ("shrink", PackOptions::new().with_shrink_vars(true).with_private(true)),
        (
            "base62",
            PackOptions::new().with_shrink_vars(true).with_base62(true),
        ),
    ];
    for (name, options) in &configs {
        group.bench_function(*name, |b| {
            b.iter(|| pack(black_box(SAMPLE_SOURCE), options).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lexer, bench_pack);
criterion_main!(benches);
