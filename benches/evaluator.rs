use criterion::{criterion_group, criterion_main, Criterion};
use toy::Toy;

fn fibonacci() {
    let src = r#"
        var fib = function(n) {
            if (n < 2) return n;
            return recurse(n - 2) + recurse(n - 1);
        };

        fib(20);
    "#;

    let mut toy = Toy::new();
    toy.run(src);
}

fn counting_loop() {
    let src = r#"
        var sum = 0;
        for (var i = 0; i < 100000; i = i + 1) {
            if (i > 50000) continue;
            sum = sum + i;
        }
    "#;

    let mut toy = Toy::new();
    toy.run(src);
}

fn array_updates() {
    let src = r#"
        var grid = [[0, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0]];
        var p = &grid;
        for (var n = 0; n < 2000; n = n + 1) {
            for (var i = 0; i < 4; i = i + 1) {
                p[i][3 - i] = grid[i][3 - i] + n;
            }
        }
    "#;

    let mut toy = Toy::new();
    toy.run(src);
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluator");
    group.sample_size(20);
    group.bench_function("fib 20", |b| b.iter(fibonacci));
    group.bench_function("counting loop", |b| b.iter(counting_loop));
    group.bench_function("array updates", |b| b.iter(array_updates));
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
