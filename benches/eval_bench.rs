use criterion::{black_box, criterion_group, criterion_main, Criterion};

use perch::{eval_source, standard_scope, Context};

fn bench_eval(c: &mut Criterion) {
    let ctx = Context::new();
    let scope = standard_scope(&ctx).expect("ground bootstraps");
    eval_source(
        &ctx,
        &scope,
        "(defn fib (n) (if (<? n 2) n (+ (fib (- n 1)) (fib (- n 2)))))",
    )
    .expect("fib defines");

    c.bench_function("fib 15", |b| {
        b.iter(|| eval_source(&ctx, &scope, black_box("(fib 15)")).unwrap())
    });

    c.bench_function("tail loop 10k", |b| {
        eval_source(
            &ctx,
            &scope,
            "(defn spin (n) (if (=? n 0) n (spin (- n 1))))",
        )
        .unwrap();
        b.iter(|| eval_source(&ctx, &scope, black_box("(spin 10000)")).unwrap())
    });

    c.bench_function("read ground test table", |b| {
        b.iter(|| perch::parse_all(black_box("(+ 1 2 3) [a b [c d] e] (def (a . bs) [1 2 3])")).unwrap())
    });
}

criterion_group!(benches, bench_eval);
criterion_main!(benches);
