use classkit::{native, ClassSpec, Kernel, Value};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_define_chain(c: &mut Criterion) {
    c.bench_function("define_chain_32", |b| {
        b.iter(|| {
            let mut kernel = Kernel::new();
            kernel
                .define("Bench.C0", ClassSpec::new().config("depth", Value::from(0)))
                .unwrap();
            for i in 1..32i64 {
                let name = format!("Bench.C{}", i);
                let parent = format!("Bench.C{}", i - 1);
                kernel
                    .define(
                        &name,
                        ClassSpec::new()
                            .extend(&parent)
                            .config("depth", Value::from(i)),
                    )
                    .unwrap();
            }
            black_box(kernel)
        })
    });
}

fn bench_create_and_dispatch(c: &mut Criterion) {
    c.bench_function("create_with_config", |b| {
        let mut kernel = Kernel::new();
        kernel
            .define(
                "Bench.Widget",
                ClassSpec::new()
                    .config("width", Value::from(100))
                    .config("height", Value::from(50))
                    .member(
                        "area",
                        native(|scope, _| {
                            let w = scope.get("width")?.as_int().unwrap_or(0);
                            let h = scope.get("height")?.as_int().unwrap_or(0);
                            Ok(Value::from(w * h))
                        }),
                    ),
            )
            .unwrap();
        b.iter(|| {
            let mut widget = kernel.create("Bench.Widget", &[]).unwrap();
            black_box(widget.call(&mut kernel, "area", &[]).unwrap())
        })
    });
}

criterion_group!(benches, bench_define_chain, bench_create_and_dispatch);
criterion_main!(benches);
