use conduit::*;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn passthrough(depth: usize) -> MiddlewareSpec {
    MiddlewareSpec::seq((0..depth).map(|_| {
        MiddlewareSpec::callable(|request, next| next.handle(request))
    }))
}

fn bench_normalize(c: &mut Criterion) {
    let registry = MiddlewareRegistry::new();
    let mut group = c.benchmark_group("normalize");

    group.bench_function("flat_10", |b| {
        b.iter(|| normalize(black_box(passthrough(10)), &registry).unwrap())
    });

    group.bench_function("nested_10", |b| {
        b.iter(|| {
            let spec = MiddlewareSpec::seq([
                passthrough(3),
                MiddlewareSpec::seq([MiddlewareSpec::Empty, passthrough(4)]),
                passthrough(3),
            ]);
            normalize(black_box(spec), &registry).unwrap()
        })
    });

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    for depth in [1, 10, 50] {
        group.bench_function(format!("chain_{}", depth), |b| {
            b.iter(|| {
                let mut app = App::new();
                app.use_middleware(passthrough(depth)).unwrap();
                app.handle(black_box(HttpRequest::get("/"))).unwrap()
            })
        });
    }

    group.bench_function("chain_10_with_listener", |b| {
        b.iter(|| {
            let events = EventManager::new();
            events.attach(BEFORE_DISPATCH, listener(|_| {}), 0);
            let mut app = App::builder().events(events).build();
            app.use_middleware(passthrough(10)).unwrap();
            app.handle(black_box(HttpRequest::get("/"))).unwrap()
        })
    });

    group.finish();
}

fn bench_validation(c: &mut Criterion) {
    let request = HttpRequest::get("/users/1");
    let ok = HttpResponse::ok();
    let missing = HttpResponse::not_found();

    c.bench_function("validate_ok", |b| {
        b.iter(|| validate_response(black_box(&request), black_box(&ok)))
    });
    c.bench_function("validate_404", |b| {
        b.iter(|| validate_response(black_box(&request), black_box(&missing)))
    });
}

criterion_group!(benches, bench_normalize, bench_dispatch, bench_validation);
criterion_main!(benches);
