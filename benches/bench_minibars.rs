#![allow(
    clippy::tests_outside_test_module,
    clippy::unwrap_used,
    reason = "benchmark"
)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use minibars::{Template, Value, parse};

mod utils;

fn minibars_benchmark(c: &mut Criterion) {
    let template = Template::new(utils::PROFILE_TEMPLATE);
    template.compile().unwrap();

    let contexts: Vec<Value> = utils::generate_random_contexts(100)
        .into_iter()
        .map(Value::from)
        .collect();

    utils::print_binary_size();

    let mut group = c.benchmark_group("Template Rendering");
    group.sample_size(50);

    group.bench_function("minibars_render", |b| {
        b.iter(|| {
            for context in &contexts {
                black_box(template.render(context).unwrap());
            }
        });
    });

    let with_partial = Template::new(
        utils::PROFILE_TEMPLATE.replace("{{@index}}: {{name}} = {{value}}", "{{> item}}"),
    );
    with_partial
        .register_partial_string("item", utils::ITEM_PARTIAL)
        .unwrap();
    group.bench_function("minibars_render_partial", |b| {
        b.iter(|| {
            for context in &contexts {
                black_box(with_partial.render(context).unwrap());
            }
        });
    });

    group.bench_function("minibars_parse", |b| {
        b.iter(|| black_box(parse(black_box(utils::PROFILE_TEMPLATE)).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, minibars_benchmark);
criterion_main!(benches);
