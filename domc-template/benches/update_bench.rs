use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use domc_core::{Scope, Value};
use domc_dom::Document;
use domc_template::compile_str;

fn row_markup(count: usize) -> String {
    let mut markup = String::from(r#"<ul class="${mode}">"#);
    for i in 0..count {
        markup.push_str(&format!(
            r#"<li title="row {i}" class="${{sel === {i} ? 'on' : 'off'}}" onclick="${{pick({i})}}">${{labels[{i}]}}</li>"#
        ));
    }
    markup.push_str("</ul>");
    markup
}

fn scope(sel: usize, labels: &Value) -> Scope {
    Scope::new()
        .with("mode", "list")
        .with("sel", sel)
        .with("labels", labels.clone())
        .with("pick", Value::function(|_| Value::Undefined))
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("template_update");
    group.sample_size(20);
    for &count in &[10usize, 100usize, 500usize] {
        let template = compile_str(&row_markup(count)).expect("compile");
        let labels = Value::list((0..count).map(|i| Value::from(format!("item {i}"))));
        let doc = Document::new();
        let mut inst = template
            .create_instance(&doc, &scope(0, &labels))
            .expect("create");

        group.bench_with_input(BenchmarkId::new("unchanged", count), &count, |b, _| {
            let s = scope(0, &labels);
            b.iter(|| inst.update(&doc, &s).expect("update"));
        });
        group.bench_with_input(BenchmarkId::new("selection", count), &count, |b, &n| {
            let mut sel = 0;
            b.iter(|| {
                sel = (sel + 1) % n;
                inst.update(&doc, &scope(sel, &labels)).expect("update")
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().without_plots();
    targets = bench_update
}
criterion_main!(benches);
