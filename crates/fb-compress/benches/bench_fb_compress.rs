use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fb_compress::{
    CompressionConfig, DeltaStrategy, DictionaryStrategy, Selector, Strategy, TemplateStrategy,
};

fn generate_bundle(files: usize, lines_per_file: usize) -> String {
    let mut text = String::new();
    for f in 0..files {
        let mut content = Vec::with_capacity(lines_per_file);
        for l in 0..lines_per_file {
            // Every file shares most lines with the previous one.
            let variant = if l % 17 == f % 17 { f } else { 0 };
            content.push(format!("    let value_{l} = compute(input_{l}, {variant});"));
        }
        let content = content.join("\n");
        text.push_str(&format!(
            "## File: src/module_{f}.rs\n\nSize: {} bytes\n\n--- FILE CONTENT BEGIN ---\n{content}\n@CONTENT-END@\n--- FILE CONTENT END ---\n\n",
            content.len()
        ));
    }
    text
}

fn bench_strategies(c: &mut Criterion) {
    let bundle = generate_bundle(10, 100);
    let config = CompressionConfig::default();
    let strategies: Vec<(&str, Box<dyn Strategy>)> = vec![
        ("dictionary", Box::new(DictionaryStrategy::with_config(config.dictionary.clone()))),
        ("template", Box::new(TemplateStrategy::with_config(config.template.clone()))),
        ("delta", Box::new(DeltaStrategy::with_config(config.delta.clone()))),
    ];
    for (name, strategy) in &strategies {
        c.bench_function(&format!("compress_{name}_10_files"), |b| {
            b.iter(|| black_box(strategy.compress(black_box(bundle.as_bytes()))))
        });
        let out = strategy.compress(bundle.as_bytes()).unwrap();
        c.bench_function(&format!("decompress_{name}_10_files"), |b| {
            b.iter(|| black_box(strategy.decompress(black_box(&out.bytes), &out.metadata)))
        });
    }
}

fn bench_auto_select(c: &mut Criterion) {
    let selector = Selector::with_defaults(&CompressionConfig::default());
    for &(name, files) in &[("5_files", 5), ("20_files", 20)] {
        let bundle = generate_bundle(files, 60);
        c.bench_function(&format!("auto_compress_{name}"), |b| {
            b.iter(|| black_box(selector.compress(black_box(bundle.as_bytes()))))
        });
    }
}

criterion_group!(benches, bench_strategies, bench_auto_select);
criterion_main!(benches);
