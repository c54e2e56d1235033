use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fb_core::markers::{content_spans, CONTENT_BEGIN, CONTENT_END, CONTENT_SENTINEL};

fn generate_bundle(files: usize, lines_per_file: usize) -> String {
    let mut text = String::new();
    for f in 0..files {
        text.push_str(&format!("## File: src/module_{f}.rs\n\nSize: 0 bytes\n\n{CONTENT_BEGIN}\n"));
        for l in 0..lines_per_file {
            text.push_str(&format!("    let value_{l} = compute({f}, {l});\n"));
        }
        text.push_str(&format!("{CONTENT_SENTINEL}\n{CONTENT_END}\n\n"));
    }
    text
}

fn bench_content_spans(c: &mut Criterion) {
    for &(name, files) in &[("10_files", 10), ("100_files", 100), ("1000_files", 1000)] {
        let bundle = generate_bundle(files, 50);
        let lines: Vec<&str> = bundle.split('\n').collect();
        c.bench_function(&format!("content_spans_{name}"), |b| {
            b.iter(|| black_box(content_spans(black_box(&lines))))
        });
    }
}

criterion_group!(benches, bench_content_spans);
criterion_main!(benches);
