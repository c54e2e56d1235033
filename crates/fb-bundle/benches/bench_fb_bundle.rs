use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fb_bundle::{pack_part, parse_bundle, render_bundle, unpack_part, BundleEntry};
use fb_compress::{CompressionConfig, Selector};

fn generate_entries(files: usize, lines_per_file: usize) -> Vec<BundleEntry> {
    (0..files)
        .map(|f| {
            let content = (0..lines_per_file)
                .map(|l| format!("    pub const FIELD_{l}: &str = \"value {}\";", if l == f { f } else { l }))
                .collect::<Vec<_>>()
                .join("\n");
            BundleEntry::new(format!("src/consts_{f}.rs"), content)
        })
        .collect()
}

fn bench_format(c: &mut Criterion) {
    let entries = generate_entries(100, 50);
    let text = render_bundle(&entries);
    c.bench_function("render_bundle_100_files", |b| {
        b.iter(|| black_box(render_bundle(black_box(&entries))))
    });
    c.bench_function("parse_bundle_100_files", |b| {
        b.iter(|| black_box(parse_bundle(black_box(&text))))
    });
}

fn bench_pack(c: &mut Criterion) {
    let selector = Selector::with_defaults(&CompressionConfig::default());
    let text = render_bundle(&generate_entries(10, 80));
    c.bench_function("pack_part_delta", |b| {
        b.iter(|| black_box(pack_part(&selector, black_box(text.as_bytes()), "delta")))
    });
    let (packed, _) = pack_part(&selector, text.as_bytes(), "delta").unwrap();
    c.bench_function("unpack_part_delta", |b| {
        b.iter(|| black_box(unpack_part(&selector, black_box(&packed))))
    });
}

criterion_group!(benches, bench_format, bench_pack);
criterion_main!(benches);
