use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use modpatch::compress::{Compression, CompressionProfile};
use modpatch::document::{Document, DocumentCodec, NativeCodec};
use modpatch::gdl::{self, Changelog};
use modpatch::patch::{self, Patch};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A map of `entries` records, each a small map with an int list.
fn gen_document(entries: usize, seed: u64) -> Document {
    let mut rng = StdRng::seed_from_u64(seed);
    let records: Document = (0..entries)
        .map(|i| {
            let values: Vec<Document> = (0..8).map(|_| Document::Int32(rng.random())).collect();
            let record: Document = [
                ("Name", Document::from(format!("Actor_{i:05}"))),
                ("Scale", Document::Float32(rng.random_range(0.0..10.0))),
                ("Values", Document::Array(values)),
            ]
            .into_iter()
            .collect();
            (format!("Record{i:05}"), record)
        })
        .collect();
    [("Records", records)].into_iter().collect()
}

/// Change every `stride`-th record's first value and drop one record.
fn mutate(doc: &Document, stride: usize) -> Document {
    let mut out = doc.clone();
    let Some(records) = out
        .as_map_mut()
        .and_then(|m| m.get_mut("Records"))
        .and_then(Document::as_map_mut)
    else {
        return out;
    };
    for (_, record) in records.iter_mut().step_by(stride.max(1)) {
        if let Some(values) = record
            .as_map_mut()
            .and_then(|m| m.get_mut("Values"))
            .and_then(Document::as_array_mut)
        {
            values[0] = Document::Int32(-1);
        }
    }
    records.shift_remove_index(0);
    out
}

fn gen_game_data(records: usize, seed: u64) -> Document {
    let mut rng = StdRng::seed_from_u64(seed);
    let ints: Vec<Document> = (0..records)
        .map(|i| {
            [
                ("Hash", Document::UInt32(i as u32)),
                ("DefaultValue", Document::Int32(rng.random())),
                ("ResetTypeValue", Document::Int32(0)),
                ("SaveFileIndex", Document::Int32(0)),
            ]
            .into_iter()
            .collect()
        })
        .collect();
    let data: Document = [("Int", Document::Array(ints))].into_iter().collect();
    [("Data", data)].into_iter().collect()
}

fn bench_diff(c: &mut Criterion) {
    let mut g = c.benchmark_group("document_diff");
    for entries in [100usize, 1_000, 10_000] {
        let reference = gen_document(entries, 1);
        let modified = mutate(&reference, 16);
        g.throughput(Throughput::Elements(entries as u64));
        g.bench_with_input(BenchmarkId::from_parameter(entries), &entries, |b, _| {
            b.iter(|| {
                let delta = patch::diff(black_box(&reference), black_box(&modified));
                black_box(delta);
            });
        });
    }
    g.finish();
}

fn bench_apply(c: &mut Criterion) {
    let mut g = c.benchmark_group("document_apply");
    for entries in [100usize, 1_000, 10_000] {
        let reference = gen_document(entries, 2);
        let delta = patch::diff(&reference, &mutate(&reference, 16));
        g.throughput(Throughput::Elements(entries as u64));
        g.bench_with_input(BenchmarkId::from_parameter(entries), &entries, |b, _| {
            b.iter(|| {
                let out = patch::apply(black_box(&reference), black_box(&delta));
                black_box(out);
            });
        });
    }
    g.finish();
}

fn bench_patch_wire(c: &mut Criterion) {
    let mut g = c.benchmark_group("patch_wire");
    let reference = gen_document(1_000, 3);
    let delta = patch::diff(&reference, &mutate(&reference, 4));
    let bytes = NativeCodec.encode(&delta.to_document()).unwrap();
    g.throughput(Throughput::Bytes(bytes.len() as u64));
    g.bench_function("decode", |b| {
        b.iter(|| {
            let doc = NativeCodec.decode(black_box(&bytes)).unwrap();
            black_box(Patch::from_document(&doc).unwrap());
        });
    });
    g.bench_function("encode", |b| {
        b.iter(|| black_box(NativeCodec.encode(&black_box(&delta).to_document()).unwrap()));
    });
    g.finish();
}

fn bench_changelog(c: &mut Criterion) {
    let mut g = c.benchmark_group("record_table_changelog");
    for records in [1_000usize, 10_000] {
        let reference = gen_game_data(records, 4);
        let modified = gen_game_data(records, 5);
        let changelog = gdl::create_changelog(&reference, &modified).unwrap();
        let bytes = changelog.to_bytes().unwrap();
        g.throughput(Throughput::Elements(records as u64));
        g.bench_with_input(BenchmarkId::new("create", records), &records, |b, _| {
            b.iter(|| black_box(gdl::create_changelog(&reference, &modified).unwrap()));
        });
        g.bench_with_input(BenchmarkId::new("apply", records), &records, |b, _| {
            b.iter(|| {
                let changelog = Changelog::from_bytes(black_box(&bytes)).unwrap();
                black_box(gdl::apply_changelog(reference.clone(), &changelog).unwrap());
            });
        });
    }
    g.finish();
}

fn bench_compression(c: &mut Criterion) {
    let mut g = c.benchmark_group("compression");
    let compression = Compression::default();
    let bytes = NativeCodec.encode(&gen_document(1_000, 6)).unwrap();
    let packed = compression.compress(&bytes, CompressionProfile::Common).unwrap();
    g.throughput(Throughput::Bytes(bytes.len() as u64));
    g.bench_function(compression.describe(), |b| {
        b.iter(|| {
            let out = compression
                .decompress(black_box(&packed), CompressionProfile::Common)
                .unwrap();
            black_box(out);
        });
    });
    g.finish();
}

criterion_group!(
    benches,
    bench_diff,
    bench_apply,
    bench_patch_wire,
    bench_changelog,
    bench_compression
);
criterion_main!(benches);
