use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use docrank::fts::{Bm25Params, Bm25Search};
use docrank::store::{ChunkRecord, VectorStore};

const CORPUS_SIZE: usize = 1000;
const DIMENSION: usize = 384;

fn synthetic_texts() -> Vec<String> {
    let vocab = [
        "retrieval", "ranking", "index", "vector", "token", "query", "chunk", "score", "corpus",
        "feedback",
    ];
    (0..CORPUS_SIZE)
        .map(|i| {
            (0..30)
                .map(|j| vocab[(i * 7 + j * 3) % vocab.len()])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn synthetic_vector(seed: usize) -> Vec<f32> {
    (0..DIMENSION)
        .map(|j| ((seed + j) as f32 * 0.01).sin())
        .collect()
}

fn benchmark_bm25_search(c: &mut Criterion) {
    let mut index = Bm25Search::new(Bm25Params::default());
    let texts = synthetic_texts();
    index.index_documents(&texts);

    let mut group = c.benchmark_group("bm25_search");
    for (name, query) in [
        ("single_term", "retrieval"),
        ("multi_term", "vector ranking feedback score"),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &query, |b, &q| {
            b.iter(|| black_box(index.search(q, 10)));
        });
    }
    group.finish();
}

fn benchmark_vector_search(c: &mut Criterion) {
    let mut store = VectorStore::new(DIMENSION);
    let vectors: Vec<Vec<f32>> = (0..CORPUS_SIZE).map(synthetic_vector).collect();
    let records: Vec<ChunkRecord> = (0..CORPUS_SIZE)
        .map(|i| ChunkRecord {
            id: 0,
            source_file: format!("doc_{}.md", i / 10),
            title: String::new(),
            chunk_index: i % 10,
            text: String::new(),
            extra: serde_json::Map::new(),
        })
        .collect();
    store.add_documents(vectors, records).unwrap();

    let query = synthetic_vector(CORPUS_SIZE / 2);
    c.bench_function("brute_force_cosine_1000x384", |b| {
        b.iter(|| black_box(store.search(&query, 10).unwrap()));
    });
}

criterion_group!(benches, benchmark_bm25_search, benchmark_vector_search);
criterion_main!(benches);
