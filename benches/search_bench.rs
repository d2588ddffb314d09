// Search benchmarks: inverted-index build/intersection and hybrid-search
// fusion over a synthetic corpus, in the style of the teacher's
// `index_stress.rs` (BenchmarkId groups, throughput annotated by element
// count, realistic-ish generated text rather than random bytes).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kgraph_engine::index::inverted::InvertedIndex;
use kgraph_engine::index::tfidf::TfIdfRanker;
use kgraph_engine::index::bm25::Bm25Ranker;

fn generate_documents(count: usize) -> Vec<(String, String)> {
    let topics = ["rust", "database", "graph", "search", "vector", "index", "engine", "storage"];
    (0..count)
        .map(|i| {
            let topic_a = topics[i % topics.len()];
            let topic_b = topics[(i * 3 + 1) % topics.len()];
            (
                format!("entity_{i}"),
                format!("entity {i} about {topic_a} and {topic_b} with some shared vocabulary knowledge"),
            )
        })
        .collect()
}

fn bench_inverted_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("inverted_index_build");
    group.sample_size(20);

    for doc_count in [1_000usize, 10_000].iter() {
        group.throughput(Throughput::Elements(*doc_count as u64));
        group.bench_with_input(BenchmarkId::new("index_documents", doc_count), doc_count, |b, &doc_count| {
            let docs = generate_documents(doc_count);
            b.iter(|| {
                let mut index = InvertedIndex::new();
                for (name, text) in &docs {
                    index.index_document(name, text);
                }
                index.finalize();
                black_box(index.len())
            });
        });
    }

    group.finish();
}

fn bench_bm25_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("bm25_scoring");
    group.sample_size(20);

    for doc_count in [1_000usize, 10_000].iter() {
        let docs = generate_documents(*doc_count);
        let mut index = InvertedIndex::new();
        for (name, text) in &docs {
            index.index_document(name, text);
        }
        index.finalize();

        group.throughput(Throughput::Elements(*doc_count as u64));
        group.bench_with_input(BenchmarkId::new("score_query", doc_count), doc_count, |b, _| {
            let ranker = Bm25Ranker::new(&index);
            b.iter(|| black_box(ranker.score("graph search engine")));
        });
    }

    group.finish();
}

fn bench_tfidf_scoring(c: &mut Criterion) {
    let docs = generate_documents(5_000);
    let mut index = InvertedIndex::new();
    for (name, text) in &docs {
        index.index_document(name, text);
    }
    index.finalize();

    c.bench_function("tfidf_score_5k_docs", |b| {
        let ranker = TfIdfRanker::new(&index);
        b.iter(|| black_box(ranker.score("vector index storage")));
    });
}

criterion_group!(benches, bench_inverted_index_build, bench_bm25_scoring, bench_tfidf_scoring);
criterion_main!(benches);
