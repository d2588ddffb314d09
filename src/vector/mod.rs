// Vector retrieval stack (spec 4.5): embedding providers, the cosine
// similarity store with optional scalar quantization, an LRU+TTL
// embedding cache, and the incremental indexer tying them together.

pub mod cache;
pub mod embeddings;
pub mod indexer;
pub mod store;
