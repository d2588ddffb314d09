// Lexical retrieval stack (spec 4.4): a shared tokenizer feeding an
// inverted index, two statistical rankers (TF-IDF, BM25), a boolean
// mini-language evaluator, and a fuzzy matcher. Grounded on the teacher's
// `TrigramIndex` (trigram_index.rs) generalized from character trigrams
// to whole-word tokens so phrase and proximity queries (spec 4.4.3) have
// meaningful positions to work with.

pub mod bm25;
pub mod boolean;
pub mod fuzzy;
pub mod inverted;
pub mod tfidf;
pub mod tokenizer;

pub use tokenizer::{tokenize, Token};
