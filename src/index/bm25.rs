// BM25 ranker sharing the TF-IDF ranker's tokenizer and inverted index
// (spec 4.4.2). Defaults (k1 = 1.2, b = 0.75) match the parameters used
// throughout the IR literature and by the teacher's scoring heuristics in
// `trigram_index.rs` (`calculate_relevance_score`), generalized into the
// standard BM25 formula.

use crate::index::inverted::InvertedIndex;
use crate::index::tfidf::ScoredDoc;
use crate::index::tokenizer::tokenize_terms;

#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

pub struct Bm25Ranker<'a> {
    index: &'a InvertedIndex,
    params: Bm25Params,
}

impl<'a> Bm25Ranker<'a> {
    pub fn new(index: &'a InvertedIndex) -> Self {
        Self::with_params(index, Bm25Params::default())
    }

    pub fn with_params(index: &'a InvertedIndex, params: Bm25Params) -> Self {
        Self { index, params }
    }

    pub fn score(&self, query: &str) -> Vec<ScoredDoc> {
        let terms = tokenize_terms(query);
        if terms.is_empty() || self.index.is_empty() {
            return Vec::new();
        }

        let total_docs = self.index.len() as f64;
        let avg_len = self.index.average_document_length().max(1.0);
        let matching = self.index.union(terms.iter().map(|t| t.as_str()));

        let mut scored = Vec::with_capacity(matching.len() as usize);
        for doc_id in matching.iter() {
            let doc_len = self.index.document_length(doc_id) as f64;
            let mut score = 0.0;
            for term in &terms {
                let df = self.index.document_frequency(term);
                if df == 0 {
                    continue;
                }
                let tf = self.index.term_frequency(term, doc_id) as f64;
                if tf == 0.0 {
                    continue;
                }
                let idf = ((total_docs - df as f64 + 0.5) / (df as f64 + 0.5) + 1.0).ln();
                let numerator = tf * (self.params.k1 + 1.0);
                let denominator =
                    tf + self.params.k1 * (1.0 - self.params.b + self.params.b * doc_len / avg_len);
                score += idf * (numerator / denominator);
            }
            if score > 0.0 {
                if let Some(name) = self.index.doc_name(doc_id) {
                    scored.push(ScoredDoc {
                        name: name.to_string(),
                        score,
                    });
                }
            }
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longer_documents_are_length_normalized() {
        let mut index = InvertedIndex::new();
        index.index_document("Short", "rust");
        index.index_document(
            "Long",
            "rust rust rust filler filler filler filler filler filler filler",
        );
        index.finalize();

        let ranker = Bm25Ranker::new(&index);
        let results = ranker.score("rust");
        assert_eq!(results.len(), 2);
        // Both contain the term; the BM25 formula shouldn't blow up or
        // produce negative scores.
        assert!(results.iter().all(|r| r.score > 0.0));
    }
}
