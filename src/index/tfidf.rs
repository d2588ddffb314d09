// TF-IDF ranker over the shared inverted index (spec 4.4.1).

use std::collections::HashSet;

use crate::index::inverted::InvertedIndex;
use crate::index::tokenizer::tokenize_terms;

/// Which field(s) of the matched entity a query term landed in (spec 4.4).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchedFields {
    pub name: bool,
    pub entity_type: bool,
    pub observations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDoc {
    pub name: String,
    pub score: f64,
    pub matched_fields: MatchedFields,
}

pub struct TfIdfRanker<'a> {
    index: &'a InvertedIndex,
}

impl<'a> TfIdfRanker<'a> {
    pub fn new(index: &'a InvertedIndex) -> Self {
        Self { index }
    }

    /// Builds the `matchedFields` record for `doc_id` against `terms` by
    /// re-tokenizing the entity's recorded per-field text. Docs indexed via
    /// plain `index_document` (no field breakdown recorded) report no
    /// field matches even though they still score.
    fn matched_fields(&self, doc_id: u32, terms: &[String]) -> MatchedFields {
        let Some(fields) = self.index.fields_for(doc_id) else {
            return MatchedFields::default();
        };

        let term_set: HashSet<&str> = terms.iter().map(|t| t.as_str()).collect();
        let name_terms: HashSet<String> = tokenize_terms(&fields.name).into_iter().collect();
        let type_terms: HashSet<String> = tokenize_terms(&fields.entity_type).into_iter().collect();

        let name = name_terms.iter().any(|t| term_set.contains(t.as_str()));
        let entity_type = type_terms.iter().any(|t| term_set.contains(t.as_str()));

        let mut observations = Vec::new();
        for obs in &fields.observations {
            let obs_terms: HashSet<String> = tokenize_terms(obs).into_iter().collect();
            if obs_terms.iter().any(|t| term_set.contains(t.as_str())) {
                observations.push(obs.clone());
            }
        }

        MatchedFields { name, entity_type, observations }
    }

    pub fn score(&self, query: &str) -> Vec<ScoredDoc> {
        let terms = tokenize_terms(query);
        if terms.is_empty() || self.index.is_empty() {
            return Vec::new();
        }

        let total_docs = self.index.len() as f64;
        let matching = self.index.union(terms.iter().map(|t| t.as_str()));

        let mut scored = Vec::with_capacity(matching.len() as usize);
        for doc_id in matching.iter() {
            let doc_length = self.index.document_length(doc_id);
            if doc_length == 0 {
                continue;
            }

            let mut score = 0.0;
            for term in &terms {
                let df = self.index.document_frequency(term);
                if df == 0 {
                    continue;
                }
                let raw_tf = self.index.term_frequency(term, doc_id) as f64;
                if raw_tf == 0.0 {
                    continue;
                }
                let tf = raw_tf / doc_length as f64;
                // Smoothed idf so a term present in every document still
                // contributes a small positive weight.
                let idf = ((total_docs + 1.0) / (df as f64 + 1.0)).ln() + 1.0;
                score += tf * idf;
            }
            if score > 0.0 {
                if let Some(name) = self.index.doc_name(doc_id) {
                    scored.push(ScoredDoc {
                        name: name.to_string(),
                        score,
                        matched_fields: self.matched_fields(doc_id, &terms),
                    });
                }
            }
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        scored.truncate(200);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_documents_with_more_term_overlap_higher() {
        let mut index = InvertedIndex::new();
        index.index_document("Alice", "rust programming language rust");
        index.index_document("Bob", "rust is nice");
        index.index_document("Carol", "completely unrelated text");
        index.finalize();

        let ranker = TfIdfRanker::new(&index);
        let results = ranker.score("rust programming");
        assert_eq!(results[0].name, "Alice");
        assert!(results.iter().all(|r| r.name != "Carol"));
    }

    #[test]
    fn normalizes_term_frequency_by_document_length() {
        let mut index = InvertedIndex::new();
        // "rust" appears once in each, but Short is much shorter overall -
        // normalized tf should favor it over raw term count.
        index.index_document("Short", "rust");
        index.index_document("Long", "rust padding padding padding padding padding padding padding padding");
        index.finalize();

        let ranker = TfIdfRanker::new(&index);
        let results = ranker.score("rust");
        let rank_of = |name: &str| results.iter().position(|d| d.name == name).unwrap();
        assert!(rank_of("Short") < rank_of("Long"));
    }

    #[test]
    fn matched_fields_reports_which_field_the_query_hit() {
        let mut index = InvertedIndex::new();
        index.index_document_with_fields("Alice", "person", &["Loves rust programming".to_string()]);
        index.index_document_with_fields("Rusty", "rust_tool", &["unrelated observation".to_string()]);
        index.finalize();

        let ranker = TfIdfRanker::new(&index);
        let results = ranker.score("rust");

        let alice = results.iter().find(|d| d.name == "Alice").unwrap();
        assert!(!alice.matched_fields.name);
        assert!(!alice.matched_fields.entity_type);
        assert_eq!(alice.matched_fields.observations, vec!["Loves rust programming".to_string()]);

        let rusty = results.iter().find(|d| d.name == "Rusty").unwrap();
        assert!(rusty.matched_fields.entity_type);
        assert!(rusty.matched_fields.observations.is_empty());
    }
}
