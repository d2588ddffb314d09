// Shared tokenizer used by the inverted index, TF-IDF and BM25 rankers, and
// the boolean query evaluator, so "same text tokenizes the same way
// everywhere" holds by construction (spec 4.4 shared-tokenizer invariant).

use serde::{Deserialize, Serialize};

/// A token and its zero-based position within the source text, needed by
/// phrase (`"a b"`) and proximity (`a~3`) boolean-query operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub position: usize,
}

/// Lowercases and splits on runs of non-alphanumeric characters. Unicode
/// aware via `char::is_alphanumeric` rather than an ASCII-only split.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut position = 0usize;

    let mut flush = |current: &mut String, position: &mut usize, tokens: &mut Vec<Token>| {
        if !current.is_empty() {
            tokens.push(Token {
                text: std::mem::take(current),
                position: *position,
            });
            *position += 1;
        }
    };

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            current.extend(ch.to_lowercase());
        } else {
            flush(&mut current, &mut position, &mut tokens);
        }
    }
    flush(&mut current, &mut position, &mut tokens);

    tokens
}

/// Just the term strings, in order - the common case for building postings.
pub fn tokenize_terms(text: &str) -> Vec<String> {
    tokenize(text).into_iter().map(|t| t.text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_punctuation_and_lowercases() {
        let tokens = tokenize_terms("Alice, meet Bob's friend!");
        assert_eq!(tokens, vec!["alice", "meet", "bob", "s", "friend"]);
    }

    #[test]
    fn positions_are_contiguous() {
        let tokens = tokenize("one two three");
        let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn empty_text_yields_no_tokens() {
        assert!(tokenize("   !!! ").is_empty());
    }
}
