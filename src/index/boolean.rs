// Boolean query mini-language: term / "phrase" / "phrase"~N proximity /
// wildcard* / field:value / NOT / AND / OR (spec 4.4.3). No parentheses -
// a query is an OR of AND-groups, each clause optionally negated. Clause
// count is capped so a pathological query can't blow up evaluation cost,
// the flat-grammar analogue of the teacher's recursion-depth guards
// elsewhere in the corpus (e.g. `search_validation.rs`).

use roaring::RoaringBitmap;

use crate::error::{GraphError, Result};
use crate::index::inverted::InvertedIndex;

pub const MAX_CLAUSES: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Term(String),
    Phrase(Vec<String>),
    Proximity(Vec<String>, u32),
    Wildcard(String),
    Field(String, String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub atom: Atom,
    pub negated: bool,
}

/// An OR of AND-groups: `groups[i]` clauses are ANDed, groups are ORed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BooleanQuery {
    pub groups: Vec<Vec<Clause>>,
}

pub fn parse(input: &str) -> Result<BooleanQuery> {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    let mut total_clauses = 0usize;

    for raw_group in split_on_or(input) {
        current.clear();
        for token in tokenize_query(raw_group) {
            total_clauses += 1;
            if total_clauses > MAX_CLAUSES {
                return Err(GraphError::validation(format!(
                    "query exceeds {MAX_CLAUSES} clauses"
                )));
            }
            current.push(parse_clause(&token)?);
        }
        if !current.is_empty() {
            groups.push(std::mem::take(&mut current));
        }
    }

    Ok(BooleanQuery { groups })
}

fn split_on_or(input: &str) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut rest = input;
    loop {
        if let Some(pos) = find_word(rest, "OR") {
            groups.push(&rest[..pos]);
            rest = &rest[pos + 2..];
        } else {
            groups.push(rest);
            break;
        }
    }
    groups
}

fn find_word(haystack: &str, word: &str) -> Option<usize> {
    let upper = haystack.to_uppercase();
    let mut start = 0;
    while let Some(idx) = upper[start..].find(word) {
        let absolute = start + idx;
        let before_ok = absolute == 0 || !haystack.as_bytes()[absolute - 1].is_ascii_alphanumeric();
        let after = absolute + word.len();
        let after_ok = after >= haystack.len() || !haystack.as_bytes()[after].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return Some(absolute);
        }
        start = absolute + word.len();
    }
    None
}

/// Splits a group into tokens, keeping quoted phrases intact.
fn tokenize_query(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    let mut current = String::new();

    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        if ch == '"' {
            chars.next();
            current.push('"');
            for c in chars.by_ref() {
                current.push(c);
                if c == '"' {
                    break;
                }
            }
            // Optional trailing `~N` slop modifier directly after the phrase.
            if chars.peek() == Some(&'~') {
                current.push(chars.next().unwrap());
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        current.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
            }
            tokens.push(std::mem::take(&mut current));
            continue;
        }
        current.push(ch);
        chars.next();
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
        .into_iter()
        .filter(|t| !t.eq_ignore_ascii_case("AND"))
        .collect()
}

fn parse_clause(token: &str) -> Result<Clause> {
    let (negated, body) = if let Some(rest) = token.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = token.strip_prefix("NOT") {
        if rest.starts_with(|c: char| !c.is_alphanumeric()) || rest.is_empty() {
            (true, rest.trim_start_matches(':').trim())
        } else {
            (false, token)
        }
    } else {
        (false, token)
    };

    if body.is_empty() {
        return Err(GraphError::validation("empty clause in boolean query"));
    }

    let atom = if let Some(phrase) = body.strip_prefix('"') {
        let (quoted, slop) = match phrase.rsplit_once("\"~") {
            Some((inner, n)) => (inner, n.parse::<u32>().ok()),
            None => (phrase.trim_end_matches('"'), None),
        };
        let terms: Vec<String> = quoted
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        if terms.is_empty() {
            return Err(GraphError::validation("empty phrase in boolean query"));
        }
        match slop {
            Some(n) => Atom::Proximity(terms, n),
            None => Atom::Phrase(terms),
        }
    } else if let Some((field, value)) = body.split_once(':') {
        Atom::Field(field.to_lowercase(), value.to_lowercase())
    } else if let Some(prefix) = body.strip_suffix('*') {
        Atom::Wildcard(prefix.to_lowercase())
    } else {
        Atom::Term(body.to_lowercase())
    };

    Ok(Clause { atom, negated })
}

/// Evaluates `query` against `index`, using `field_match` to resolve
/// `field:value` clauses (e.g. `type:person`, `tag:urgent`) against
/// entity metadata the inverted index doesn't carry.
pub fn evaluate(
    query: &BooleanQuery,
    index: &InvertedIndex,
    field_match: impl Fn(&str, &str) -> RoaringBitmap,
) -> RoaringBitmap {
    let universe: RoaringBitmap = index.doc_names().filter_map(|name| index.doc_id(name)).collect();

    let mut result = RoaringBitmap::new();
    for group in &query.groups {
        let mut group_set = universe.clone();
        for clause in group {
            let matches = match &clause.atom {
                Atom::Term(term) => index.docs_for_term(term),
                Atom::Phrase(terms) => phrase_match(index, terms, 0),
                Atom::Proximity(terms, slop) => phrase_match(index, terms, *slop),
                Atom::Wildcard(prefix) => wildcard_match(index, prefix),
                Atom::Field(field, value) => field_match(field, value),
            };
            if clause.negated {
                group_set -= matches;
            } else {
                group_set &= matches;
            }
        }
        result |= group_set;
    }
    result
}

fn wildcard_match(index: &InvertedIndex, prefix: &str) -> RoaringBitmap {
    let mut result = RoaringBitmap::new();
    for term in index.known_terms() {
        if term.starts_with(prefix) {
            result |= index.docs_for_term(&term);
        }
    }
    result
}

fn phrase_match(index: &InvertedIndex, terms: &[String], slop: u32) -> RoaringBitmap {
    if terms.is_empty() {
        return RoaringBitmap::new();
    }
    let candidates = index.intersect(terms.iter().map(|t| t.as_str()));
    let mut result = RoaringBitmap::new();
    for doc_id in candidates.iter() {
        if positions_within_slop(index, terms, doc_id, slop) {
            result.insert(doc_id);
        }
    }
    result
}

fn positions_within_slop(index: &InvertedIndex, terms: &[String], doc_id: u32, slop: u32) -> bool {
    let Some(first_positions) = index.positions(&terms[0], doc_id) else {
        return false;
    };
    for &start in first_positions {
        let mut ok = true;
        for (offset, term) in terms.iter().enumerate().skip(1) {
            let Some(positions) = index.positions(term, doc_id) else {
                ok = false;
                break;
            };
            let expected = start as i64 + offset as i64;
            let within = positions
                .iter()
                .any(|&p| (p as i64 - expected).unsigned_abs() <= slop as u64);
            if !within {
                ok = false;
                break;
            }
        }
        if ok {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_term_and_negation_and_phrase() {
        let q = parse(r#"rust -java "systems language""#).unwrap();
        assert_eq!(q.groups.len(), 1);
        assert_eq!(q.groups[0].len(), 3);
        assert!(!q.groups[0][0].negated);
        assert!(q.groups[0][1].negated);
        assert_eq!(q.groups[0][2].atom, Atom::Phrase(vec!["systems".into(), "language".into()]));
    }

    #[test]
    fn splits_or_groups() {
        let q = parse("rust OR golang").unwrap();
        assert_eq!(q.groups.len(), 2);
    }

    #[test]
    fn rejects_queries_over_the_clause_cap() {
        let long_query = (0..MAX_CLAUSES + 1)
            .map(|i| format!("term{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        assert!(parse(&long_query).is_err());
    }

    #[test]
    fn evaluates_and_with_negation() {
        let mut index = InvertedIndex::new();
        index.index_document("Alice", "rust systems programming");
        index.index_document("Bob", "rust web programming");
        index.finalize();

        let q = parse("rust -web").unwrap();
        let matches = evaluate(&q, &index, |_, _| RoaringBitmap::new());
        assert_eq!(matches.len(), 1);
        assert_eq!(index.doc_name(matches.min().unwrap()), Some("Alice"));
    }
}
