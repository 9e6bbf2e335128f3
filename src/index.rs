//! Inverted search index over atom text.
//!
//! Maintains a forward map `token → atoms` and a reverse map
//! `atom → tokens`. The reverse map makes re-indexing a diff and deletion
//! O(tokens of the atom) instead of a scan over every bucket.
//!
//! Lookups are exact, case-insensitive, whole-token matches. There is no
//! prefix, substring or fuzzy matching; [`SearchIndex::suggest`] only offers
//! similar terms for display.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::types::{AtomId, KnowledgeAtom};

/// Tokens of this many characters or fewer are not indexed.
pub const MIN_TOKEN_CHARS: usize = 3;

/// Bigram similarity above which an index term is suggested.
const SUGGESTION_THRESHOLD: f64 = 0.7;

/// Forward and reverse index disagree with each other or with the store.
///
/// Indicates a bug; never caused by user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexConsistencyError {
    /// A forward bucket lists an atom whose reverse entry lacks the token.
    #[error("token `{token}` lists atom {atom_id} but the reverse entry does not")]
    ForwardOnly {
        /// Token bucket.
        token: String,
        /// Atom listed in the bucket.
        atom_id: AtomId,
    },
    /// A reverse entry names a token whose bucket lacks the atom.
    #[error("atom {atom_id} claims token `{token}` but the bucket does not list it")]
    ReverseOnly {
        /// Claimed token.
        token: String,
        /// Atom with the reverse entry.
        atom_id: AtomId,
    },
    /// The index has an entry for an atom the store does not hold.
    #[error("index has entries for unknown atom {0}")]
    UnknownAtom(AtomId),
    /// The store holds an atom the index has never seen.
    #[error("atom {0} is not indexed")]
    MissingAtom(AtomId),
    /// A forward bucket exists but is empty.
    #[error("token `{0}` has an empty bucket")]
    EmptyBucket(String),
}

/// Normalize a raw word into an index token.
///
/// Lowercases, trims surrounding punctuation and drops short tokens.
pub fn normalize_token(raw: &str) -> Option<String> {
    let token = raw
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    (token.chars().count() >= MIN_TOKEN_CHARS).then_some(token)
}

fn push_words(text: &str, tokens: &mut BTreeSet<String>) {
    tokens.extend(text.split_whitespace().filter_map(normalize_token));
}

/// Tokens an atom contributes to the index.
///
/// Text fields, references and related atom ids are split on whitespace and
/// normalized exactly like query terms, so an id such as `vit-k2` is one
/// token and is found by the same text a caller would search for.
pub fn tokenize_atom(atom: &KnowledgeAtom) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    push_words(&atom.title, &mut tokens);
    push_words(&atom.polish_title, &mut tokens);
    push_words(&atom.content, &mut tokens);
    push_words(&atom.polish_content, &mut tokens);
    for reference in &atom.references {
        push_words(reference, &mut tokens);
    }
    for related in &atom.related_atoms {
        push_words(related.as_str(), &mut tokens);
    }
    tokens
}

/// Normalized terms of a free-text query, in query order without repeats.
pub fn query_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in text.split_whitespace().filter_map(normalize_token) {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Token changes caused by re-indexing one atom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDelta {
    /// Tokens the atom gained.
    pub added: usize,
    /// Tokens the atom lost.
    pub removed: usize,
}

impl IndexDelta {
    /// Whether the atom's token set changed.
    pub fn is_changed(&self) -> bool {
        self.added > 0 || self.removed > 0
    }
}

/// Inverted index with a reverse map for cheap updates.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    forward: BTreeMap<String, BTreeSet<AtomId>>,
    reverse: BTreeMap<AtomId, BTreeSet<String>>,
}

impl SearchIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index (or re-index) an atom, diffing against its previous tokens.
    pub fn index_atom(&mut self, atom: &KnowledgeAtom) -> IndexDelta {
        let new_tokens = tokenize_atom(atom);
        let old_tokens = self.reverse.remove(&atom.id).unwrap_or_default();

        let mut delta = IndexDelta::default();
        for stale in old_tokens.difference(&new_tokens) {
            self.detach(stale, &atom.id);
            delta.removed += 1;
        }
        for fresh in new_tokens.difference(&old_tokens) {
            self.forward
                .entry(fresh.clone())
                .or_default()
                .insert(atom.id.clone());
            delta.added += 1;
        }

        self.reverse.insert(atom.id.clone(), new_tokens);
        delta
    }

    /// Remove every entry for an atom. Returns whether it was indexed.
    pub fn remove_atom(&mut self, id: &AtomId) -> bool {
        let Some(tokens) = self.reverse.remove(id) else {
            return false;
        };
        for token in &tokens {
            self.detach(token, id);
        }
        true
    }

    fn detach(&mut self, token: &str, id: &AtomId) {
        if let Some(bucket) = self.forward.get_mut(token) {
            bucket.remove(id);
            if bucket.is_empty() {
                self.forward.remove(token);
            }
        }
    }

    /// Atoms containing `term` (case-insensitive, whole token).
    pub fn lookup(&self, term: &str) -> Option<&BTreeSet<AtomId>> {
        self.forward.get(&term.trim().to_lowercase())
    }

    /// Atoms containing every term of `text`.
    ///
    /// A query without indexable terms matches nothing.
    pub fn lookup_all(&self, text: &str) -> BTreeSet<AtomId> {
        let terms = query_terms(text);
        let mut buckets = Vec::with_capacity(terms.len());
        for term in &terms {
            match self.forward.get(term) {
                Some(bucket) => buckets.push(bucket),
                None => return BTreeSet::new(),
            }
        }
        buckets.sort_by_key(|b| b.len());

        let mut iter = buckets.into_iter();
        let Some(first) = iter.next() else {
            return BTreeSet::new();
        };
        let mut result = first.clone();
        for bucket in iter {
            result.retain(|id| bucket.contains(id));
        }
        result
    }

    /// Tokens recorded for an atom.
    pub fn tokens_of(&self, id: &AtomId) -> Option<&BTreeSet<String>> {
        self.reverse.get(id)
    }

    /// Index terms similar to `term`, most similar first.
    pub fn suggest(&self, term: &str, limit: usize) -> Vec<String> {
        let needle = term.trim().to_lowercase();
        let needle_bigrams = bigrams(&needle);
        if needle_bigrams.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &String)> = self
            .forward
            .keys()
            .filter(|candidate| **candidate != needle)
            .filter_map(|candidate| {
                let score = bigram_dice(&needle_bigrams, &bigrams(candidate));
                (score > SUGGESTION_THRESHOLD).then_some((score, candidate))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(b.1))
        });
        scored.into_iter().take(limit).map(|(_, t)| t.clone()).collect()
    }

    /// Number of distinct tokens.
    pub fn term_count(&self) -> usize {
        self.forward.len()
    }

    /// Number of indexed atoms.
    pub fn atom_count(&self) -> usize {
        self.reverse.len()
    }

    /// Whether nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }

    /// Rebuild from scratch.
    pub fn rebuild<'a>(&mut self, atoms: impl IntoIterator<Item = &'a KnowledgeAtom>) {
        self.clear();
        for atom in atoms {
            self.index_atom(atom);
        }
    }

    /// Verify forward and reverse maps agree with each other and with the
    /// set of stored atom ids.
    pub fn check_consistency<'a>(
        &self,
        atom_ids: impl IntoIterator<Item = &'a AtomId>,
    ) -> Result<(), IndexConsistencyError> {
        let stored: BTreeSet<&AtomId> = atom_ids.into_iter().collect();

        for id in &stored {
            if !self.reverse.contains_key(*id) {
                return Err(IndexConsistencyError::MissingAtom((*id).clone()));
            }
        }

        for (id, tokens) in &self.reverse {
            if !stored.contains(id) {
                return Err(IndexConsistencyError::UnknownAtom(id.clone()));
            }
            for token in tokens {
                let listed = self.forward.get(token).is_some_and(|b| b.contains(id));
                if !listed {
                    return Err(IndexConsistencyError::ReverseOnly {
                        token: token.clone(),
                        atom_id: id.clone(),
                    });
                }
            }
        }

        for (token, bucket) in &self.forward {
            if bucket.is_empty() {
                return Err(IndexConsistencyError::EmptyBucket(token.clone()));
            }
            for id in bucket {
                let claimed = self.reverse.get(id).is_some_and(|t| t.contains(token));
                if !claimed {
                    return Err(IndexConsistencyError::ForwardOnly {
                        token: token.clone(),
                        atom_id: id.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn bigrams(term: &str) -> Vec<(char, char)> {
    let chars: Vec<char> = term.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

fn bigram_dice(a: &[(char, char)], b: &[(char, char)]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 0.0;
    }
    let mut remaining = b.to_vec();
    let mut common = 0usize;
    for pair in a {
        if let Some(pos) = remaining.iter().position(|p| p == pair) {
            remaining.swap_remove(pos);
            common += 1;
        }
    }
    (2 * common) as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AtomType, EvidenceLevel};

    fn make_atom(id: &str, title: &str, content: &str) -> KnowledgeAtom {
        KnowledgeAtom::new(id, AtomType::Fact, "neuro", title, content, EvidenceLevel::Moderate)
    }

    #[test]
    fn test_tokenize_lowercases_and_drops_short() {
        let atom = make_atom("a1", "Vitamin D and Bone Health", "It is good.")
            .with_polish("Witamina D", "Zdrowie kości")
            .with_reference("Holick 2007")
            .with_related("vit-k2");
        let tokens = tokenize_atom(&atom);

        for expected in ["vitamin", "and", "bone", "health", "good", "witamina", "zdrowie", "kości", "holick", "2007", "vit-k2"] {
            assert!(tokens.contains(expected), "missing {}", expected);
        }
        assert!(!tokens.contains("d"));
        assert!(!tokens.contains("it"));
        assert!(!tokens.contains("is"));
        assert!(!tokens.contains("good."));
    }

    #[test]
    fn test_related_ids_match_query_normalization() {
        let mut index = SearchIndex::new();
        index.index_atom(
            &make_atom("a1", "Calcium routing", "Directs calcium to bone")
                .with_related("Vit.D.")
                .with_related("omega 3 blend"),
        );

        for query in ["vit.d.", "Vit.D", "(vit.d)", "blend", "omega"] {
            assert_eq!(index.lookup_all(query), BTreeSet::from([AtomId::from("a1")]), "query {}", query);
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive_whole_token() {
        let mut index = SearchIndex::new();
        index.index_atom(&make_atom("a1", "Magnesium glycinate", "Supports sleep quality"));

        assert!(index.lookup("MAGNESIUM").unwrap().contains(&AtomId::from("a1")));
        assert!(index.lookup("magnes").is_none());
        assert!(index.lookup("glycinate sleep").is_none());
    }

    #[test]
    fn test_reindex_removes_stale_tokens() {
        let mut index = SearchIndex::new();
        let atom = make_atom("a1", "Magnesium glycinate", "Supports sleep quality");
        index.index_atom(&atom);

        let mut updated = atom.clone();
        updated.title = "Zinc picolinate".to_string();
        let delta = index.index_atom(&updated);

        assert_eq!(delta.removed, 2);
        assert_eq!(delta.added, 2);
        assert!(index.lookup("magnesium").is_none());
        assert!(index.lookup("zinc").unwrap().contains(&AtomId::from("a1")));
        assert!(index.lookup("sleep").is_some());
        index.check_consistency([&AtomId::from("a1")]).unwrap();
    }

    #[test]
    fn test_reindex_unchanged_is_noop() {
        let mut index = SearchIndex::new();
        let atom = make_atom("a1", "Magnesium glycinate", "Supports sleep quality");
        index.index_atom(&atom);
        assert!(!index.index_atom(&atom).is_changed());
    }

    #[test]
    fn test_remove_atom_clears_buckets() {
        let mut index = SearchIndex::new();
        index.index_atom(&make_atom("a1", "Shared words here", "Unique alpha content"));
        index.index_atom(&make_atom("a2", "Shared words here", "Unique beta content"));

        assert!(index.remove_atom(&AtomId::from("a1")));
        assert!(!index.remove_atom(&AtomId::from("a1")));

        assert!(index.lookup("alpha").is_none());
        assert_eq!(index.lookup("shared").unwrap().len(), 1);
        index.check_consistency([&AtomId::from("a2")]).unwrap();
    }

    #[test]
    fn test_lookup_all_intersects_terms() {
        let mut index = SearchIndex::new();
        index.index_atom(&make_atom("a1", "GABA receptor", "Anxiety reduction pathway"));
        index.index_atom(&make_atom("a2", "GABA synthesis", "Glutamate decarboxylase pathway"));

        let both = index.lookup_all("gaba pathway");
        assert_eq!(both.len(), 2);

        let one = index.lookup_all("GABA anxiety");
        assert_eq!(one.into_iter().collect::<Vec<_>>(), vec![AtomId::from("a1")]);

        assert!(index.lookup_all("gaba missing").is_empty());
        assert!(index.lookup_all("a b").is_empty());
    }

    #[test]
    fn test_consistency_detects_unknown_and_missing() {
        let mut index = SearchIndex::new();
        index.index_atom(&make_atom("a1", "Magnesium glycinate", "Supports sleep quality"));

        assert_eq!(
            index.check_consistency(std::iter::empty()),
            Err(IndexConsistencyError::UnknownAtom(AtomId::from("a1")))
        );
        let ids = [AtomId::from("a1"), AtomId::from("a2")];
        assert_eq!(
            index.check_consistency(ids.iter()),
            Err(IndexConsistencyError::MissingAtom(AtomId::from("a2")))
        );
    }

    #[test]
    fn test_suggest_similar_terms() {
        let mut index = SearchIndex::new();
        index.index_atom(&make_atom("a1", "Magnesium glycinate", "Supports sleep quality"));

        let suggestions = index.suggest("magnezium", 5);
        assert_eq!(suggestions, vec!["magnesium".to_string()]);
        assert!(index.suggest("x", 5).is_empty());
    }

    #[test]
    fn test_query_terms_dedup() {
        assert_eq!(query_terms("GABA gaba, Sleep"), vec!["gaba", "sleep"]);
    }
}
