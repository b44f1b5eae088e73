//! Lexical scoring over the in-memory corpus.
//!
//! Substring-based rather than token-based so that unsegmented Chinese
//! text still matches.

use vulweb_core::types::{KnowledgeDocument, Relevance, RetrievalMetadata, RetrievalResult};

const WHOLE_QUERY_IN_TITLE: u32 = 10;
const WHOLE_QUERY_IN_BODY: u32 = 5;
const TAG_MATCH: u32 = 8;
const TOKEN_IN_TITLE: u32 = 3;
const TOKEN_IN_BODY: u32 = 1;
const TOKEN_IN_TAGS: u32 = 2;

struct IndexedDocument {
    doc: KnowledgeDocument,
    title: String,
    body: String,
    tags: Vec<String>,
}

/// Keyword index; always available once documents are loaded.
pub struct KeywordIndex {
    docs: Vec<IndexedDocument>,
}

impl KeywordIndex {
    /// Index `documents`, keeping their order for tie-breaking.
    pub fn new(documents: Vec<KnowledgeDocument>) -> Self {
        let docs = documents
            .into_iter()
            .map(|doc| IndexedDocument {
                title: doc.title.to_lowercase(),
                body: doc.content.to_lowercase(),
                tags: doc
                    .tags
                    .iter()
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect(),
                doc,
            })
            .collect();
        Self { docs }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Top `k` documents by descending score; zero-score documents are
    /// dropped and equal scores keep corpus order.
    pub fn search(&self, query: &str, k: usize) -> Vec<RetrievalResult> {
        if k == 0 || query.trim().is_empty() {
            return Vec::new();
        }
        let query = query.to_lowercase();
        let tokens: Vec<&str> = query
            .split_whitespace()
            .filter(|t| t.chars().count() > 1)
            .collect();

        let mut scored: Vec<(u32, &IndexedDocument)> = self
            .docs
            .iter()
            .map(|d| (score(d, &query, &tokens), d))
            .filter(|(s, _)| *s > 0)
            .collect();

        // `sort_by` is stable, which gives the corpus-order tie-break.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        scored
            .into_iter()
            .take(k)
            .map(|(s, d)| RetrievalResult {
                content: d.doc.searchable_text(),
                metadata: RetrievalMetadata::from(&d.doc),
                relevance: Relevance::Score(s),
            })
            .collect()
    }
}

fn score(doc: &IndexedDocument, query: &str, tokens: &[&str]) -> u32 {
    let mut score = 0;

    if doc.title.contains(query) {
        score += WHOLE_QUERY_IN_TITLE;
    }
    if doc.body.contains(query) {
        score += WHOLE_QUERY_IN_BODY;
    }
    for tag in &doc.tags {
        if tag.contains(query) || query.contains(tag.as_str()) {
            score += TAG_MATCH;
        }
    }

    for token in tokens {
        if doc.title.contains(token) {
            score += TOKEN_IN_TITLE;
        }
        if doc.body.contains(token) {
            score += TOKEN_IN_BODY;
        }
        if doc.tags.iter().any(|t| t.contains(token)) {
            score += TOKEN_IN_TAGS;
        }
    }

    score
}
