//! In-memory document index.
//!
//! Holds the corpus in a `Vec` behind an `RwLock` and answers
//! [`SearchRequest`]s with keyword, vector, or hybrid (RRF) ranking.

use crate::vector::{reciprocal_rank_fusion, vector_search};
use async_trait::async_trait;
use ragchat_core::error::RetrievalError;
use ragchat_core::{Document, Retriever, SearchRequest};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const RRF_K: u32 = 60;
const MAX_CAPTIONS: usize = 3;

/// A document index held in process memory.
pub struct InMemoryIndex {
    docs: Arc<RwLock<Vec<Document>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::from_documents(Vec::new())
    }

    pub fn from_documents(docs: Vec<Document>) -> Self {
        Self {
            docs: Arc::new(RwLock::new(docs)),
        }
    }

    /// Load a JSON array of documents.
    pub async fn load(path: &Path) -> Result<Self, RetrievalError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            RetrievalError::SearchFailed(format!("reading {}: {e}", path.display()))
        })?;
        let docs: Vec<Document> = serde_json::from_str(&raw).map_err(|e| {
            RetrievalError::SearchFailed(format!("parsing {}: {e}", path.display()))
        })?;
        debug!(count = docs.len(), path = %path.display(), "Loaded document index");
        Ok(Self::from_documents(docs))
    }

    pub async fn add(&self, doc: Document) {
        self.docs.write().await.push(doc);
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased alphanumeric terms of a query.
fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Term-frequency relevance, normalised by document length.
fn keyword_score(content: &str, terms: &[String]) -> f32 {
    let lower = content.to_lowercase();
    let occurrences: usize = terms.iter().map(|t| lower.matches(t.as_str()).count()).sum();
    occurrences as f32 / (content.len() as f32 / 100.0).max(1.0)
}

fn distinct_terms_matched(content: &str, terms: &[String]) -> usize {
    let lower = content.to_lowercase();
    terms.iter().filter(|t| lower.contains(t.as_str())).count()
}

/// Sentences mentioning a query term, or the opening sentence.
fn extract_captions(content: &str, terms: &[String]) -> Vec<String> {
    let sentences: Vec<&str> = content
        .split_inclusive(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let matching: Vec<String> = sentences
        .iter()
        .filter(|s| {
            let lower = s.to_lowercase();
            terms.iter().any(|t| lower.contains(t.as_str()))
        })
        .take(MAX_CAPTIONS)
        .map(|s| s.to_string())
        .collect();

    if matching.is_empty() {
        sentences.first().map(|s| vec![s.to_string()]).unwrap_or_default()
    } else {
        matching
    }
}

#[async_trait]
impl Retriever for InMemoryIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<Document>, RetrievalError> {
        let docs = self.docs.read().await;
        let candidates: Vec<&Document> =
            docs.iter().filter(|d| request.filter.matches(d)).collect();
        let query_terms = request.query_text.as_deref().map(terms).unwrap_or_default();
        let depth = candidates.len();

        let mut lists: Vec<Vec<Document>> = Vec::new();

        if request.query_text.is_some() {
            let mut keyword: Vec<Document> = candidates
                .iter()
                .filter_map(|d| {
                    let score = keyword_score(&d.content, &query_terms);
                    (score > 0.0).then(|| {
                        let mut doc = (*d).clone();
                        doc.score = score;
                        doc
                    })
                })
                .collect();
            keyword.sort_by(|a, b| {
                b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
            });
            lists.push(keyword);
        }

        for query in &request.vectors {
            lists.push(vector_search(
                candidates.iter().copied(),
                query.field,
                &query.vector,
                depth,
            ));
        }

        let mut results = match lists.len() {
            0 => Vec::new(),
            1 => lists.remove(0),
            _ => reciprocal_rank_fusion(&lists, RRF_K, depth),
        };

        if request.use_semantic_ranker && !query_terms.is_empty() {
            // Stable: preserves fused order among equal coverage.
            results.sort_by_key(|d| std::cmp::Reverse(distinct_terms_matched(&d.content, &query_terms)));
        }

        results.truncate(request.top);

        if request.use_semantic_captions {
            for doc in &mut results {
                doc.captions = extract_captions(&doc.content, &query_terms);
            }
        }

        debug!(
            hits = results.len(),
            filter = ?request.filter.to_odata(),
            "Index search complete"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragchat_core::{SearchFilter, VectorField, VectorQuery};

    fn doc(id: &str, content: &str, embedding: Option<Vec<f32>>) -> Document {
        Document {
            id: id.into(),
            content: content.into(),
            sourcepage: format!("{id}.md"),
            embedding,
            ..Document::default()
        }
    }

    fn corpus() -> InMemoryIndex {
        InMemoryIndex::from_documents(vec![
            doc("rust", "Rust is a systems language. It has no GC.", Some(vec![1.0, 0.0])),
            doc("python", "Python is great for scripting.", Some(vec![0.0, 1.0])),
            doc("both", "Rust and Python interoperate via PyO3.", Some(vec![0.7, 0.7])),
        ])
    }

    fn keyword(text: &str, top: usize) -> SearchRequest {
        SearchRequest {
            top,
            query_text: Some(text.into()),
            ..SearchRequest::default()
        }
    }

    #[tokio::test]
    async fn keyword_search_matches_terms() {
        let results = corpus().search(keyword("python", 10)).await.unwrap();
        let ids: Vec<_> = results.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"python"));
        assert!(ids.contains(&"both"));
    }

    #[tokio::test]
    async fn top_limits_results() {
        let results = corpus().search(keyword("rust python", 1)).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn vector_only_search() {
        let request = SearchRequest {
            top: 1,
            vectors: vec![VectorQuery {
                field: VectorField::Embedding,
                vector: vec![0.0, 1.0],
            }],
            ..SearchRequest::default()
        };
        let results = corpus().search(request).await.unwrap();
        assert_eq!(results[0].id, "python");
    }

    #[tokio::test]
    async fn hybrid_search_fuses_rankings() {
        let request = SearchRequest {
            top: 3,
            query_text: Some("rust".into()),
            vectors: vec![VectorQuery {
                field: VectorField::Embedding,
                vector: vec![1.0, 0.0],
            }],
            ..SearchRequest::default()
        };
        let results = corpus().search(request).await.unwrap();
        assert_eq!(results[0].id, "rust");
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn filter_excludes_category() {
        let mut hidden = doc("hidden", "Rust internals", None);
        hidden.category = Some("internal".into());
        let index = InMemoryIndex::from_documents(vec![hidden, doc("open", "Rust book", None)]);

        let mut request = keyword("rust", 10);
        request.filter = SearchFilter {
            exclude_category: Some("internal".into()),
            ..SearchFilter::default()
        };
        let results = index.search(request).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "open");
    }

    #[tokio::test]
    async fn captions_pick_matching_sentences() {
        let mut request = keyword("gc", 1);
        request.use_semantic_captions = true;
        let results = corpus().search(request).await.unwrap();
        assert_eq!(results[0].captions, vec!["It has no GC."]);
    }

    #[tokio::test]
    async fn semantic_ranker_prefers_term_coverage() {
        let index = InMemoryIndex::from_documents(vec![
            doc("one", "rust rust rust rust", None),
            doc("two", "rust and python together", None),
        ]);
        let mut request = keyword("rust python", 2);
        request.use_semantic_ranker = true;
        let results = index.search(request).await.unwrap();
        assert_eq!(results[0].id, "two");
    }

    #[tokio::test]
    async fn load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(
            &path,
            r#"[{"id":"1","content":"Benefits overview","sourcepage":"Benefit_Options-2.png","embedding":[0.1,0.2]}]"#,
        )
        .unwrap();

        let index = InMemoryIndex::load(&path).await.unwrap();
        assert_eq!(index.len().await, 1);
        let results = index.search(keyword("benefits", 3)).await.unwrap();
        assert_eq!(results[0].sourcepage, "Benefit_Options-2.png");
    }

    #[tokio::test]
    async fn load_missing_file_is_error() {
        let err = InMemoryIndex::load(Path::new("/nonexistent/index.json"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RetrievalError::SearchFailed(_)));
    }

    #[tokio::test]
    async fn no_query_and_no_vectors_returns_nothing() {
        let results = corpus()
            .search(SearchRequest {
                top: 3,
                ..SearchRequest::default()
            })
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
