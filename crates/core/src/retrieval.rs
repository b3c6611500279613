//! Retrieval collaborators: search index, embeddings, and page images.
//!
//! The chat core never ranks or filters documents itself. It builds a
//! [`SearchRequest`], hands it to a [`Retriever`], and projects the results
//! into citation strings for the prompt.

use crate::error::RetrievalError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A document returned by the search index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Index key
    pub id: String,

    /// Chunk text
    #[serde(default)]
    pub content: String,

    /// Optional category used by the `exclude_category` filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Citable page name (e.g. `handbook-3.png` or `faq.md`)
    pub sourcepage: String,

    /// Originating file
    #[serde(default)]
    pub sourcefile: String,

    /// Object IDs allowed to read this document
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub oids: Vec<String>,

    /// Groups allowed to read this document
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,

    /// Extractive captions (set when semantic captions are requested)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captions: Vec<String>,

    /// Relevance score (set by search operations)
    #[serde(default)]
    pub score: f32,

    /// Text embedding
    #[serde(default, skip_serializing)]
    pub embedding: Option<Vec<f32>>,

    /// Image embedding of the page
    #[serde(default, skip_serializing, rename = "imageEmbedding")]
    pub image_embedding: Option<Vec<f32>>,
}

impl Document {
    /// The citation label for this document.
    ///
    /// Page images named `name-N.png` cite as `name.pdf#page=N` unless
    /// image citations are requested.
    pub fn citation(&self, use_image_citation: bool) -> String {
        if use_image_citation {
            return self.sourcepage.clone();
        }
        let Some(stem) = strip_png(&self.sourcepage) else {
            return self.sourcepage.clone();
        };
        let Some((name, page)) = stem.rsplit_once('-') else {
            return self.sourcepage.clone();
        };
        match page.parse::<u32>() {
            Ok(page) => format!("{name}.pdf#page={page}"),
            Err(_) => self.sourcepage.clone(),
        }
    }

    /// `citation: text` line fed to the model as a source.
    pub fn source_line(&self, use_semantic_captions: bool, use_image_citation: bool) -> String {
        let text = if use_semantic_captions {
            self.captions.join(" . ")
        } else {
            self.content.clone()
        };
        format!("{}: {}", self.citation(use_image_citation), nonewlines(&text))
    }
}

fn nonewlines(s: &str) -> String {
    s.replace(['\n', '\r'], " ")
}

/// Project search results into source-citation strings.
pub fn sources_content(
    results: &[Document],
    use_semantic_captions: bool,
    use_image_citation: bool,
) -> Vec<String> {
    results
        .iter()
        .map(|doc| doc.source_line(use_semantic_captions, use_image_citation))
        .collect()
}

/// Which vector field a query embedding targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VectorField {
    #[serde(rename = "embedding")]
    Embedding,
    #[serde(rename = "imageEmbedding")]
    ImageEmbedding,
}

/// A query embedding bound to the field it should be compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorQuery {
    pub field: VectorField,
    pub vector: Vec<f32>,
}

/// Structured search filter. Renders to OData for hosted indexes and is
/// evaluated directly by in-process ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Drop documents in this category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_category: Option<String>,

    /// Restrict to documents readable by this object ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,

    /// Restrict to documents readable by any of these groups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.exclude_category.is_none() && self.oid.is_none() && self.groups.is_none()
    }

    /// OData filter expression, or `None` when nothing is filtered.
    pub fn to_odata(&self) -> Option<String> {
        let mut clauses = Vec::new();
        if let Some(category) = &self.exclude_category {
            clauses.push(format!("category ne '{}'", category.replace('\'', "''")));
        }
        let oid = self
            .oid
            .as_ref()
            .map(|oid| format!("oids/any(g:search.in(g, '{oid}'))"));
        let groups = self
            .groups
            .as_ref()
            .map(|groups| format!("groups/any(g:search.in(g, '{}'))", groups.join(", ")));
        match (oid, groups) {
            (Some(oid), Some(groups)) => clauses.push(format!("({oid} or {groups})")),
            (Some(oid), None) => clauses.push(oid),
            (None, Some(groups)) => clauses.push(groups),
            (None, None) => {}
        }
        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" and "))
        }
    }

    /// Whether a document passes this filter.
    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(excluded) = &self.exclude_category {
            if doc.category.as_deref() == Some(excluded.as_str()) {
                return false;
            }
        }
        let oid_ok = self.oid.as_ref().map(|oid| doc.oids.contains(oid));
        let groups_ok = self
            .groups
            .as_ref()
            .map(|groups| groups.iter().any(|g| doc.groups.contains(g)));
        match (oid_ok, groups_ok) {
            (Some(a), Some(b)) => a || b,
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => true,
        }
    }
}

/// A single retrieval call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Maximum number of documents to return
    pub top: usize,

    /// Keyword query; `None` for pure vector retrieval
    #[serde(default)]
    pub query_text: Option<String>,

    #[serde(default)]
    pub filter: SearchFilter,

    /// Query embeddings; empty for pure keyword retrieval
    #[serde(default)]
    pub vectors: Vec<VectorQuery>,

    #[serde(default)]
    pub use_semantic_ranker: bool,

    #[serde(default)]
    pub use_semantic_captions: bool,
}

/// The search index.
#[async_trait]
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;

    async fn search(
        &self,
        request: SearchRequest,
    ) -> std::result::Result<Vec<Document>, RetrievalError>;
}

/// Query embedding computation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed query text for the `embedding` field.
    async fn embed_text(&self, text: &str) -> std::result::Result<Vec<f32>, RetrievalError>;

    /// Embed query text into the image-embedding space.
    async fn embed_image_query(
        &self,
        _text: &str,
    ) -> std::result::Result<Vec<f32>, RetrievalError> {
        Err(RetrievalError::Unsupported(
            "image query embeddings are not configured".into(),
        ))
    }
}

/// `name` for `name.png`, any case of the extension.
fn strip_png(sourcepage: &str) -> Option<&str> {
    let at = sourcepage.len().checked_sub(4)?;
    let (stem, ext) = (sourcepage.get(..at)?, sourcepage.get(at..)?);
    ext.eq_ignore_ascii_case(".png").then_some(stem)
}

/// Fetches the page image behind a search result.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// A data URL for the document's page image, or `None` when it has none.
    async fn fetch(&self, doc: &Document) -> std::result::Result<Option<String>, RetrievalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(sourcepage: &str, content: &str) -> Document {
        Document {
            id: sourcepage.into(),
            content: content.into(),
            sourcepage: sourcepage.into(),
            ..Document::default()
        }
    }

    #[test]
    fn png_page_cites_pdf_page() {
        let d = doc("Benefit_Options-2.png", "");
        assert_eq!(d.citation(false), "Benefit_Options.pdf#page=2");
        assert_eq!(d.citation(true), "Benefit_Options-2.png");
    }

    #[test]
    fn png_extension_matches_any_case() {
        assert_eq!(doc("report-2.Png", "").citation(false), "report.pdf#page=2");
        assert_eq!(doc("report-7.PNG", "").citation(false), "report.pdf#page=7");
        assert_eq!(doc("notes-1.pNg", "").citation(true), "notes-1.pNg");
        assert_eq!(doc("é.png", "").citation(false), "é.png");
        assert_eq!(doc("é", "").citation(false), "é");
    }

    #[test]
    fn non_png_cites_sourcepage() {
        assert_eq!(doc("faq.md", "").citation(false), "faq.md");
        assert_eq!(doc("cover.png", "").citation(false), "cover.png");
        assert_eq!(doc("a-b.png", "").citation(false), "a-b.png");
    }

    #[test]
    fn source_lines_strip_newlines() {
        let results = vec![doc("faq.md", "line one\nline two\r\nend")];
        let lines = sources_content(&results, false, false);
        assert_eq!(lines, vec!["faq.md: line one line two  end"]);
    }

    #[test]
    fn source_lines_prefer_captions() {
        let mut d = doc("faq.md", "full content");
        d.captions = vec!["first".into(), "second".into()];
        assert_eq!(d.source_line(true, false), "faq.md: first . second");
        assert_eq!(d.source_line(false, false), "faq.md: full content");
    }

    #[test]
    fn empty_filter_renders_nothing() {
        assert!(SearchFilter::default().is_empty());
        assert_eq!(SearchFilter::default().to_odata(), None);
    }

    #[test]
    fn exclude_category_escapes_quotes() {
        let filter = SearchFilter {
            exclude_category: Some("sam's".into()),
            ..SearchFilter::default()
        };
        assert_eq!(filter.to_odata().unwrap(), "category ne 'sam''s'");
    }

    #[test]
    fn security_filters_combine_with_or() {
        let filter = SearchFilter {
            exclude_category: Some("x".into()),
            oid: Some("OID".into()),
            groups: Some(vec!["g1".into(), "g2".into()]),
        };
        assert_eq!(
            filter.to_odata().unwrap(),
            "category ne 'x' and (oids/any(g:search.in(g, 'OID')) or groups/any(g:search.in(g, 'g1, g2')))"
        );
    }

    #[test]
    fn filter_matches_documents() {
        let mut d = doc("a.md", "");
        d.category = Some("internal".into());
        d.groups = vec!["eng".into()];

        let exclude = SearchFilter {
            exclude_category: Some("internal".into()),
            ..SearchFilter::default()
        };
        assert!(!exclude.matches(&d));

        let by_group = SearchFilter {
            oid: Some("someone".into()),
            groups: Some(vec!["eng".into()]),
            ..SearchFilter::default()
        };
        assert!(by_group.matches(&d));

        let by_oid = SearchFilter {
            oid: Some("someone".into()),
            ..SearchFilter::default()
        };
        assert!(!by_oid.matches(&d));
    }

    #[test]
    fn embeddings_are_not_serialized() {
        let mut d = doc("a.md", "text");
        d.embedding = Some(vec![0.1, 0.2]);
        let json = serde_json::to_string(&d).unwrap();
        assert!(!json.contains("embedding"));
    }

    #[test]
    fn vector_field_wire_names() {
        let fields: Vec<VectorField> =
            serde_json::from_str(r#"["embedding","imageEmbedding"]"#).unwrap();
        assert_eq!(fields, vec![VectorField::Embedding, VectorField::ImageEmbedding]);
    }
}
