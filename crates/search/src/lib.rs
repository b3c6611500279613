//! Retrieval collaborators for ragchat.
//!
//! An in-process document index with keyword, vector, and hybrid search,
//! and a directory-backed store for page images.

pub mod images;
pub mod index;
pub mod vector;

pub use images::FsImageFetcher;
pub use index::InMemoryIndex;
pub use vector::{cosine_similarity, reciprocal_rank_fusion, vector_search};
