//! Page images served from a local directory.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use ragchat_core::error::RetrievalError;
use ragchat_core::{Document, ImageFetcher};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reads `<root>/<sourcepage>` for `.png` sources and returns it as a
/// base64 data URL.
pub struct FsImageFetcher {
    root: PathBuf,
}

impl FsImageFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a sourcepage under the root, refusing traversal.
    fn resolve(&self, sourcepage: &str) -> Option<PathBuf> {
        let normalized = sourcepage.replace('\\', "/");
        if normalized.starts_with('/') || normalized.split('/').any(|seg| seg == "..") {
            return None;
        }
        Some(self.root.join(Path::new(&normalized)))
    }
}

fn is_png(sourcepage: &str) -> bool {
    Path::new(sourcepage)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

#[async_trait]
impl ImageFetcher for FsImageFetcher {
    async fn fetch(&self, doc: &Document) -> Result<Option<String>, RetrievalError> {
        if !is_png(&doc.sourcepage) {
            return Ok(None);
        }

        let Some(path) = self.resolve(&doc.sourcepage) else {
            warn!(sourcepage = %doc.sourcepage, "Refusing image path outside the image root");
            return Ok(None);
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let encoded = general_purpose::STANDARD.encode(bytes);
                Ok(Some(format!("data:image/png;base64,{encoded}")))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Page image not found");
                Ok(None)
            }
            Err(e) => Err(RetrievalError::ImageFetchFailed {
                sourcepage: doc.sourcepage.clone(),
                reason: e.to_string(),
            }),
        }
    }
}
