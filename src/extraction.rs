//! Plain-text extraction from submitted files.
//!
//! Every failure path returns an empty string: the plagiarism policy treats
//! "" as "no text", so nothing here is propagated as an error.

use crate::config::{DEFAULT_FETCH_TIMEOUT_SECS, MAX_DOCUMENT_BYTES};
use docx_rs::{DocumentChild, ParagraphChild, RunChild};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DocumentKind {
    Pdf,
    Word,
    Image,
    PlainText,
}

impl DocumentKind {
    /// Classifies a declared MIME type by substring, e.g.
    /// `application/vnd.openxmlformats-officedocument.wordprocessingml.document` -> Word.
    pub fn from_mime(declared: &str) -> Option<Self> {
        let declared = declared.to_ascii_lowercase();
        if declared.contains("pdf") {
            Some(DocumentKind::Pdf)
        } else if declared.contains("word") {
            Some(DocumentKind::Word)
        } else if declared.contains("image") {
            Some(DocumentKind::Image)
        } else if declared.starts_with("text/") {
            Some(DocumentKind::PlainText)
        } else {
            None
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Local file references are disabled")]
    LocalDisabled,

    #[error("Reference {0} is outside the uploads directory")]
    OutsideUploads(String),

    #[error("Read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

#[derive(Clone)]
pub struct Extractor {
    client: Client,
    // Canonical root for non-http references; None disables them
    uploads_root: Option<PathBuf>,
    max_bytes: usize,
}

impl Extractor {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout: {}, using defaults", e);
                Client::new()
            });
        Self {
            client,
            uploads_root: None,
            max_bytes: MAX_DOCUMENT_BYTES,
        }
    }

    /// Allows local references, resolved inside `root` only.
    pub fn with_uploads_root(mut self, root: impl AsRef<Path>) -> Self {
        match std::fs::canonicalize(root.as_ref()) {
            Ok(canonical) => self.uploads_root = Some(canonical),
            Err(e) => {
                warn!("Uploads directory {:?} unusable: {}, local references disabled", root.as_ref(), e);
                self.uploads_root = None;
            }
        }
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Fetches `file_ref` and extracts its text according to `declared_type`.
    ///
    /// `http(s)://` references are downloaded. Other references are only read
    /// when an uploads root is configured, and must resolve inside it.
    pub async fn extract(&self, file_ref: Option<&str>, declared_type: Option<&str>) -> String {
        let (Some(file_ref), Some(declared_type)) = (file_ref, declared_type) else {
            return String::new();
        };
        if file_ref.trim().is_empty() {
            return String::new();
        }

        let Some(kind) = DocumentKind::from_mime(declared_type) else {
            debug!("Unrecognized document type '{}', no text extracted", declared_type);
            return String::new();
        };

        let bytes = match self.fetch(file_ref).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to fetch {}: {}", file_ref, e);
                return String::new();
            }
        };

        // PDF and DOCX parsing is CPU-bound
        match tokio::task::spawn_blocking(move || extract_from_bytes(&bytes, kind)).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Extraction task for {} failed: {}", file_ref, e);
                String::new()
            }
        }
    }

    pub async fn fetch(&self, file_ref: &str) -> Result<Vec<u8>, FetchError> {
        if file_ref.starts_with("http://") || file_ref.starts_with("https://") {
            self.fetch_remote(file_ref).await
        } else {
            let path = self.resolve_local(file_ref).await?;
            self.read_local(&path).await
        }
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;

        if let Some(len) = response.content_length() {
            if len > self.max_bytes as u64 {
                return Err(FetchError::TooLarge { limit: self.max_bytes });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::TooLarge { limit: self.max_bytes });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    async fn resolve_local(&self, file_ref: &str) -> Result<PathBuf, FetchError> {
        let root = self.uploads_root.as_ref().ok_or(FetchError::LocalDisabled)?;
        let relative = file_ref.strip_prefix("file://").unwrap_or(file_ref);

        // Absolute references replace the root in join; the prefix check catches them
        let resolved = tokio::fs::canonicalize(root.join(relative)).await?;
        if !resolved.starts_with(root) {
            return Err(FetchError::OutsideUploads(file_ref.to_string()));
        }
        Ok(resolved)
    }

    async fn read_local(&self, path: &Path) -> Result<Vec<u8>, FetchError> {
        let limit = self.max_bytes;
        if tokio::fs::metadata(path).await?.len() > limit as u64 {
            return Err(FetchError::TooLarge { limit });
        }

        // The file may grow between metadata and read
        let mut body = Vec::new();
        tokio::fs::File::open(path)
            .await?
            .take(limit as u64 + 1)
            .read_to_end(&mut body)
            .await?;
        if body.len() > limit {
            return Err(FetchError::TooLarge { limit });
        }
        Ok(body)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes a document already in memory. Output is trimmed.
pub fn extract_from_bytes(bytes: &[u8], kind: DocumentKind) -> String {
    let text = match kind {
        DocumentKind::Pdf => extract_pdf(bytes),
        DocumentKind::Word => extract_docx(bytes),
        DocumentKind::PlainText => String::from_utf8_lossy(bytes).into_owned(),
        DocumentKind::Image => extract_image(bytes),
    };
    text.trim().to_string()
}

#[cfg(feature = "ocr")]
fn extract_image(bytes: &[u8]) -> String {
    use std::io::Write;

    // tesseract reads from disk
    let recognize = || -> Result<String, Box<dyn std::error::Error>> {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        let image = rusty_tesseract::Image::from_path(file.path())?;
        Ok(rusty_tesseract::image_to_string(&image, &rusty_tesseract::Args::default())?)
    };

    match recognize() {
        Ok(text) => text,
        Err(e) => {
            warn!("OCR failed: {}", e);
            String::new()
        }
    }
}

#[cfg(not(feature = "ocr"))]
fn extract_image(bytes: &[u8]) -> String {
    // Built without OCR; images count as unreadable
    debug!("Image submission ({} bytes) has no extractable text", bytes.len());
    String::new()
}

fn extract_pdf(bytes: &[u8]) -> String {
    // pdf-extract can panic on malformed documents
    let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes));
    match result {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!("PDF extraction failed: {}", e);
            String::new()
        }
        Err(_) => {
            warn!("PDF extraction panicked on malformed input");
            String::new()
        }
    }
}

fn extract_docx(bytes: &[u8]) -> String {
    let docx = match docx_rs::read_docx(bytes) {
        Ok(docx) => docx,
        Err(e) => {
            warn!("DOCX extraction failed: {}", e);
            return String::new();
        }
    };

    let mut full_text = String::new();
    for child in &docx.document.children {
        if let DocumentChild::Paragraph(paragraph) = child {
            for p_child in &paragraph.children {
                if let ParagraphChild::Run(run) = p_child {
                    for r_child in &run.children {
                        match r_child {
                            RunChild::Text(t) => full_text.push_str(&t.text),
                            RunChild::Tab(_) => full_text.push('\t'),
                            _ => {}
                        }
                    }
                }
            }
            full_text.push('\n');
        }
    }
    full_text
}
