// Document Loader
// Reads .txt, .pdf and .docx sources into a single raw text blob.

use docx_rs::{read_docx, DocumentChild, Paragraph, ParagraphChild, RunChild};
use pdf_extract::{OutputError, PlainTextOutput};
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("Unsupported file type {0:?}. Use .txt, .pdf or .docx")]
    Unsupported(String),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed for {path}: {message}")]
    Pdf { path: PathBuf, message: String },
    #[error("DOCX parse failed for {path}: {message}")]
    Docx { path: PathBuf, message: String },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DocumentKind {
    Text,
    Pdf,
    Docx,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "txt" | "md" => Ok(Self::Text),
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            _ => Err(LoadError::Unsupported(ext)),
        }
    }
}

/// Load a document by extension.
pub fn load_document(path: &Path) -> Result<String, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let kind = DocumentKind::from_path(path)?;
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let text = match kind {
        DocumentKind::Text => decode_utf8_lossless_drop(&bytes),
        DocumentKind::Pdf => load_pdf_bytes(path, &bytes)?,
        DocumentKind::Docx => load_docx_bytes(path, &bytes)?,
    };

    info!(
        "[LOADER] {:?} {} -> {} chars",
        kind,
        path.display(),
        text.chars().count()
    );
    Ok(text)
}

/// Decode UTF-8, dropping undecodable byte sequences instead of replacing them.
pub fn decode_utf8_lossless_drop(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;

    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(len) => rest = &after[len..],
                    None => break,
                }
            }
        }
    }

    out
}

fn load_pdf_bytes(path: &Path, bytes: &[u8]) -> Result<String, LoadError> {
    let pdf_err = |message: String| LoadError::Pdf {
        path: path.to_path_buf(),
        message,
    };

    // lopdf can panic on malformed input.
    let mut doc = match catch_unwind(AssertUnwindSafe(|| pdf_extract::Document::load_mem(bytes))) {
        Ok(Ok(doc)) => doc,
        Ok(Err(e)) => return Err(pdf_err(e.to_string())),
        Err(_) => return Err(pdf_err("parser panicked".to_string())),
    };
    if doc.is_encrypted() {
        doc.decrypt("").map_err(|e| pdf_err(e.to_string()))?;
    }

    let pages = extract_pdf_pages(&doc);
    let empty_pages = pages.iter().filter(|p| p.trim().is_empty()).count();
    if empty_pages > 0 {
        warn!("[LOADER] {} of {} PDF pages yielded no text", empty_pages, pages.len());
    }
    Ok(pages.join("\n"))
}

/// Text of every page in order. A page whose extraction fails or panics
/// contributes an empty string.
fn extract_pdf_pages(doc: &pdf_extract::Document) -> Vec<String> {
    doc.get_pages()
        .into_keys()
        .map(|page_num| {
            let result = catch_unwind(AssertUnwindSafe(|| {
                let mut text = String::new();
                {
                    let mut output = PlainTextOutput::new(&mut text);
                    pdf_extract::output_doc_page(doc, &mut output, page_num)?;
                }
                Ok::<_, OutputError>(text)
            }));

            match result {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    warn!("[LOADER] PDF page {} extraction failed: {}", page_num, e);
                    String::new()
                }
                Err(_) => {
                    warn!("[LOADER] PDF page {} extraction panicked", page_num);
                    String::new()
                }
            }
        })
        .collect()
}

fn load_docx_bytes(path: &Path, bytes: &[u8]) -> Result<String, LoadError> {
    let docx = read_docx(bytes).map_err(|e| LoadError::Docx {
        path: path.to_path_buf(),
        message: format!("{:?}", e),
    })?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(para) => Some(paragraph_text(para)),
            _ => None,
        })
        .filter(|p| !p.trim().is_empty())
        .collect();

    // Each docx paragraph is its own block for the segmenter.
    Ok(paragraphs.join("\n\n"))
}

/// Concatenate the text runs of one paragraph.
fn paragraph_text(para: &Paragraph) -> String {
    let mut parts = Vec::new();
    for child in &para.children {
        if let ParagraphChild::Run(run) = child {
            for rc in &run.children {
                if let RunChild::Text(t) = rc {
                    parts.push(t.text.clone());
                }
            }
        }
    }
    parts.join("")
}
