//! Page-by-page PDF text extraction

use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// How long pdf-extract may spend on one file before falling back to lopdf
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// Extract the text of every page of the PDF at `path`, in page order.
///
/// Pages without extractable text come back as empty strings so page
/// positions stay stable.
pub fn extract_pages(path: &Path) -> Result<Vec<String>> {
    let name = path.display().to_string();
    let data = std::fs::read(path).map_err(|e| Error::pdf(&name, e.to_string()))?;
    extract_pages_from_mem(&data, &name)
}

/// Extract per-page text from an in-memory PDF. `name` is used in errors.
pub fn extract_pages_from_mem(data: &[u8], name: &str) -> Result<Vec<String>> {
    let pages = extract_with_timeout(data, name)?;
    tracing::debug!("Extracted {} pages from {}", pages.len(), name);
    Ok(pages.iter().map(|page| clean_page_text(page)).collect())
}

/// pdf-extract can hang or panic on unusual fonts, so it runs on its own thread
fn extract_with_timeout(data: &[u8], name: &str) -> Result<Vec<String>> {
    let data_vec = data.to_vec();
    let (tx, rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        let result = pdf_extract::extract_text_from_mem_by_pages(&data_vec);
        let _ = tx.send(result);
    });

    match rx.recv_timeout(EXTRACT_TIMEOUT) {
        Ok(Ok(pages)) => {
            let _ = handle.join();
            Ok(pages)
        }
        Ok(Err(e)) => {
            let _ = handle.join();
            tracing::warn!("pdf-extract failed on {}: {}, trying lopdf", name, e);
            extract_pages_fallback(data, name)
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::error!(
                "pdf-extract timed out after {:?} on {}, trying lopdf",
                EXTRACT_TIMEOUT,
                name
            );
            extract_pages_fallback(data, name)
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            tracing::error!("pdf-extract thread crashed on {}, trying lopdf", name);
            extract_pages_fallback(data, name)
        }
    }
}

/// Fallback extraction using lopdf's per-page text extraction
fn extract_pages_fallback(data: &[u8], name: &str) -> Result<Vec<String>> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| Error::pdf(name, format!("Failed to load PDF: {}", e)))?;

    let pages = doc
        .get_pages()
        .into_keys()
        .map(|page_number| match doc.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("No text on page {} of {}: {}", page_number, name, e);
                String::new()
            }
        })
        .collect();

    Ok(pages)
}

/// Strip characters that only confuse the tokenizers
fn clean_page_text(text: &str) -> String {
    text.replace('\0', "").replace('\u{FEFF}', "")
}
