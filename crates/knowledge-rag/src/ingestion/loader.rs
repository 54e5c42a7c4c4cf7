//! Load uploaded files into page documents

use crate::error::{Error, Result};
use crate::types::{DocumentPage, FileType};

/// Turns uploaded bytes into [`DocumentPage`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentLoader;

impl DocumentLoader {
    /// Create a loader
    pub fn new() -> Self {
        Self
    }

    /// Dispatch on the filename extension
    pub fn load(&self, filename: &str, data: &[u8]) -> Result<Vec<DocumentPage>> {
        match FileType::from_filename(filename) {
            Some(FileType::Pdf) => self.load_pdf(filename, data),
            Some(FileType::Txt) => self.load_text(filename, data),
            None => Err(Error::UnsupportedFileType(filename.to_string())),
        }
    }

    /// One page document per PDF page, `page` metadata 0-based.
    ///
    /// When lopdf yields no text for any page the whole document is extracted
    /// with pdf-extract and returned as a single page.
    pub fn load_pdf(&self, filename: &str, data: &[u8]) -> Result<Vec<DocumentPage>> {
        let pages = match Self::extract_pages(data) {
            Ok(pages) => pages,
            Err(e) => {
                tracing::warn!("Per-page extraction failed for {}: {}, trying fallback", filename, e);
                Vec::new()
            }
        };

        if pages.iter().any(|text| !text.trim().is_empty()) {
            return Ok(pages
                .into_iter()
                .enumerate()
                .map(|(index, text)| DocumentPage::new(clean_text(&text), filename).with_page(index))
                .collect());
        }

        let text = pdf_extract::extract_text_from_mem(data)
            .map_err(|e| Error::file_parse(filename, format!("Failed to extract PDF text: {}", e)))?;

        tracing::debug!("Extracted {} as a single page", filename);
        Ok(vec![DocumentPage::new(clean_text(&text), filename).with_page(0)])
    }

    /// A text file as a single document; content must be UTF-8
    pub fn load_text(&self, filename: &str, data: &[u8]) -> Result<Vec<DocumentPage>> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::file_parse(filename, format!("Invalid UTF-8: {}", e)))?;

        Ok(vec![DocumentPage::new(clean_text(text), filename)])
    }

    fn extract_pages(data: &[u8]) -> std::result::Result<Vec<String>, lopdf::Error> {
        let doc = lopdf::Document::load_mem(data)?;

        let mut pages = Vec::new();
        for page_number in doc.get_pages().keys() {
            let text = doc.extract_text(&[*page_number]).unwrap_or_default();
            pages.push(text);
        }

        Ok(pages)
    }
}

fn clean_text(text: &str) -> String {
    text.replace('\0', "")
}
