use crate::error::IngestError;
use lopdf::Document;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor: Send + Sync {
    /// Extracts text per page, in page order. Any failing page fails the document.
    fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<PageText>, IngestError>;

    fn extract_text(&self, pdf: &[u8]) -> Result<String, IngestError> {
        let pages = self.extract_pages(pdf)?;
        let text = concatenate_pages(&pages);

        if text.trim().is_empty() {
            return Err(IngestError::PdfParse(
                "pdf had no readable page text".to_string(),
            ));
        }

        Ok(text)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load_mem(pdf).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(format!("page {page_no}: {error}")))?;

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

pub fn concatenate_pages(pages: &[PageText]) -> String {
    pages.iter().map(|page| page.text.as_str()).collect()
}
