use anyhow::{Context, Result};
use lopdf::Document;
use tracing::{info, warn};

use super::ExtractedPage;

pub struct PdfParser;

impl PdfParser {
    pub fn new() -> Self {
        Self
    }

    /// 逐页提取文本层；lopdf 取不到任何文本时整体回退到 pdf-extract
    pub fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<ExtractedPage>> {
        let doc = Document::load_mem(bytes).context("PDF解析失败")?;
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        info!("PDF共 {} 页", page_numbers.len());

        let mut pages = Vec::with_capacity(page_numbers.len());
        for page_number in page_numbers {
            match doc.extract_text(&[page_number]) {
                Ok(text) => pages.push(ExtractedPage { text, page_number }),
                Err(e) => {
                    warn!("第 {} 页文本提取失败: {}", page_number, e);
                    pages.push(ExtractedPage {
                        text: String::new(),
                        page_number,
                    });
                }
            }
        }

        if pages.iter().all(|p| p.text.trim().is_empty()) {
            warn!("逐页提取未得到文本，改用整体提取");
            let text = self.extract_full_text(bytes)?;
            return Ok(vec![ExtractedPage { text, page_number: 1 }]);
        }

        let total: usize = pages.iter().map(|p| p.text.len()).sum();
        info!("提取文本长度: {} 字符", total);
        Ok(pages)
    }

    pub fn extract_full_text(&self, bytes: &[u8]) -> Result<String> {
        let text = pdf_extract::extract_text_from_mem(bytes).context("PDF文本提取失败")?;

        if text.trim().is_empty() {
            warn!("PDF中未提取到文本内容，可能是扫描件，请使用 OCR 模式");
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_pdf_bytes() {
        let parser = PdfParser::new();
        assert!(parser.extract_pages(b"not a pdf at all").is_err());
    }
}
