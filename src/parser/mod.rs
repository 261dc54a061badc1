pub mod ocr;
pub mod pdf_parser;
pub mod question_extractor;

pub use ocr::OcrEngine;
pub use pdf_parser::PdfParser;
pub use question_extractor::QuestionExtractor;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::utils::{PyqError, PyqResult};

/// 单页提取文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPage {
    pub text: String,
    pub page_number: u32,
}

/// 合并所有页文本，页之间空一行
pub fn join_pages(pages: &[ExtractedPage]) -> String {
    pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 三种上传处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// 直接读取 PDF 文本层
    PdfText,
    /// PDF 逐页转图片后 OCR
    PdfOcr,
    /// 图片 OCR
    Image,
}

impl IngestMode {
    /// 根据文件内容推断处理方式：PDF 默认走文本层
    pub fn detect(bytes: &[u8]) -> PyqResult<Self> {
        if is_pdf(bytes) {
            return Ok(IngestMode::PdfText);
        }
        match image::guess_format(bytes) {
            Ok(_) => Ok(IngestMode::Image),
            Err(_) => Err(PyqError::InvalidInput(
                "仅支持 PDF 或图片文件 (PNG/JPEG/TIFF/BMP/WebP)".to_string(),
            )),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IngestMode::PdfText => "pdf",
            IngestMode::PdfOcr => "pdf-ocr",
            IngestMode::Image => "image",
        }
    }
}

fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

/// 上传前校验：大小上限与文件类型必须与处理方式一致
pub fn validate_upload(bytes: &[u8], mode: IngestMode, max_bytes: u64) -> PyqResult<()> {
    if bytes.is_empty() {
        return Err(PyqError::InvalidInput("文件为空".to_string()));
    }
    if bytes.len() as u64 > max_bytes {
        return Err(PyqError::InvalidInput(format!(
            "文件过大: {} 字节，上限 {} 字节",
            bytes.len(),
            max_bytes
        )));
    }

    match mode {
        IngestMode::PdfText | IngestMode::PdfOcr if !is_pdf(bytes) => {
            Err(PyqError::InvalidInput("不是有效的 PDF 文件".to_string()))
        }
        IngestMode::Image if image::guess_format(bytes).is_err() => {
            Err(PyqError::InvalidInput("无法识别的图片格式".to_string()))
        }
        _ => Ok(()),
    }
}

pub async fn read_upload(path: &Path) -> PyqResult<Vec<u8>> {
    if !path.exists() {
        return Err(PyqError::InvalidInput(format!("文件不存在: {}", path.display())));
    }
    Ok(tokio::fs::read(path).await?)
}
