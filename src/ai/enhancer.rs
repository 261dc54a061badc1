use tracing::{info, warn};

use super::CompletionClient;
use crate::pipeline::events::{EventSink, NoticeLevel};

const ENHANCE_PROMPT: &str = "You are an expert at enhancing and correcting text extracted from academic question papers.\n\
Your tasks:\n\
1. Fix grammar, spelling, and OCR errors\n\
2. Properly format questions with correct, consistent numbering\n\
3. Ensure each question starts on a new line\n\
4. Maintain the original structure of the document and preserve section headings\n\
5. Fix any broken sentences or paragraphs\n\
6. Format math equations using LaTeX-style notation\n\
7. Remove any document headers, footers, or page numbers that aren't part of questions\n\
Return only the corrected text without any explanations or comments.";

/// OCR/PDF 噪声文本的 AI 清洗。任何失败都返回原文。
pub struct TextEnhancer<'a, C: CompletionClient> {
    client: &'a C,
    temperature: f32,
}

impl<'a, C: CompletionClient> TextEnhancer<'a, C> {
    pub fn new(client: &'a C, temperature: f32) -> Self {
        Self { client, temperature }
    }

    pub async fn enhance(&self, raw_text: &str, events: &EventSink) -> String {
        events.notice(NoticeLevel::Info, "正在使用 AI 优化提取文本...");

        match self.client.complete(ENHANCE_PROMPT, raw_text, self.temperature).await {
            Ok(enhanced) if !enhanced.trim().is_empty() => {
                info!("文本优化完成: {} -> {} 字符", raw_text.len(), enhanced.len());
                events.notice(NoticeLevel::Success, "文本优化完成");
                enhanced
            }
            Ok(_) => {
                warn!("文本优化返回空内容，使用原文");
                events.notice(NoticeLevel::Error, "文本优化失败，使用原始文本");
                raw_text.to_string()
            }
            Err(e) => {
                warn!("文本优化失败，使用原文: {}", e);
                events.notice(NoticeLevel::Error, "文本优化失败，使用原始文本");
                raw_text.to_string()
            }
        }
    }
}
