use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

use super::ExtractedPage;
use crate::config::OcrConfig;

/// 调用外部 tesseract / pdftoppm 完成 OCR，本身不做识别
#[derive(Debug, Clone)]
pub struct OcrEngine {
    config: OcrConfig,
}

impl OcrEngine {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    pub fn is_available(&self) -> bool {
        Command::new(&self.config.tesseract_path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// 图片 OCR：图片字节经 stdin 交给 tesseract
    pub fn recognize_image(&self, bytes: &[u8]) -> Result<String> {
        info!("开始OCR识别图片 ({} 字节)", bytes.len());

        let mut child = Command::new(&self.config.tesseract_path)
            .args(["stdin", "stdout", "-l", self.config.language.as_str(), "--psm", "3"])
            .arg("-c")
            .arg("preserve_interword_spaces=1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| {
                format!("无法启动 tesseract (路径: {})", self.config.tesseract_path)
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(bytes).context("写入 tesseract 输入失败")?;
        }

        let output = child.wait_with_output().context("等待 tesseract 结束失败")?;
        if !output.status.success() {
            anyhow::bail!(
                "tesseract 执行失败: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        info!("OCR完成，识别文本 {} 字符", text.len());
        Ok(text)
    }

    /// PDF OCR：pdftoppm 逐页渲染为 PNG，再逐页识别
    pub fn recognize_pdf(&self, bytes: &[u8]) -> Result<Vec<ExtractedPage>> {
        let workdir = tempfile::tempdir().context("创建临时目录失败")?;
        let pdf_path = workdir.path().join("upload.pdf");
        std::fs::write(&pdf_path, bytes)?;

        let prefix = workdir.path().join("page");
        info!("PDF转图片: dpi={}", self.config.dpi);
        let output = Command::new(&self.config.pdftoppm_path)
            .arg("-png")
            .arg("-r")
            .arg(self.config.dpi.to_string())
            .arg(&pdf_path)
            .arg(&prefix)
            .output()
            .with_context(|| {
                format!("无法启动 pdftoppm (路径: {})", self.config.pdftoppm_path)
            })?;

        if !output.status.success() {
            anyhow::bail!(
                "pdftoppm 执行失败: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let images = rendered_pages(workdir.path())?;
        if images.is_empty() {
            anyhow::bail!("PDF未渲染出任何页面");
        }
        info!("共渲染 {} 页", images.len());

        let mut pages = Vec::with_capacity(images.len());
        for (index, image_path) in images.iter().enumerate() {
            let page_number = index as u32 + 1;
            debug!("识别第 {} 页: {}", page_number, image_path.display());

            let image = std::fs::read(image_path)?;
            match self.recognize_image(&image) {
                Ok(text) => pages.push(ExtractedPage { text, page_number }),
                Err(e) => {
                    warn!("第 {} 页OCR失败: {}", page_number, e);
                    pages.push(ExtractedPage {
                        text: String::new(),
                        page_number,
                    });
                }
            }
        }

        if pages.iter().all(|p| p.text.trim().is_empty()) {
            anyhow::bail!("所有页面OCR均未识别出文本");
        }

        Ok(pages)
    }
}

/// pdftoppm 输出 page-1.png / page-01.png 等，按页码排序
fn rendered_pages(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut numbered: Vec<(u32, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e != "png").unwrap_or(true) {
            continue;
        }
        let number = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.rsplit('-').next())
            .and_then(|n| n.parse::<u32>().ok());
        if let Some(number) = number {
            numbered.push((number, path));
        }
    }

    numbered.sort_by_key(|(n, _)| *n);
    Ok(numbered.into_iter().map(|(_, p)| p).collect())
}
