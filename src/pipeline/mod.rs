pub mod events;

pub use events::{EventSink, NoticeLevel, PipelineEvent, ProcessStatus};

use tracing::{debug, error, info, warn};

use crate::ai::analyzer::YearExtractor;
use crate::ai::{CompletionClient, QuestionAnalyzer, TextEnhancer};
use crate::analysis::{aggregate, ExamContext, ExamContextDetector};
use crate::config::{AppConfig, SubjectConfig};
use crate::parser::{join_pages, validate_upload, ExtractedPage, IngestMode, OcrEngine, PdfParser, QuestionExtractor};
use crate::storage::models::{AnalysisResult, IdGenerator, Question, YEAR_UNKNOWN};
use crate::storage::Database;
use crate::utils::{PyqError, PyqResult};
use crate::video::{VideoCache, VideoMatcher, VideoSearch};

/// 单份文档的处理会话：考试背景与视频缓存只在本会话内有效
pub struct Session {
    context: Option<ExamContext>,
    video_cache: VideoCache,
}

impl Session {
    pub fn new() -> Self {
        Self {
            context: None,
            video_cache: VideoCache::new(),
        }
    }

    /// 新文档开始时调用
    pub fn reset(&mut self) {
        self.context = None;
        self.video_cache.clear();
    }

    /// 首次调用时识别，之后直接返回已识别的结果
    pub fn context_for(&mut self, detector: &ExamContextDetector, text: &str) -> &ExamContext {
        self.context.get_or_insert_with(|| detector.detect(text))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// 各阶段的进度区间，视频阶段为 `base + span * (i + 1) / total`
#[derive(Debug, Clone, Copy)]
pub struct StagePlan {
    pub extract: (f32, f32),
    pub enhance: (f32, f32),
    pub analyze: (f32, f32),
    pub video_base: f32,
    pub video_span: f32,
}

pub const PDF_TEXT_PLAN: StagePlan = StagePlan {
    extract: (10.0, 30.0),
    enhance: (35.0, 50.0),
    analyze: (55.0, 70.0),
    video_base: 75.0,
    video_span: 25.0,
};

pub const IMAGE_PLAN: StagePlan = StagePlan {
    extract: (10.0, 40.0),
    enhance: (45.0, 60.0),
    analyze: (65.0, 80.0),
    video_base: 85.0,
    video_span: 15.0,
};

pub const PDF_OCR_PLAN: StagePlan = StagePlan {
    extract: (10.0, 40.0),
    enhance: (45.0, 50.0),
    analyze: (55.0, 70.0),
    video_base: 75.0,
    video_span: 25.0,
};

impl StagePlan {
    pub fn for_mode(mode: IngestMode) -> Self {
        match mode {
            IngestMode::PdfText => PDF_TEXT_PLAN,
            IngestMode::PdfOcr => PDF_OCR_PLAN,
            IngestMode::Image => IMAGE_PLAN,
        }
    }

    fn video_progress(&self, done: usize, total: usize) -> f32 {
        self.video_base + self.video_span * done as f32 / total.max(1) as f32
    }
}

fn storage_error(e: anyhow::Error) -> PyqError {
    PyqError::StorageError(format!("{:#}", e))
}

/// 题目提取流水线：文本提取 → AI 优化 → AI 分析（失败时启发式提取）→ 视频匹配 → 知识点聚合 → 保存
pub struct Pipeline<C: CompletionClient, V: VideoSearch> {
    config: AppConfig,
    client: C,
    matcher: VideoMatcher<V>,
    extractor: QuestionExtractor,
    detector: ExamContextDetector,
    years: YearExtractor,
    ocr: OcrEngine,
    store: Database,
    events: EventSink,
    session: Session,
}

impl<C: CompletionClient, V: VideoSearch> Pipeline<C, V> {
    pub fn new(
        config: AppConfig,
        subjects: SubjectConfig,
        client: C,
        search: V,
        store: Database,
        events: EventSink,
    ) -> Self {
        let matcher = VideoMatcher::new(search, config.video.max_results);
        let extractor = QuestionExtractor::new(subjects).with_dedupe(config.pipeline.dedupe_questions);
        let ocr = OcrEngine::new(config.ocr.clone());

        Self {
            config,
            client,
            matcher,
            extractor,
            detector: ExamContextDetector::new(),
            years: YearExtractor::new(),
            ocr,
            store,
            events,
            session: Session::new(),
        }
    }

    pub async fn process_pdf(&mut self, bytes: Vec<u8>) -> PyqResult<AnalysisResult> {
        self.process(bytes, IngestMode::PdfText).await
    }

    pub async fn process_pdf_ocr(&mut self, bytes: Vec<u8>) -> PyqResult<AnalysisResult> {
        self.process(bytes, IngestMode::PdfOcr).await
    }

    pub async fn process_image(&mut self, bytes: Vec<u8>) -> PyqResult<AnalysisResult> {
        self.process(bytes, IngestMode::Image).await
    }

    async fn process(&mut self, bytes: Vec<u8>, mode: IngestMode) -> PyqResult<AnalysisResult> {
        self.events.status(ProcessStatus::Uploading, None);
        info!("开始处理上传文件: mode={}, {} 字节", mode.label(), bytes.len());

        match self.run(bytes, mode).await {
            Ok(result) => {
                self.events.progress(100.0, "处理完成");
                self.events.status(ProcessStatus::Completed, None);
                self.events.notice(
                    NoticeLevel::Success,
                    format!("共提取 {} 道题目", result.questions.len()),
                );
                Ok(result)
            }
            Err(e) => {
                error!("处理失败: {}", e);
                self.events.notice(NoticeLevel::Error, e.to_string());
                self.events.status(ProcessStatus::Error, Some(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run(&mut self, bytes: Vec<u8>, mode: IngestMode) -> PyqResult<AnalysisResult> {
        validate_upload(&bytes, mode, self.config.pipeline.max_upload_bytes)?;
        if self.config.pipeline.enrich_videos && !self.matcher.is_ready() {
            return Err(PyqError::MissingCredential("video.api_key"));
        }

        self.begin_document().await?;
        let plan = StagePlan::for_mode(mode);

        self.events.progress(plan.extract.0, "正在提取文本");
        let pages = self.extract_pages(bytes, mode).await?;
        self.events.progress(plan.extract.1, "文本提取完成");

        self.analyze_pages(pages, &plan).await
    }

    /// 清空上一份文档留下的会话状态和已保存结果
    async fn begin_document(&mut self) -> PyqResult<()> {
        self.session.reset();
        self.store.clear().await.map_err(storage_error)?;
        self.events.reset_progress();
        self.events.status(ProcessStatus::Processing, None);
        Ok(())
    }

    async fn extract_pages(&self, bytes: Vec<u8>, mode: IngestMode) -> PyqResult<Vec<ExtractedPage>> {
        let ocr = self.ocr.clone();
        let pages = tokio::task::spawn_blocking(move || match mode {
            IngestMode::PdfText => PdfParser::new().extract_pages(&bytes),
            IngestMode::PdfOcr => ocr.recognize_pdf(&bytes),
            IngestMode::Image => ocr
                .recognize_image(&bytes)
                .map(|text| vec![ExtractedPage { text, page_number: 1 }]),
        })
        .await
        .map_err(|e| PyqError::DocumentError(format!("文本提取任务异常: {}", e)))?
        .map_err(|e| PyqError::DocumentError(format!("{:#}", e)))?;

        if pages.iter().all(|p| p.text.trim().is_empty()) {
            return Err(PyqError::DocumentError("未能从文件中提取到文本".to_string()));
        }
        Ok(pages)
    }

    /// 三种输入共用的后半段流程
    pub(crate) async fn analyze_pages(
        &mut self,
        pages: Vec<ExtractedPage>,
        plan: &StagePlan,
    ) -> PyqResult<AnalysisResult> {
        let raw_text = join_pages(&pages);

        self.events.progress(plan.enhance.0, "正在优化文本");
        let enhanced = TextEnhancer::new(&self.client, self.config.ai.temperature)
            .enhance(&raw_text, &self.events)
            .await;
        self.events.progress(plan.enhance.1, "文本优化完成");

        self.events.progress(plan.analyze.0, "正在分析题目");
        let mut questions = self.identify_questions(&enhanced).await;
        self.backfill_year(&mut questions, &enhanced, &raw_text);
        self.events.progress(plan.analyze.1, "题目分析完成");

        let context = self.session.context_for(&self.detector, &enhanced).clone();

        if self.config.pipeline.enrich_videos {
            questions = self.attach_videos(questions, &context, plan).await;
        }

        let topics = aggregate(&questions);
        info!("共 {} 道题目，{} 个高频知识点", questions.len(), topics.len());

        let result = AnalysisResult { questions, topics };
        self.store.save_result(&result).await.map_err(storage_error)?;
        Ok(result)
    }

    /// AI 分析失败或没有得到任何题目时改用启发式提取
    async fn identify_questions(&self, text: &str) -> Vec<Question> {
        let analyzer = QuestionAnalyzer::new(&self.client, self.config.ai.analysis_temperature);

        match analyzer.analyze(text, &self.events).await {
            Ok(candidates) if !candidates.is_empty() => {
                let mut ids = IdGenerator::new();
                candidates
                    .into_iter()
                    .map(|c| c.into_question(ids.next_id()))
                    .collect()
            }
            Ok(_) => {
                warn!("AI 分析没有得到有效题目，改用启发式提取");
                self.heuristic(text)
            }
            Err(e) => {
                warn!("AI 分析失败，改用启发式提取: {}", e);
                self.heuristic(text)
            }
        }
    }

    fn heuristic(&self, text: &str) -> Vec<Question> {
        self.events.notice(NoticeLevel::Info, "使用基础方式提取题目");
        let page = ExtractedPage {
            text: text.to_string(),
            page_number: 1,
        };
        self.extractor.extract(std::slice::from_ref(&page))
    }

    /// 启发式结果没有年份，用全文识别出的年份补上
    fn backfill_year(&self, questions: &mut [Question], enhanced: &str, raw: &str) {
        if questions.iter().all(|q| q.year != YEAR_UNKNOWN) {
            return;
        }
        let year = self.years.extract(enhanced).or_else(|| self.years.extract(raw));
        if let Some(year) = year {
            for question in questions.iter_mut().filter(|q| q.year == YEAR_UNKNOWN) {
                question.year = year.clone();
            }
        }
    }

    /// 逐题匹配视频，单题失败只记录日志，不影响其他题目
    async fn attach_videos(
        &mut self,
        questions: Vec<Question>,
        context: &ExamContext,
        plan: &StagePlan,
    ) -> Vec<Question> {
        let total = questions.len();
        let mut enriched = Vec::with_capacity(total);

        for (i, question) in questions.into_iter().enumerate() {
            match self
                .matcher
                .match_question(&question, Some(context), &mut self.session.video_cache)
                .await
            {
                Ok(matched) => enriched.push(matched),
                Err(e) => {
                    warn!("题目 {} 视频匹配失败: {}", question.id, e);
                    enriched.push(question);
                }
            }
            self.events
                .progress(plan.video_progress(i + 1, total), format!("正在匹配相关视频 ({}/{})", i + 1, total));
        }

        let (hits, misses) = self.session.video_cache.stats();
        debug!(
            "视频缓存: {} 条, 命中 {} 次, 未命中 {} 次",
            self.session.video_cache.len(),
            hits,
            misses
        );
        enriched
    }
}
