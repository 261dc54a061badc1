mod ai;
mod analysis;
mod config;
mod parser;
mod pipeline;
mod storage;
mod utils;
mod video;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use ai::ChatClient;
use config::{AppConfig, SubjectConfig, SETTINGS_PATH};
use parser::{IngestMode, OcrEngine};
use pipeline::{EventSink, NoticeLevel, Pipeline, PipelineEvent};
use storage::models::{AnalysisResult, QuestionFilter, ALL_SUBJECTS, ALL_YEARS};
use storage::Database;
use utils::logger;
use video::YoutubeClient;

#[derive(Parser)]
#[command(name = "pyqbot")]
#[command(about = "历年试卷题目提取与分析工具", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 初始化配置和数据库
    Init,
    /// 分析一份试卷（PDF 或图片）
    Analyze {
        /// 试卷文件路径
        file: PathBuf,
        /// 处理方式，auto 按文件内容判断
        #[arg(short, long, value_enum, default_value_t = ModeArg::Auto)]
        mode: ModeArg,
    },
    /// 查看题库
    List {
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        /// 在题干、关键词、知识点中搜索
        #[arg(short, long)]
        keyword: Option<String>,
        /// 以 JSON 输出
        #[arg(long)]
        json: bool,
    },
    /// 查看高频知识点
    Topics,
    /// 清空题库
    Clear,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Auto,
    Pdf,
    PdfOcr,
    Image,
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_logger();
    info!("pyqbot 启动");

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init_command().await?;
        }
        Commands::Analyze { file, mode } => {
            analyze_command(&file, mode).await?;
        }
        Commands::List {
            year,
            subject,
            keyword,
            json,
        } => {
            list_command(year, subject, keyword, json).await?;
        }
        Commands::Topics => {
            topics_command().await?;
        }
        Commands::Clear => {
            clear_command().await?;
        }
    }

    Ok(())
}

async fn open_database(app_config: &AppConfig) -> Result<Database> {
    if let Some(parent) = Path::new(&app_config.storage.database_path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let db = Database::new(&app_config.database_url()).await?;
    db.init_schema().await?;
    Ok(db)
}

async fn init_command() -> Result<()> {
    info!("初始化系统...");

    tokio::fs::create_dir_all("config").await?;

    let app_config = AppConfig::default();
    app_config.save(SETTINGS_PATH)?;
    info!("已生成配置文件: {}", SETTINGS_PATH);

    let subject_config = SubjectConfig::default();
    let subject_toml = toml::to_string_pretty(&subject_config)?;
    tokio::fs::write(config::subjects::SUBJECTS_PATH, subject_toml).await?;
    info!("已生成学科关键词配置: {}", config::subjects::SUBJECTS_PATH);

    open_database(&app_config).await?;
    info!("数据库初始化完成: {}", app_config.storage.database_path);

    info!("✅ 系统初始化完成！");
    info!("下一步:");
    info!("  1. 编辑 {} 配置 [ai] 和 [video] 的 api_key", SETTINGS_PATH);
    info!("  2. 运行 'pyqbot analyze <试卷文件>' 开始分析");

    Ok(())
}

async fn analyze_command(file: &Path, mode: ModeArg) -> Result<()> {
    let app_config = AppConfig::load()?;
    let subjects = SubjectConfig::load()?;
    let db = open_database(&app_config).await?;

    let bytes = parser::read_upload(file).await?;
    let mode = match mode {
        ModeArg::Auto => IngestMode::detect(&bytes)?,
        ModeArg::Pdf => IngestMode::PdfText,
        ModeArg::PdfOcr => IngestMode::PdfOcr,
        ModeArg::Image => IngestMode::Image,
    };
    info!("分析文件: {} (处理方式: {})", file.display(), mode.label());

    if mode != IngestMode::PdfText && !OcrEngine::new(app_config.ocr.clone()).is_available() {
        warn!("⚠️ 未找到 tesseract ({})，OCR 将会失败", app_config.ocr.tesseract_path);
    }

    let client = ChatClient::new(app_config.ai.clone())?;
    if !client.is_configured() {
        info!("⚠️ ai.api_key 未配置，将跳过 AI 优化并使用基础提取方式");
    }
    let youtube = YoutubeClient::new(app_config.video.clone())?;

    let (events, rx) = EventSink::channel();
    let printer = tokio::spawn(log_events(rx));

    let mut pipeline = Pipeline::new(app_config, subjects, client, youtube, db, events);
    let outcome = match mode {
        IngestMode::PdfText => pipeline.process_pdf(bytes).await,
        IngestMode::PdfOcr => pipeline.process_pdf_ocr(bytes).await,
        IngestMode::Image => pipeline.process_image(bytes).await,
    };
    drop(pipeline);
    printer.await?;

    let result = outcome?;
    print_questions(&result);
    print_topics(&result);
    Ok(())
}

/// 把流水线事件写到日志
async fn log_events(mut rx: UnboundedReceiver<PipelineEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            PipelineEvent::Progress { percent, step } => info!("[{:>5.1}%] {}", percent, step),
            PipelineEvent::Notice { level, message } => match level {
                NoticeLevel::Error => warn!("{}", message),
                _ => info!("{}", message),
            },
            PipelineEvent::Status { status, message } => match message {
                Some(message) => info!("状态: {:?} ({})", status, message),
                None => info!("状态: {:?}", status),
            },
        }
    }
}

async fn list_command(
    year: Option<String>,
    subject: Option<String>,
    keyword: Option<String>,
    json: bool,
) -> Result<()> {
    let app_config = AppConfig::load()?;
    let db = open_database(&app_config).await?;

    let filter = QuestionFilter::new(
        year.as_deref().unwrap_or(ALL_YEARS),
        subject.as_deref().unwrap_or(ALL_SUBJECTS),
        keyword.as_deref().unwrap_or(""),
    );
    let result = db.load_filtered(&filter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.questions.is_empty() {
        let total = db.count_questions().await?;
        if total == 0 {
            info!("题库为空，请先运行 'pyqbot analyze <试卷文件>'");
        } else {
            let (years, subjects) = db.distinct_years_and_subjects().await?;
            info!("没有符合条件的题目 (共 {} 道)", total);
            info!("可选年份: {}", years.join(", "));
            info!("可选学科: {}", subjects.join(", "));
        }
        return Ok(());
    }

    print_questions(&result);
    Ok(())
}

async fn topics_command() -> Result<()> {
    let app_config = AppConfig::load()?;
    let db = open_database(&app_config).await?;
    let result = db.load_result().await?;

    if result.topics.is_empty() {
        info!("暂无高频知识点");
        return Ok(());
    }
    print_topics(&result);
    Ok(())
}

async fn clear_command() -> Result<()> {
    let app_config = AppConfig::load()?;
    let db = open_database(&app_config).await?;
    db.clear().await?;
    info!("✅ 题库已清空");
    Ok(())
}

fn print_questions(result: &AnalysisResult) {
    for (index, question) in result.questions.iter().enumerate() {
        println!("{}. {}", index + 1, question.text);
        println!("   年份: {}  学科: {}", question.year, question.subject);
        if !question.topics.is_empty() {
            println!("   知识点: {}", question.topics.join(", "));
        }
        if !question.keywords.is_empty() {
            println!("   关键词: {}", question.keywords.join(", "));
        }
        for video in &question.related_videos {
            println!("   ▶ {} {}", video.title, video.url);
        }
    }
}

fn print_topics(result: &AnalysisResult) {
    if result.topics.is_empty() {
        return;
    }
    println!("高频知识点:");
    for topic in &result.topics {
        println!("  {} ({} 题)", topic.name, topic.count);
    }
}
