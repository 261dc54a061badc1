use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::{strip_code_fences, CompletionClient};
use crate::pipeline::events::{EventSink, NoticeLevel};
use crate::storage::models::{Question, YEAR_UNKNOWN};
use crate::utils::{PyqError, PyqResult};

const ANALYZE_PROMPT: &str = "You are an expert at analyzing academic question papers across all subjects.\n\
1. Identify the exam year from the question paper header or metadata (patterns like 2021, 2022-23).\n\
2. Identify the main subject area and its sub-discipline.\n\
3. For each question extract the complete question text with its numbering, the subject, \
the sub-discipline, the main concepts being tested and the key technical terms.\n\
NEVER use action words (explain, describe, write, etc.) as topics. Use consistent, \
subject-appropriate names for related concepts.\n\
Return ONLY a valid JSON array where each item has this exact format:\n\
{\"questionText\": \"The complete question text with number\", \
\"subject\": \"The main subject area\", \
\"subSubject\": \"The specific branch or sub-discipline\", \
\"topics\": [\"2-3 main concepts being tested\"], \
\"keywords\": [\"3-5 key technical terms\"], \
\"year\": \"The extracted year from the question paper\"}";

const MIN_QUESTION_CHARS: usize = 20;
const MAX_TOPICS: usize = 3;
const MAX_KEYWORDS: usize = 5;

const ACTION_VERBS: &[&str] = &[
    "explain", "describe", "write", "list", "illustrate", "outline", "discuss", "define", "analyze",
    "compare",
];
const TOPIC_STOP_WORDS: &[&str] = &["the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for"];
const REJECT_MARKERS: &[&str] = &["reg.no", "technology"];

/// 标准化后的 AI 候选题目
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionCandidate {
    pub question_text: String,
    pub subject: String,
    pub sub_subject: String,
    pub topics: Vec<String>,
    pub keywords: Vec<String>,
    pub year: String,
}

impl QuestionCandidate {
    /// 转为题目记录：最多 3 个知识点，关键词去重并排除与知识点相同者，最多 5 个
    pub fn into_question(self, id: String) -> Question {
        let mut topics = self.topics;
        topics.truncate(MAX_TOPICS);

        let topic_set: HashSet<String> = topics.iter().map(|t| t.to_lowercase()).collect();
        let mut seen = HashSet::new();
        let keywords = self
            .keywords
            .into_iter()
            .filter(|k| !topic_set.contains(&k.to_lowercase()))
            .filter(|k| seen.insert(k.to_lowercase()))
            .take(MAX_KEYWORDS)
            .collect();

        Question {
            id,
            text: self.question_text,
            year: self.year,
            subject: self.subject,
            topics,
            keywords,
            related_videos: Vec::new(),
        }
    }
}

/// 按顺序尝试年份格式，先匹配者胜出。区间写法排在单独年份之前，
/// 否则 "2021-22" 会被截成 "2021"。
pub struct YearExtractor {
    patterns: Vec<Regex>,
}

impl YearExtractor {
    pub fn new() -> Self {
        let patterns = [
            r"\b20\d{2}-\d{2,4}\b",
            r"\b20\d{2}/\d{2,4}\b",
            r"\b20\d{2}\s*\(\s*\d{2,4}\s*\)",
            r"(?i)\b20\d{2}\s*batch\b",
            r"(?i)\b20\d{2}\s*scheme\b",
            r"\b20\d{2}\b",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect();

        Self { patterns }
    }

    pub fn extract(&self, text: &str) -> Option<String> {
        self.patterns.iter().find_map(|pattern| {
            pattern.find(text).map(|m| {
                m.as_str()
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '-' || *c == '/')
                    .collect()
            })
        })
    }
}

impl Default for YearExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// 知识点标准化：去掉动词开头和停用词，每个单词首字母大写，去重。
/// 对结果再执行一次不会改变结果。
pub fn standardize_topics(topics: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    topics
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter(|t| {
            let lower = t.to_lowercase();
            !ACTION_VERBS.iter().any(|verb| lower.starts_with(verb))
                && !TOPIC_STOP_WORDS.contains(&lower.as_str())
        })
        .map(title_case)
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

fn title_case(topic: &str) -> String {
    topic
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn is_question_like(text: &str) -> bool {
    let lower = text.to_lowercase();
    text.chars().count() >= MIN_QUESTION_CHARS
        && !REJECT_MARKERS.iter().any(|marker| lower.contains(marker))
        && text.chars().any(|c| c.is_ascii_digit())
}

fn string_field(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_list(item: &Value, key: &str) -> Vec<String> {
    item.get(key)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// 解析模型返回的 JSON 数组并逐字段校验
pub fn parse_candidates(response: &str, document_year: Option<&str>) -> PyqResult<Vec<QuestionCandidate>> {
    let cleaned = strip_code_fences(response);
    let parsed: Value = serde_json::from_str(&cleaned)
        .map_err(|e| PyqError::ParseError(format!("题目分析结果不是合法JSON: {}", e)))?;

    let items = match parsed {
        Value::Array(items) => items,
        _ => return Err(PyqError::ParseError("题目分析结果不是数组".to_string())),
    };
    let total = items.len();

    let candidates: Vec<QuestionCandidate> = items
        .iter()
        .filter_map(|item| {
            let question_text = item.get("questionText")?.as_str()?;
            if !is_question_like(question_text) {
                debug!("丢弃非题目条目: {}", question_text);
                return None;
            }

            let year = document_year
                .map(str::to_string)
                .or_else(|| string_field(item, "year"))
                .unwrap_or_else(|| YEAR_UNKNOWN.to_string());

            Some(QuestionCandidate {
                question_text: question_text.to_string(),
                subject: string_field(item, "subject").unwrap_or_else(|| "General".to_string()),
                sub_subject: string_field(item, "subSubject").unwrap_or_else(|| "General".to_string()),
                topics: standardize_topics(&string_list(item, "topics")),
                keywords: string_list(item, "keywords"),
                year,
            })
        })
        .collect();

    info!("模型返回 {} 条，保留 {} 道题目", total, candidates.len());
    Ok(candidates)
}

/// 结构化题目分析。失败直接返回错误，是否回退由调用方决定。
pub struct QuestionAnalyzer<'a, C: CompletionClient> {
    client: &'a C,
    temperature: f32,
    years: YearExtractor,
}

impl<'a, C: CompletionClient> QuestionAnalyzer<'a, C> {
    pub fn new(client: &'a C, temperature: f32) -> Self {
        Self {
            client,
            temperature,
            years: YearExtractor::new(),
        }
    }

    pub async fn analyze(&self, text: &str, events: &EventSink) -> PyqResult<Vec<QuestionCandidate>> {
        events.notice(NoticeLevel::Info, "正在使用 AI 分析题目...");

        let result = match self.client.complete(ANALYZE_PROMPT, text, self.temperature).await {
            Ok(response) => {
                let document_year = self.years.extract(text);
                debug!("文档年份: {:?}", document_year);
                parse_candidates(&response, document_year.as_deref())
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => events.notice(NoticeLevel::Success, "题目分析完成"),
            Err(e) => {
                warn!("题目分析失败: {}", e);
                events.notice(NoticeLevel::Error, "题目分析失败");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::tests::ScriptedCompletion;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_year_extraction() {
        let years = YearExtractor::new();
        assert_eq!(
            years.extract("B.Tech Degree Examination 2021-22 (2019 Scheme)").as_deref(),
            Some("2021-22")
        );
        assert_eq!(years.extract("Model paper, 2023 Scheme").as_deref(), Some("2023"));
        assert_eq!(years.extract("Held in 2020/21 session").as_deref(), Some("2020/21"));
        assert_eq!(years.extract("Semester exam, May 2019").as_deref(), Some("2019"));
        assert_eq!(years.extract("No year in this header"), None);
    }

    #[test]
    fn test_standardize_topics() {
        let topics = strings(&[
            "explain paging",
            "virtual memory",
            "Virtual Memory",
            "the",
            "  ",
            "PAGE replacement",
            "Define deadlock",
        ]);
        assert_eq!(
            standardize_topics(&topics),
            strings(&["Virtual Memory", "Page Replacement"])
        );
    }

    #[test]
    fn test_standardize_topics_idempotent() {
        let topics = strings(&["binary SEARCH tree", "the", "Compare sorts", "hashing", "Hashing", "an"]);
        let once = standardize_topics(&topics);
        assert_eq!(standardize_topics(&once), once);
    }

    #[test]
    fn test_parse_rejects_header_lines() {
        let response = r#"[
            {"questionText": "Reg.No: 12345 Name of student", "subject": "X", "topics": [], "keywords": []},
            {"questionText": "Kerala University of Technology, 2021 Examination", "topics": []},
            {"questionText": "1. Explain the working of a two pass assembler.", "subject": "System Software",
             "subSubject": "Assemblers", "topics": ["Two Pass Assembler", "explain passes"],
             "keywords": ["assembler", 42, "symbol table"], "year": "2019"},
            {"questionText": "Short 1?"},
            {"questionText": "What is the role of a loader in memory?", "topics": []},
            "not an object"
        ]"#;

        let candidates = parse_candidates(response, None).unwrap();
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.subject, "System Software");
        assert_eq!(c.topics, strings(&["Two Pass Assembler"]));
        assert_eq!(c.keywords, strings(&["assembler", "symbol table"]));
        assert_eq!(c.year, "2019");
    }

    #[test]
    fn test_parse_prefers_document_year_and_defaults() {
        let response = "```json\n[{\"questionText\": \"2. Describe the phases of a compiler.\", \"year\": \"2018\"}]\n```";
        let candidates = parse_candidates(response, Some("2021-22")).unwrap();
        assert_eq!(candidates[0].year, "2021-22");
        assert_eq!(candidates[0].subject, "General");
        assert_eq!(candidates[0].sub_subject, "General");

        let candidates = parse_candidates(
            r#"[{"questionText": "2. Describe the phases of a compiler."}]"#,
            None,
        )
        .unwrap();
        assert_eq!(candidates[0].year, YEAR_UNKNOWN);
    }

    #[test]
    fn test_parse_requires_array() {
        assert!(matches!(
            parse_candidates(r#"{"questionText": "1. x"}"#, None),
            Err(PyqError::ParseError(_))
        ));
        assert!(parse_candidates("Sorry, I cannot help with that.", None).is_err());
    }

    #[test]
    fn test_into_question_limits_topics_and_keywords() {
        let candidate = QuestionCandidate {
            question_text: "3. Compare TCP and UDP protocols.".to_string(),
            subject: "Networking".to_string(),
            sub_subject: "Transport Layer".to_string(),
            topics: strings(&["Tcp", "Udp", "Flow Control", "Congestion"]),
            keywords: strings(&["tcp", "handshake", "handshake", "port", "socket", "segment", "window"]),
            year: "2022".to_string(),
        };

        let q = candidate.into_question("q-1-0".to_string());
        assert_eq!(q.topics.len(), 3);
        assert_eq!(q.keywords, strings(&["handshake", "port", "socket", "segment", "window"]));
        assert_eq!(q.year, "2022");
        assert!(q.related_videos.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_extracts_year_from_full_text() {
        let client = ScriptedCompletion::new(vec![Ok(
            r#"[{"questionText": "1. Explain the working of a two pass assembler.", "year": "2017"}]"#.to_string(),
        )]);
        let analyzer = QuestionAnalyzer::new(&client, 0.1);

        let text = "KTU B.Tech Examination 2021-22\n1. Explain the working of a two pass assembler.";
        let candidates = analyzer.analyze(text, &EventSink::disabled()).await.unwrap();
        assert_eq!(candidates[0].year, "2021-22");
        assert!(client.prompts.borrow()[0].contains("questionText"));
    }

    #[tokio::test]
    async fn test_analyze_propagates_service_error() {
        let client = ScriptedCompletion::new(vec![Err(PyqError::MissingCredential("ai.api_key"))]);
        let analyzer = QuestionAnalyzer::new(&client, 0.1);
        assert!(analyzer.analyze("text", &EventSink::disabled()).await.is_err());
    }
}
