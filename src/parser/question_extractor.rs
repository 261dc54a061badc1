use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::ExtractedPage;
use crate::config::SubjectConfig;
use crate::storage::models::{IdGenerator, Question, YEAR_UNKNOWN};

const MIN_QUESTION_CHARS: usize = 15;
const MAX_KEYWORDS: usize = 5;
const STOP_WORDS: &[&str] = &[
    "and", "the", "a", "an", "in", "on", "at", "to", "for", "with", "by", "about", "as", "of",
];
const STRIPPED_PUNCTUATION: &[char] = &['.', ',', '?', '!', ';', ':', '(', ')', '"', '\''];

/// 不依赖 AI 的题目提取：按题目边界正则切分，再用关键词表判定学科
pub struct QuestionExtractor {
    patterns: Vec<(Regex, &'static str)>,
    numbering: Regex,
    whitespace: Regex,
    subjects: SubjectConfig,
    dedupe: bool,
}

impl QuestionExtractor {
    pub fn new(subjects: SubjectConfig) -> Self {
        // 多个模式可能命中同一句话，重复项由 dedupe 决定是否保留
        let patterns = vec![
            // 1. What is paging?
            (Regex::new(r"\d+\.\s.+?\?").unwrap(), "numbered_question"),
            // 2. Write short notes on thrashing.
            (Regex::new(r"\d+\.\s.+?\.(\s|$)").unwrap(), "numbered_statement"),
            (Regex::new(r"(?i)Question\s\d+.+?\?").unwrap(), "question_label"),
            (Regex::new(r"(?i)Explain.+?\?").unwrap(), "explain"),
            (Regex::new(r"(?i)Describe.+?\?").unwrap(), "describe"),
            (Regex::new(r"(?i)Define.+?\?").unwrap(), "define"),
        ];

        Self {
            patterns,
            numbering: Regex::new(r"^\d+\.\s").unwrap(),
            whitespace: Regex::new(r"\s+").unwrap(),
            subjects,
            dedupe: false,
        }
    }

    /// 按规范化后的题干去重
    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    pub fn extract(&self, pages: &[ExtractedPage]) -> Vec<Question> {
        let mut ids = IdGenerator::new();
        let mut questions: Vec<Question> = Vec::new();
        let mut seen = HashSet::new();

        for page in pages {
            for (pattern, kind) in &self.patterns {
                for mat in pattern.find_iter(&page.text) {
                    let text = self.clean(mat.as_str());

                    if text.chars().count() < MIN_QUESTION_CHARS {
                        continue;
                    }
                    if self.dedupe && !seen.insert(text.to_lowercase()) {
                        continue;
                    }

                    debug!("题目匹配 [{}] 第{}页: {}", kind, page.page_number, text);

                    let keywords = extract_keywords(&text);
                    let subject = self.determine_subject(&text);
                    questions.push(Question {
                        id: ids.next_id(),
                        text,
                        year: YEAR_UNKNOWN.to_string(),
                        subject,
                        topics: Vec::new(),
                        keywords,
                        related_videos: Vec::new(),
                    });
                }
            }
        }

        info!("启发式提取完成，共 {} 道题目", questions.len());
        questions
    }

    fn clean(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        let unnumbered = self.numbering.replace(trimmed, "");
        self.whitespace.replace_all(&unnumbered, " ").into_owned()
    }

    /// 关键词表子串命中最多的学科；全部为 0 时返回兜底学科
    pub fn determine_subject(&self, text: &str) -> String {
        let lower = text.to_lowercase();
        let mut best: Option<(&str, usize)> = None;

        for subject in &self.subjects.subjects {
            let score = subject
                .keywords
                .iter()
                .filter(|keyword| lower.contains(keyword.as_str()))
                .count();

            if score > best.map(|(_, s)| s).unwrap_or(0) {
                best = Some((subject.name.as_str(), score));
            }
        }

        match best {
            Some((name, _)) => name.to_string(),
            None => self.subjects.fallback.clone(),
        }
    }
}

/// 词频最高的前 5 个词，频率相同按首次出现顺序
pub fn extract_keywords(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !STRIPPED_PUNCTUATION.contains(c))
        .collect();

    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in cleaned.split_whitespace() {
        if word.chars().count() <= 3 || STOP_WORDS.contains(&word) {
            continue;
        }
        let count = counts.entry(word).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    // sort_by 是稳定排序，保留首次出现顺序
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}
