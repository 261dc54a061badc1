use regex::Regex;
use serde::Serialize;
use tracing::info;

/// 试卷类型表：(类型, 匹配词, 来源表, 层次)。按顺序匹配，先命中者胜出。
const EXAM_TYPES: &[(&str, &[&str], &[(&str, &[&str])], &str)] = &[
    (
        "university",
        &["university", "college", "semester", "degree"],
        &[
            ("KTU", &["ktu", "kerala technological", "apj abdul kalam"]),
            ("CUSAT", &["cusat", "cochin university"]),
            ("MG", &["mg university", "mahatma gandhi"]),
        ],
        "undergraduate",
    ),
    (
        "entrance",
        &["entrance", "admission test", "competitive exam", "selection test"],
        &[
            ("JEE", &["jee", "joint entrance", "iit-jee"]),
            ("NEET", &["neet", "medical entrance"]),
            ("GATE", &["gate", "graduate aptitude"]),
        ],
        "competitive",
    ),
    (
        "school",
        &["school", "class", "grade", "std", "standard", "board exam"],
        &[
            ("CBSE", &["cbse", "central board"]),
            ("ICSE", &["icse", "indian certificate"]),
            ("State", &["state board", "state syllabus"]),
        ],
        "school",
    ),
    (
        "competitive",
        &["competitive", "recruitment", "exam", "test series"],
        &[
            ("PSC", &["psc", "public service"]),
            ("UPSC", &["upsc", "civil service"]),
            ("SSC", &["ssc", "staff selection"]),
        ],
        "competitive",
    ),
];

const SUBJECT_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "computerScience",
        &[
            "system software",
            "operating system",
            "data structures",
            "computer networks",
            "database",
            "artificial intelligence",
            "programming",
            "algorithms",
        ],
    ),
    (
        "science",
        &["physics", "chemistry", "biology", "mathematics", "botany", "zoology", "environmental science"],
    ),
    (
        "engineering",
        &[
            "digital electronics",
            "microprocessors",
            "computer architecture",
            "electrical",
            "mechanical",
            "civil",
            "electronics",
        ],
    ),
    (
        "commerce",
        &["accountancy", "business studies", "economics", "finance", "marketing", "management"],
    ),
    (
        "humanities",
        &["history", "geography", "political science", "sociology", "psychology", "philosophy", "literature"],
    ),
];

const COURSES: &[(&str, &[&str])] = &[
    ("B.Tech", &["b.tech", "bachelor of technology", "btech"]),
    ("M.Tech", &["m.tech", "master of technology", "mtech"]),
    ("BCA", &["bca", "bachelor of computer applications"]),
    ("MCA", &["mca", "master of computer applications"]),
];

const BRANCHES: &[(&str, &[&str])] = &[
    ("CSE", &["computer science", "cs", "cse"]),
    ("ECE", &["electronics", "ec", "ece"]),
    ("EEE", &["electrical", "ee", "eee"]),
    ("ME", &["mechanical", "me", "mech"]),
];

const STREAMS: &[&str] = &["science", "commerce", "arts", "humanities"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextDetails {
    pub course: Option<String>,
    pub semester: Option<String>,
    pub branch: Option<String>,
    pub stream: Option<String>,
}

/// 整份试卷推断出的考试背景，用于丰富视频搜索词
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamContext {
    pub exam_type: String,
    pub source: String,
    pub level: Option<String>,
    pub subject: Option<String>,
    pub details: ContextDetails,
}

impl Default for ExamContext {
    fn default() -> Self {
        Self {
            exam_type: "general".to_string(),
            source: "general".to_string(),
            level: None,
            subject: None,
            details: ContextDetails::default(),
        }
    }
}

impl ExamContext {
    /// 搜索词中的层次标记
    pub fn level_token(&self) -> &'static str {
        match self.level.as_deref() {
            Some("undergraduate") => "college",
            Some("school") => "school",
            Some("competitive") => "exam",
            _ => "",
        }
    }
}

pub struct ExamContextDetector {
    semester: Regex,
    school_class: Regex,
    branches: Vec<(&'static str, Regex)>,
}

impl ExamContextDetector {
    pub fn new() -> Self {
        let branches = BRANCHES
            .iter()
            .map(|(name, words)| {
                let alternatives: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
                let pattern = format!(r"\b(?:{})\b", alternatives.join("|"));
                (*name, Regex::new(&pattern).unwrap())
            })
            .collect();

        Self {
            semester: Regex::new(r"(?i)\b(s[1-8]|semester\s*[1-8]|sem\s*[1-8])\b").unwrap(),
            school_class: Regex::new(r"(?i)\b(class|grade|std\.?)\s*([1-9]|1[0-2])(th|st|nd|rd)?\b").unwrap(),
            branches,
        }
    }

    pub fn detect(&self, text: &str) -> ExamContext {
        let lower = text.to_lowercase();
        let mut context = ExamContext::default();

        for (exam_type, patterns, sources, level) in EXAM_TYPES {
            if !patterns.iter().any(|p| lower.contains(p)) {
                continue;
            }
            context.exam_type = exam_type.to_string();
            context.level = Some(level.to_string());
            if let Some((source, _)) = sources
                .iter()
                .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
            {
                context.source = source.to_string();
            }
            break;
        }

        context.subject = SUBJECT_CATEGORIES
            .iter()
            .flat_map(|(_, subjects)| subjects.iter())
            .find(|s| lower.contains(*s))
            .map(|s| capitalize(s));

        match context.exam_type.as_str() {
            "university" => {
                context.details.course = first_match(COURSES, &lower);
                context.details.semester = self
                    .semester
                    .find(&lower)
                    .map(|m| m.as_str().to_uppercase());
                context.details.branch = self
                    .branches
                    .iter()
                    .find(|(_, pattern)| pattern.is_match(&lower))
                    .map(|(name, _)| name.to_string());
            }
            "school" => {
                context.details.course = self
                    .school_class
                    .captures(&lower)
                    .and_then(|c| c.get(2))
                    .map(|n| format!("Class {}", n.as_str()));
                context.details.stream = STREAMS
                    .iter()
                    .find(|s| lower.contains(*s))
                    .map(|s| capitalize(s));
            }
            _ => {}
        }

        info!(
            "识别考试背景: type={}, source={}, subject={:?}",
            context.exam_type, context.source, context.subject
        );
        context
    }
}

impl Default for ExamContextDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn first_match(table: &[(&str, &[&str])], lower: &str) -> Option<String> {
    table
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(name, _)| name.to_string())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
