use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 无法确定年份时使用的占位值
pub const YEAR_UNKNOWN: &str = "Unknown";
pub const ALL_YEARS: &str = "all_years";
pub const ALL_SUBJECTS: &str = "all_subjects";

/// 题目关联的教学视频
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedVideo {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub url: String,
}

/// 一道考试题目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    pub year: String,
    pub subject: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_videos: Vec<RelatedVideo>,
}

impl Question {
    /// 关键词筛选：题干、任一关键词或任一知识点包含该词（忽略大小写）
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.to_lowercase();
        if needle.is_empty() {
            return true;
        }

        self.text.to_lowercase().contains(&needle)
            || self.keywords.iter().any(|k| k.to_lowercase().contains(&needle))
            || self.topics.iter().any(|t| t.to_lowercase().contains(&needle))
    }
}

/// 某个知识点/关键词在题目集合中的聚合视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionTopic {
    pub name: String,
    pub count: usize,
    pub questions: Vec<String>,
}

/// 持久化与查询的基本单位
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub questions: Vec<Question>,
    pub topics: Vec<QuestionTopic>,
}

/// 题库筛选条件，year/subject 取 "all_*" 表示不筛选
#[derive(Debug, Clone)]
pub struct QuestionFilter {
    pub year: String,
    pub subject: String,
    pub keyword: String,
}

impl QuestionFilter {
    pub fn new(year: &str, subject: &str, keyword: &str) -> Self {
        Self {
            year: year.to_string(),
            subject: subject.to_string(),
            keyword: keyword.to_string(),
        }
    }

    pub fn year(&self) -> Option<&str> {
        (self.year != ALL_YEARS).then_some(self.year.as_str())
    }

    pub fn subject(&self) -> Option<&str> {
        (self.subject != ALL_SUBJECTS).then_some(self.subject.as_str())
    }
}

impl Default for QuestionFilter {
    fn default() -> Self {
        Self::new(ALL_YEARS, ALL_SUBJECTS, "")
    }
}

/// 同一批次内生成唯一题目 ID：`q-<毫秒时间戳>-<序号>`
pub struct IdGenerator {
    stamp: i64,
    next: usize,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            stamp: chrono::Utc::now().timestamp_millis(),
            next: 0,
        }
    }

    pub fn next_id(&mut self) -> String {
        let id = format!("q-{}-{}", self.stamp, self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: String,
    pub text: String,
    pub year: String,
    pub subject: String,
    pub topics: String,
    pub keywords: String,
    pub related_videos: String,
}

impl QuestionRow {
    pub fn from_question(question: &Question) -> serde_json::Result<Self> {
        Ok(Self {
            id: question.id.clone(),
            text: question.text.clone(),
            year: question.year.clone(),
            subject: question.subject.clone(),
            topics: serde_json::to_string(&question.topics)?,
            keywords: serde_json::to_string(&question.keywords)?,
            related_videos: serde_json::to_string(&question.related_videos)?,
        })
    }

    pub fn into_question(self) -> serde_json::Result<Question> {
        Ok(Question {
            id: self.id,
            text: self.text,
            year: self.year,
            subject: self.subject,
            topics: serde_json::from_str(&self.topics)?,
            keywords: serde_json::from_str(&self.keywords)?,
            related_videos: serde_json::from_str(&self.related_videos)?,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TopicRow {
    pub name: String,
    pub count: i64,
    pub question_ids: String,
}

impl TopicRow {
    pub fn into_topic(self) -> serde_json::Result<QuestionTopic> {
        Ok(QuestionTopic {
            name: self.name,
            count: self.count as usize,
            questions: serde_json::from_str(&self.question_ids)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str, keywords: &[&str], topics: &[&str]) -> Question {
        Question {
            id: "q-1-0".to_string(),
            text: text.to_string(),
            year: "2022".to_string(),
            subject: "Database".to_string(),
            topics: topics.iter().map(|s| s.to_string()).collect(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            related_videos: Vec::new(),
        }
    }

    #[test]
    fn test_keyword_match_checks_text_keywords_and_topics() {
        let q = question("Explain normal forms with examples.", &["normalization"], &["Functional Dependency"]);
        assert!(q.matches_keyword("NORMAL"));
        assert!(q.matches_keyword("normaliz"));
        assert!(q.matches_keyword("dependency"));
        assert!(!q.matches_keyword("deadlock"));
        assert!(q.matches_keyword(""));
    }

    #[test]
    fn test_id_generator_is_unique_within_batch() {
        let mut ids = IdGenerator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert!(a.starts_with("q-"));
        assert!(b.ends_with("-1"));
    }

    #[test]
    fn test_question_row_round_trip() {
        let mut q = question("1. What is a deadlock?", &["deadlock"], &[]);
        q.related_videos.push(RelatedVideo {
            id: "abc".to_string(),
            title: "Deadlock tutorial".to_string(),
            thumbnail: "https://i.ytimg.com/vi/abc/hqdefault.jpg".to_string(),
            url: "https://www.youtube.com/watch?v=abc".to_string(),
        });
        let row = QuestionRow::from_question(&q).unwrap();
        assert_eq!(row.into_question().unwrap(), q);
    }

    #[test]
    fn test_filter_sentinels() {
        let filter = QuestionFilter::default();
        assert_eq!(filter.year(), None);
        assert_eq!(filter.subject(), None);

        let filter = QuestionFilter::new("2021", "Database", "sql");
        assert_eq!(filter.year(), Some("2021"));
        assert_eq!(filter.subject(), Some("Database"));
        assert_eq!(filter.keyword, "sql");
    }
}
