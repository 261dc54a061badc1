use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use crate::storage::models::{
    AnalysisResult, Question, QuestionFilter, QuestionRow, QuestionTopic, TopicRow,
};

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(
                database_url.parse::<sqlx::sqlite::SqliteConnectOptions>()?
                    .create_if_missing(true)
            )
            .await
            .with_context(|| format!("连接数据库失败: {}", database_url))?;

        info!("数据库连接成功: {}", database_url);
        Ok(Self { pool })
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS questions (
                position INTEGER PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                text TEXT NOT NULL,
                year TEXT NOT NULL,
                subject TEXT NOT NULL,
                topics TEXT NOT NULL DEFAULT '[]',
                keywords TEXT NOT NULL DEFAULT '[]',
                related_videos TEXT NOT NULL DEFAULT '[]',
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS question_topics (
                position INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                count INTEGER NOT NULL,
                question_ids TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_questions_year_subject ON questions(year, subject)")
            .execute(&self.pool)
            .await?;

        info!("数据库表结构初始化完成");
        Ok(())
    }

    /// 整体替换已保存的分析结果（单个事务内完成）
    pub async fn save_result(&self, result: &AnalysisResult) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM questions").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM question_topics").execute(&mut *tx).await?;

        for (position, question) in result.questions.iter().enumerate() {
            let row = QuestionRow::from_question(question)?;
            sqlx::query(
                r#"
                INSERT INTO questions (position, id, text, year, subject, topics, keywords, related_videos)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(position as i64)
            .bind(&row.id)
            .bind(&row.text)
            .bind(&row.year)
            .bind(&row.subject)
            .bind(&row.topics)
            .bind(&row.keywords)
            .bind(&row.related_videos)
            .execute(&mut *tx)
            .await?;
        }

        for (position, topic) in result.topics.iter().enumerate() {
            sqlx::query(
                "INSERT INTO question_topics (position, name, count, question_ids) VALUES (?, ?, ?, ?)",
            )
            .bind(position as i64)
            .bind(&topic.name)
            .bind(topic.count as i64)
            .bind(serde_json::to_string(&topic.questions)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            "已保存 {} 道题目, {} 个知识点",
            result.questions.len(),
            result.topics.len()
        );
        Ok(())
    }

    pub async fn load_result(&self) -> Result<AnalysisResult> {
        self.load_filtered(&QuestionFilter::default()).await
    }

    /// 年份/学科精确匹配，关键词对题干、关键词、知识点做不区分大小写的子串匹配。
    /// 知识点列表按保存时的结果原样返回。
    pub async fn load_filtered(&self, filter: &QuestionFilter) -> Result<AnalysisResult> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, text, year, subject, topics, keywords, related_videos FROM questions WHERE 1 = 1",
        );
        if let Some(year) = filter.year() {
            query.push(" AND year = ").push_bind(year);
        }
        if let Some(subject) = filter.subject() {
            query.push(" AND subject = ").push_bind(subject);
        }
        query.push(" ORDER BY position");

        let rows: Vec<QuestionRow> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            let question = row.into_question().context("题目记录格式损坏")?;
            if question.matches_keyword(&filter.keyword) {
                questions.push(question);
            }
        }

        let topics = self.load_topics().await?;
        debug!("筛选得到 {} 道题目", questions.len());

        Ok(AnalysisResult { questions, topics })
    }

    async fn load_topics(&self) -> Result<Vec<QuestionTopic>> {
        let rows = sqlx::query_as::<_, TopicRow>(
            "SELECT name, count, question_ids FROM question_topics ORDER BY position",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| row.into_topic().context("知识点记录格式损坏"))
            .collect()
    }

    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM questions").execute(&self.pool).await?;
        sqlx::query("DELETE FROM question_topics").execute(&self.pool).await?;
        info!("已清空题库");
        Ok(())
    }

    pub async fn count_questions(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// 题库中出现的全部年份（倒序）与学科（正序），供筛选项使用
    pub async fn distinct_years_and_subjects(&self) -> Result<(Vec<String>, Vec<String>)> {
        let years = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT year FROM questions ORDER BY year DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let subjects = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT subject FROM questions ORDER BY subject",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok((years, subjects))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::RelatedVideo;

    async fn test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("questions.db").display());
        let db = Database::new(&url).await.unwrap();
        db.init_schema().await.unwrap();
        (db, dir)
    }

    fn question(id: &str, year: &str, subject: &str, text: &str) -> Question {
        Question {
            id: id.to_string(),
            text: text.to_string(),
            year: year.to_string(),
            subject: subject.to_string(),
            topics: vec!["Deadlock".to_string()],
            keywords: vec!["mutex".to_string(), "semaphore".to_string()],
            related_videos: Vec::new(),
        }
    }

    fn sample_result() -> AnalysisResult {
        let mut first = question("q-1-0", "2021", "Operating Systems", "1. Explain deadlock avoidance in 2021?");
        first.related_videos.push(RelatedVideo {
            id: "vid1".to_string(),
            title: "Deadlock lecture".to_string(),
            thumbnail: "https://i.ytimg.com/vi/vid1/hqdefault.jpg".to_string(),
            url: "https://www.youtube.com/watch?v=vid1".to_string(),
        });
        let second = question("q-1-1", "2022", "Database", "2. Define normalization with 3 examples.");

        AnalysisResult {
            topics: vec![QuestionTopic {
                name: "Deadlock".to_string(),
                count: 2,
                questions: vec![first.id.clone(), second.id.clone()],
            }],
            questions: vec![first, second],
        }
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let (db, _dir) = test_db().await;
        let result = sample_result();
        db.save_result(&result).await.unwrap();

        assert_eq!(db.load_result().await.unwrap(), result);
        let unfiltered = db
            .load_filtered(&QuestionFilter::new("all_years", "all_subjects", ""))
            .await
            .unwrap();
        assert_eq!(unfiltered, result);
    }

    #[tokio::test]
    async fn test_filter_by_year() {
        let (db, _dir) = test_db().await;
        db.save_result(&sample_result()).await.unwrap();

        let filtered = db
            .load_filtered(&QuestionFilter::new("2021", "all_subjects", ""))
            .await
            .unwrap();
        assert_eq!(filtered.questions.len(), 1);
        assert_eq!(filtered.questions[0].year, "2021");
    }

    #[tokio::test]
    async fn test_filter_by_subject_and_keyword() {
        let (db, _dir) = test_db().await;
        db.save_result(&sample_result()).await.unwrap();

        let by_subject = db
            .load_filtered(&QuestionFilter::new("all_years", "Database", ""))
            .await
            .unwrap();
        assert_eq!(by_subject.questions.len(), 1);
        assert_eq!(by_subject.questions[0].id, "q-1-1");

        let by_keyword = db
            .load_filtered(&QuestionFilter::new("all_years", "all_subjects", "AVOIDANCE"))
            .await
            .unwrap();
        assert_eq!(by_keyword.questions.len(), 1);
        assert_eq!(by_keyword.questions[0].id, "q-1-0");

        let none = db
            .load_filtered(&QuestionFilter::new("2022", "Operating Systems", ""))
            .await
            .unwrap();
        assert!(none.questions.is_empty());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_result_and_clear_empties() {
        let (db, _dir) = test_db().await;
        db.save_result(&sample_result()).await.unwrap();

        let replacement = AnalysisResult {
            questions: vec![question("q-2-0", "2023", "Networking", "1. Describe the TCP handshake?")],
            topics: Vec::new(),
        };
        db.save_result(&replacement).await.unwrap();
        assert_eq!(db.load_result().await.unwrap(), replacement);

        let (years, subjects) = db.distinct_years_and_subjects().await.unwrap();
        assert_eq!(years, vec!["2023".to_string()]);
        assert_eq!(subjects, vec!["Networking".to_string()]);

        db.clear().await.unwrap();
        assert_eq!(db.count_questions().await.unwrap(), 0);
        assert_eq!(db.load_result().await.unwrap(), AnalysisResult::default());
    }
}
