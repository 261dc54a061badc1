use tracing::{debug, info};

use super::youtube::{VideoItem, VideoSearch};
use crate::analysis::ExamContext;
use crate::storage::models::{Question, RelatedVideo};
use crate::storage::QueryCache;
use crate::utils::PyqResult;

const EDUCATIONAL_MARKERS: &[&str] = &["lecture", "tutorial", "explanation", "concept", "learn", "course"];

pub type VideoCache = QueryCache<Vec<RelatedVideo>>;

/// 为题目匹配教学视频
pub struct VideoMatcher<V: VideoSearch> {
    search: V,
    max_results: usize,
}

impl<V: VideoSearch> VideoMatcher<V> {
    pub fn new(search: V, max_results: usize) -> Self {
        Self { search, max_results }
    }

    pub fn is_ready(&self) -> bool {
        self.search.is_configured()
    }

    /// 搜索词：前 2 个知识点、前 2 个关键词、背景学科、层次标记、题目学科，
    /// 最后加上 explanation tutorial
    pub fn build_query(question: &Question, context: Option<&ExamContext>) -> String {
        let mut parts: Vec<&str> = Vec::new();
        parts.extend(question.topics.iter().take(2).map(String::as_str));
        parts.extend(question.keywords.iter().take(2).map(String::as_str));
        if let Some(context) = context {
            if let Some(subject) = &context.subject {
                parts.push(subject);
            }
            parts.push(context.level_token());
        }
        parts.push(&question.subject);
        parts.push("explanation");
        parts.push("tutorial");

        parts
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 返回带视频的题目副本。同一会话内相同搜索词直接命中缓存。
    pub async fn match_question(
        &self,
        question: &Question,
        context: Option<&ExamContext>,
        cache: &mut VideoCache,
    ) -> PyqResult<Question> {
        let query = Self::build_query(question, context);
        let key = VideoCache::key(&query, self.max_results);

        let videos = match cache.get(&key) {
            Some(videos) => {
                debug!("视频缓存命中: {}", key);
                videos
            }
            None => {
                let items = self.search.search(&query, self.max_results).await?;
                let videos = filter_and_rank(&query, items);
                info!("题目 {} 匹配到 {} 个视频", question.id, videos.len());
                cache.set(key, videos.clone());
                videos
            }
        };

        let mut matched = question.clone();
        matched.related_videos.extend(videos);
        Ok(matched)
    }
}

/// 只保留同时包含搜索词和教学标记的视频，按标题命中搜索词的个数降序
pub fn filter_and_rank(query: &str, items: Vec<VideoItem>) -> Vec<RelatedVideo> {
    let query = query.to_lowercase();
    let terms: Vec<&str> = query.split_whitespace().collect();

    let mut ranked: Vec<(usize, VideoItem)> = items
        .into_iter()
        .filter_map(|item| {
            let title = item.title.to_lowercase();
            let description = item.description.to_lowercase();
            let mentions = |word: &str| title.contains(word) || description.contains(word);

            let on_topic = terms.iter().any(|t| mentions(*t));
            let educational = EDUCATIONAL_MARKERS.iter().any(|m| mentions(*m));
            if !(on_topic && educational) {
                return None;
            }

            let score = terms.iter().filter(|t| title.contains(*t)).count();
            Some((score, item))
        })
        .collect();

    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    ranked
        .into_iter()
        .map(|(_, item)| RelatedVideo {
            url: item.watch_url(),
            id: item.video_id,
            title: item.title,
            thumbnail: item.thumbnail,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::PyqError;
    use std::cell::Cell;

    fn item(id: &str, title: &str, description: &str) -> VideoItem {
        VideoItem {
            video_id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            thumbnail: format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id),
        }
    }

    fn question() -> Question {
        Question {
            id: "q-1-0".to_string(),
            text: "1. Explain paging with a neat diagram.".to_string(),
            year: "2022".to_string(),
            subject: "Operating Systems".to_string(),
            topics: vec!["Paging".to_string(), "Virtual Memory".to_string(), "Tlb".to_string()],
            keywords: vec!["paging".to_string(), "diagram".to_string(), "frames".to_string()],
            related_videos: Vec::new(),
        }
    }

    struct CountingSearch {
        calls: Cell<usize>,
        fail: bool,
    }

    impl VideoSearch for CountingSearch {
        async fn search(&self, _query: &str, _max_results: usize) -> PyqResult<Vec<VideoItem>> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(PyqError::ApiStatus {
                    status: 403,
                    body: "quotaExceeded".to_string(),
                });
            }
            Ok(vec![item("v1", "Paging lecture", "operating systems course")])
        }
    }

    #[test]
    fn test_build_query_with_context() {
        let context = ExamContext {
            subject: Some("Operating system".to_string()),
            level: Some("undergraduate".to_string()),
            ..ExamContext::default()
        };

        let query = VideoMatcher::<CountingSearch>::build_query(&question(), Some(&context));
        assert_eq!(
            query,
            "Paging Virtual Memory paging diagram Operating system college Operating Systems explanation tutorial"
        );

        let query = VideoMatcher::<CountingSearch>::build_query(&question(), Some(&ExamContext::default()));
        assert_eq!(
            query,
            "Paging Virtual Memory paging diagram Operating Systems explanation tutorial"
        );
    }

    #[test]
    fn test_filter_keeps_relevant_educational_videos() {
        let items = vec![
            item("b", "Funny cat compilation", "cats being cats"),
            item("a", "Paging lecture", "virtual memory"),
            item("c", "Virtual memory and paging explanation", ""),
            item("d", "Paging in five minutes", "no markers here"),
        ];

        let videos = filter_and_rank("paging virtual memory", items);
        let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert_eq!(videos[1].url, "https://www.youtube.com/watch?v=a");
    }

    #[test]
    fn test_ranking_is_stable_for_equal_scores() {
        let items = vec![
            item("x", "Deadlock tutorial", ""),
            item("y", "Deadlock lecture", ""),
        ];
        let videos = filter_and_rank("deadlock", items);
        let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_cache_avoids_second_lookup() {
        let matcher = VideoMatcher::new(
            CountingSearch {
                calls: Cell::new(0),
                fail: false,
            },
            3,
        );
        let mut cache = VideoCache::new();

        let first = matcher.match_question(&question(), None, &mut cache).await.unwrap();
        let second = matcher.match_question(&question(), None, &mut cache).await.unwrap();

        assert_eq!(matcher.search.calls.get(), 1);
        assert_eq!(first.related_videos.len(), 1);
        assert_eq!(first.related_videos, second.related_videos);
        assert_eq!(cache.stats(), (1, 1));
    }

    #[tokio::test]
    async fn test_search_failure_is_returned() {
        let matcher = VideoMatcher::new(
            CountingSearch {
                calls: Cell::new(0),
                fail: true,
            },
            3,
        );
        let mut cache = VideoCache::new();
        assert!(matcher.match_question(&question(), None, &mut cache).await.is_err());
        assert_eq!(cache.len(), 0);
    }
}
