use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::VideoConfig;
use crate::utils::{PyqError, PyqResult};

/// 搜索结果中的一条视频
#[derive(Debug, Clone, PartialEq)]
pub struct VideoItem {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
}

impl VideoItem {
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

/// 视频搜索服务
#[allow(async_fn_in_trait)]
pub trait VideoSearch {
    async fn search(&self, query: &str, max_results: usize) -> PyqResult<Vec<VideoItem>>;

    /// 凭据缺失时返回 false，流水线据此在开始前直接失败
    fn is_configured(&self) -> bool {
        true
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: Option<ItemId>,
    snippet: Option<Snippet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
    video_id: Option<String>,
}

#[derive(Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    thumbnails: Option<Thumbnails>,
}

#[derive(Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

pub struct YoutubeClient {
    client: Client,
    config: VideoConfig,
}

impl YoutubeClient {
    pub fn new(config: VideoConfig) -> PyqResult<Self> {
        let mut builder = Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }

        Ok(Self {
            client: builder.build()?,
            config,
        })
    }
}

impl VideoSearch for YoutubeClient {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn search(&self, query: &str, max_results: usize) -> PyqResult<Vec<VideoItem>> {
        if !self.is_configured() {
            return Err(PyqError::MissingCredential("video.api_key"));
        }

        info!("正在搜索视频: {}", query);
        let max_results = max_results.to_string();
        let response = self
            .client
            .get(&self.config.api_url)
            .header("Accept", "application/json")
            .query(&[
                ("part", "snippet"),
                ("q", query),
                ("maxResults", max_results.as_str()),
                ("type", "video"),
                ("relevanceLanguage", "en"),
                ("videoDuration", "medium"),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("视频搜索返回 {}", status);
            return Err(PyqError::ApiStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let items = parse_search_response(&body)?;
        info!("视频搜索返回 {} 条结果", items.len());
        Ok(items)
    }
}

/// 缺少视频 ID 的条目直接跳过；缩略图优先取 high，其次 medium
fn parse_search_response(body: &str) -> PyqResult<Vec<VideoItem>> {
    let parsed: SearchResponse = serde_json::from_str(body)
        .map_err(|e| PyqError::ParseError(format!("视频搜索响应解析失败: {}", e)))?;

    let items = parsed
        .items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id?.video_id?;
            let snippet = item.snippet?;
            let thumbnail = snippet
                .thumbnails
                .and_then(|t| t.high.or(t.medium))
                .map(|t| t.url)
                .unwrap_or_default();

            Some(VideoItem {
                video_id,
                title: snippet.title,
                description: snippet.description,
                thumbnail,
            })
        })
        .collect();

    Ok(items)
}
