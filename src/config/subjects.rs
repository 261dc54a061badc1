use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const SUBJECTS_PATH: &str = "config/subjects.toml";

/// 一个学科及其判定关键词
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubjectKeywords {
    pub name: String,
    pub keywords: Vec<String>,
}

/// 启发式提取使用的学科关键词表
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubjectConfig {
    /// 所有学科得分为 0 时使用
    pub fallback: String,
    pub subjects: Vec<SubjectKeywords>,
}

impl SubjectConfig {
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from(SUBJECTS_PATH);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: SubjectConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

fn subject(name: &str, keywords: &[&str]) -> SubjectKeywords {
    SubjectKeywords {
        name: name.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

impl Default for SubjectConfig {
    fn default() -> Self {
        Self {
            fallback: "Computer Science".to_string(),
            subjects: vec![
                subject(
                    "Programming",
                    &[
                        "programming", "code", "algorithm", "function", "class", "object",
                        "variable", "loop", "inheritance", "polymorphism",
                    ],
                ),
                subject(
                    "Operating Systems",
                    &[
                        "operating", "system", "memory", "process", "thread", "scheduling",
                        "deadlock", "filesystem", "kernel", "paging",
                    ],
                ),
                subject(
                    "Database",
                    &[
                        "database", "sql", "query", "table", "join", "index", "transaction",
                        "normalization", "schema", "entity",
                    ],
                ),
                subject(
                    "Networking",
                    &[
                        "network", "protocol", "tcp", "ip", "router", "switch", "packet",
                        "http", "dns", "firewall",
                    ],
                ),
                subject(
                    "Computer Science",
                    &[
                        "complexity", "data structure", "graph", "tree", "sorting", "searching",
                        "computation", "theory", "logic", "analysis",
                    ],
                ),
            ],
        }
    }
}
