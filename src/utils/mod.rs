pub mod logger;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PyqError {
    #[error("缺少凭据: {0}")]
    MissingCredential(&'static str),

    #[error("存储错误: {0}")]
    StorageError(String),

    #[error("网络请求错误: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("接口返回错误 {status}: {body}")]
    ApiStatus { status: u16, body: String },

    #[error("解析错误: {0}")]
    ParseError(String),

    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("文档处理错误: {0}")]
    DocumentError(String),

    #[error("不支持的上传文件: {0}")]
    InvalidInput(String),
}

pub type PyqResult<T> = Result<T, PyqError>;
