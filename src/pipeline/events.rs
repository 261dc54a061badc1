use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// 处理状态，error 为终止失败态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Idle,
    Uploading,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// 旁路事件：进度、面向用户的提示、状态变化
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineEvent {
    Progress { percent: f32, step: String },
    Notice { level: NoticeLevel, message: String },
    Status { status: ProcessStatus, message: Option<String> },
}

/// 事件发送端。发送失败（无人接收）直接忽略，不影响主流程。
/// 进度只增不减。
pub struct EventSink {
    tx: Option<UnboundedSender<PipelineEvent>>,
    last_percent: Mutex<f32>,
}

impl EventSink {
    pub fn channel() -> (Self, UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = unbounded_channel();
        (
            Self {
                tx: Some(tx),
                last_percent: Mutex::new(0.0),
            },
            rx,
        )
    }

    pub fn disabled() -> Self {
        Self {
            tx: None,
            last_percent: Mutex::new(0.0),
        }
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn progress(&self, percent: f32, step: impl Into<String>) {
        let percent = {
            let mut last = match self.last_percent.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *last = last.max(percent.clamp(0.0, 100.0));
            *last
        };
        self.emit(PipelineEvent::Progress {
            percent,
            step: step.into(),
        });
    }

    pub fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.emit(PipelineEvent::Notice {
            level,
            message: message.into(),
        });
    }

    pub fn status(&self, status: ProcessStatus, message: Option<String>) {
        self.emit(PipelineEvent::Status { status, message });
    }

    /// 新文档开始时进度归零
    pub fn reset_progress(&self) {
        let mut last = match self.last_percent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *last = 0.0;
    }
}
