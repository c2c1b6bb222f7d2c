//! Copy status reporting

use log::{error, info, warn};

/// State of the copy action, shown on the copy button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStatus {
    InFlight,
    Succeeded,
    Failed,
}

impl CopyStatus {
    /// Button label for this state
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            CopyStatus::InFlight => "复制中...",
            CopyStatus::Succeeded => "复制成功",
            CopyStatus::Failed => "复制失败",
        }
    }
}

impl std::fmt::Display for CopyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One user-facing notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Copied,
    CopyFailed(String),
    /// The preview does not have the shape the exporter needs
    InvalidPreview(String),
}

impl Notice {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Notice::Copied => "已复制到剪贴板".to_string(),
            Notice::CopyFailed(_) => "复制失败".to_string(),
            Notice::InvalidPreview(detail) => format!("预览内容无法导出: {detail}"),
        }
    }
}

/// Receives status changes and notifications
pub trait StatusSink {
    fn set_status(&self, status: CopyStatus);

    fn notify(&self, notice: Notice);
}

/// Sink that writes everything to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn set_status(&self, status: CopyStatus) {
        info!("Copy status: {}", status.label());
    }

    fn notify(&self, notice: Notice) {
        match &notice {
            Notice::Copied => info!("{}", notice.message()),
            Notice::CopyFailed(detail) => warn!("{}: {detail}", notice.message()),
            Notice::InvalidPreview(_) => error!("{}", notice.message()),
        }
    }
}
