//! 错误类型
//! Error types for visionx

use crate::report::PendingReport;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VisionError>;

#[derive(Error, Debug)]
pub enum VisionError {
    /// 视频无法打开/帧数为0/帧率不可用 (跳过该视频,批处理继续)
    #[error("Unreadable source {source_name}: {reason}")]
    UnreadableSource { source_name: String, reason: String },

    /// 报告输出失败 (聚合结果仍然有效,可重新渲染)
    #[error("File system error at {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 报告写入失败, 聚合结果保留在 `pending` 中
    #[error("Report not written: {source}")]
    RenderFailed {
        pending: Box<PendingReport>,
        #[source]
        source: Box<VisionError>,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// 检测记录格式错误
    #[error("Malformed capture {}:{line}: {reason}", path.display())]
    Capture {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VisionError {
    pub fn unreadable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        VisionError::UnreadableSource {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VisionError::FileSystem {
            path: path.into(),
            source,
        }
    }

    pub fn render_failed(pending: PendingReport, source: VisionError) -> Self {
        VisionError::RenderFailed {
            pending: Box::new(pending),
            source: Box::new(source),
        }
    }

    /// 取回写入失败的报告
    pub fn into_pending_report(self) -> Option<PendingReport> {
        match self {
            VisionError::RenderFailed { pending, .. } => Some(*pending),
            _ => None,
        }
    }

    /// 是否只影响单个视频 (批处理中跳过即可)
    pub fn is_source_local(&self) -> bool {
        matches!(
            self,
            VisionError::UnreadableSource { .. } | VisionError::Capture { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_display() {
        let err = VisionError::unreadable("cam01.mp4", "zero frames");
        assert!(err.to_string().contains("cam01.mp4"));
        assert!(err.to_string().contains("zero frames"));
        assert!(err.is_source_local());
    }

    #[test]
    fn test_fs_error_is_not_local() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = VisionError::fs("/root/out", io_err);
        assert!(err.to_string().contains("/root/out"));
        assert!(!err.is_source_local());
    }

    #[test]
    fn test_render_failed_keeps_pending_report() {
        use crate::report::ReportMetadata;

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let pending = PendingReport {
            records: vec![],
            meta: ReportMetadata::new("cam01", "cam01.mp4", "/root/out"),
        };
        let err = VisionError::render_failed(pending.clone(), VisionError::fs("/root/out", io_err));
        assert!(!err.is_source_local());
        assert!(err.to_string().contains("/root/out"));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.into_pending_report(), Some(pending));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: VisionError = json_err.into();
        match err {
            VisionError::Json(_) => {}
            _ => panic!("Expected Json error"),
        }
    }
}
