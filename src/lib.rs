// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 运行配置参数
pub mod detection; // 跟踪聚合
pub mod error; // 错误类型
pub mod input; // 视频输入 (解码器/检测引擎接口)
pub mod pipeline; // 处理流水线
pub mod report; // HTML报告

pub use crate::config::{Args, RunConfig, Settings};
pub use crate::detection::{
    DetectionEvent, IngestOutcome, TrackAggregator, TrackRecord, UntrackedPolicy,
};
pub use crate::error::{Result, VisionError};
pub use crate::pipeline::{BatchSummary, Pipeline};
pub use crate::report::{
    format_timestamp, PendingReport, ReportMetadata, ReportRenderer, ThumbnailMode,
};
