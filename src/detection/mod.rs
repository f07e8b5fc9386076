/// 检测聚合系统 (Detection Aggregation)
///
/// 消费外部检测/跟踪引擎的逐帧结果,按跟踪ID聚合为最佳证据记录
/// - Types:      检测框/检测事件
/// - Thumbnail:  缩略图裁剪与编码
/// - Aggregator: 跟踪聚合器
pub mod aggregator;
pub mod thumbnail;
pub mod types;

pub use aggregator::{
    AggregatorStats, DropReason, IngestOutcome, RecordKey, TrackAggregator, TrackRecord,
    UntrackedPolicy,
};
pub use thumbnail::Thumbnail;
pub use types::{frame_timestamp, BBox, Detection, DetectionEvent, FrameResult, TrackId};
