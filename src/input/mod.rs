/// 视频输入系统 (Video Input System)
///
/// 外部协作方接口 + 录制回放实现
/// - VideoSource:     帧数/帧率 (解码器)
/// - DetectionStream: 逐帧检测结果 (检测/跟踪引擎)
/// - CaptureSource:   从录制目录回放一次引擎运行
pub mod capture;
pub mod video;

pub use capture::{is_capture_dir, scan_captures, CaptureSource};
pub use video::{effective_fps, DetectionStream, VideoInfo, VideoSource};
