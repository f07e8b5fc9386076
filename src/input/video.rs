//! 视频源接口与帧率探测
//! Collaborator interfaces for the decoder and the detection engine

use crate::detection::FrameResult;
use crate::error::{Result, VisionError};
use std::path::Path;
use tracing::debug;

/// 帧率探测最多读取的帧数
pub const FPS_PROBE_MAX_FRAMES: usize = 100;

/// 帧率探测时长 (秒)
pub const FPS_PROBE_SECONDS: f64 = 5.0;

// ========== 外部协作接口 ==========

/// 视频解码器 (提供帧数与帧率)
pub trait VideoSource {
    /// 视频文件名 (用于显示和串联模式的文件归属)
    fn name(&self) -> &str;

    /// 源路径
    fn path(&self) -> &Path;

    /// 总帧数 (0 表示无法读取)
    fn frame_count(&self) -> u64;

    /// 容器元数据中的帧率 (部分摄像头不可靠)
    fn metadata_fps(&self) -> f64;

    /// 前若干解码帧的播放位置 (毫秒), 按解码顺序
    fn frame_positions_ms(&mut self, max_frames: usize) -> Result<Vec<f64>>;
}

/// 检测/跟踪引擎输出 (逐帧, 按帧序)
pub trait DetectionStream {
    /// 下一处理帧;结束时返回 None
    fn next_frame(&mut self) -> Result<Option<FrameResult>>;
}

// ========== 视频信息 ==========

/// 探测后的视频信息
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub name: String,
    pub total_frames: u64,
    pub metadata_fps: f64,
    /// 实测帧率 (用于时间戳)
    pub fps: f64,
}

impl VideoInfo {
    /// 探测视频: 帧数为0或帧率不可用时返回 `UnreadableSource`
    pub fn probe<S: VideoSource + ?Sized>(source: &mut S) -> Result<Self> {
        let total_frames = source.frame_count();
        if total_frames == 0 {
            return Err(VisionError::unreadable(source.name(), "could not read video (0 frames)"));
        }

        let metadata_fps = source.metadata_fps();
        let positions = source.frame_positions_ms(FPS_PROBE_MAX_FRAMES)?;
        let fps = effective_fps(&positions, metadata_fps);
        if !(fps.is_finite() && fps > 0.0) {
            return Err(VisionError::unreadable(
                source.name(),
                format!("frame rate unavailable ({})", fps),
            ));
        }

        debug!(
            video = source.name(),
            total_frames, metadata_fps, fps, "🎞️ 视频信息"
        );

        Ok(Self {
            name: source.name().to_string(),
            total_frames,
            metadata_fps,
            fps,
        })
    }

    /// 步长采样后的处理帧数
    pub fn processed_frames(&self, stride: u32) -> u64 {
        self.total_frames / stride.max(1) as u64
    }

    /// 视频时长 (秒)
    pub fn duration(&self) -> f64 {
        self.total_frames as f64 / self.fps
    }
}

/// 实测帧率: 读取前5秒 (最多100帧) 的解码帧计时
///
/// 播放位置为0时退回元数据帧率。
pub fn effective_fps(positions_ms: &[f64], metadata_fps: f64) -> f64 {
    let mut frames = 0usize;
    let mut pos_sec = 0.0;
    for &ms in positions_ms.iter().take(FPS_PROBE_MAX_FRAMES) {
        frames += 1;
        pos_sec = ms / 1000.0;
        if pos_sec >= FPS_PROBE_SECONDS {
            break;
        }
    }

    if pos_sec > 0.0 && frames > 0 {
        frames as f64 / pos_sec
    } else {
        metadata_fps
    }
}
