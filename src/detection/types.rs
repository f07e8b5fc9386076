/// 检测事件数据结构定义
/// Data structures for the detection event stream
use image::RgbImage;
use serde::{Deserialize, Serialize};

// ========== 公共常量 ==========

/// 缩略图四周扩展比例 (按框宽/高)
pub const THUMBNAIL_PAD_RATIO: f32 = 0.3;

/// 缩略图JPEG质量
pub const THUMBNAIL_JPEG_QUALITY: u8 = 85;

/// 跟踪ID (由外部跟踪器分配,跨帧稳定)
pub type TrackId = u64;

// ========== 数据结构 ==========

/// 检测框 (原图像素坐标, x1<x2, y1<y2)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn is_valid(&self) -> bool {
        self.x1.is_finite()
            && self.y1.is_finite()
            && self.x2.is_finite()
            && self.y2.is_finite()
            && self.x1 < self.x2
            && self.y1 < self.y2
    }
}

/// 单个检测结果 (检测引擎 → 聚合器)
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub class_label: String,
    pub confidence: f32,
    /// 未跟踪的检测框为 None
    pub track_id: Option<TrackId>,
}

/// 一帧的全部检测结果 + 解码后的原图
#[derive(Clone)]
pub struct FrameResult {
    /// 处理后的帧序号 (步长采样之后, 从1开始)
    pub frame_index: u64,
    /// 没有检测框时可以为空图 (0x0)
    pub image: RgbImage,
    pub detections: Vec<Detection>,
}

impl std::fmt::Debug for FrameResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameResult")
            .field("frame_index", &self.frame_index)
            .field("image", &format_args!("{}x{}", self.image.width(), self.image.height()))
            .field("detections", &self.detections)
            .finish()
    }
}

/// 聚合器输入事件 (每帧每个检测框一个)
#[derive(Clone, Copy)]
pub struct DetectionEvent<'a> {
    pub frame_index: u64,
    /// 该检测框在本帧中的序号 (仅用于合成ID)
    pub detection_index: usize,
    /// 当前视频内的秒数
    pub timestamp: f64,
    pub track_id: Option<TrackId>,
    pub class_label: &'a str,
    pub confidence: f32,
    pub bbox: BBox,
    pub frame: &'a RgbImage,
    /// 串联模式下事件所属的视频文件名
    pub source_file: Option<&'a str>,
}

impl<'a> DetectionEvent<'a> {
    /// 由一帧检测结果展开事件
    pub fn from_frame(
        frame: &'a FrameResult,
        timestamp: f64,
        source_file: Option<&'a str>,
    ) -> impl Iterator<Item = DetectionEvent<'a>> + 'a {
        frame
            .detections
            .iter()
            .enumerate()
            .map(move |(i, det)| DetectionEvent {
                frame_index: frame.frame_index,
                detection_index: i,
                timestamp,
                track_id: det.track_id,
                class_label: &det.class_label,
                confidence: det.confidence,
                bbox: det.bbox,
                frame: &frame.image,
                source_file,
            })
    }
}

/// 根据帧序号计算时间戳: (frame_index * stride) / fps
pub fn frame_timestamp(frame_index: u64, stride: u32, fps: f64) -> f64 {
    (frame_index as f64 * stride as f64) / fps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_validity() {
        assert!(BBox::new(10.0, 10.0, 20.0, 20.0).is_valid());
        assert!(!BBox::new(20.0, 10.0, 10.0, 20.0).is_valid());
        assert!(!BBox::new(10.0, 10.0, 10.0, 20.0).is_valid());
        assert!(!BBox::new(f32::NAN, 10.0, 20.0, 20.0).is_valid());
    }

    #[test]
    fn test_frame_timestamp() {
        assert_eq!(frame_timestamp(30, 1, 30.0), 1.0);
        // 步长2: 第15个处理帧对应原视频第30帧
        assert_eq!(frame_timestamp(15, 2, 30.0), 1.0);
    }

    #[test]
    fn test_events_from_frame() {
        let frame = FrameResult {
            frame_index: 4,
            image: RgbImage::new(8, 8),
            detections: vec![
                Detection {
                    bbox: BBox::new(0.0, 0.0, 4.0, 4.0),
                    class_label: "car".to_string(),
                    confidence: 0.5,
                    track_id: Some(1),
                },
                Detection {
                    bbox: BBox::new(1.0, 1.0, 3.0, 3.0),
                    class_label: "person".to_string(),
                    confidence: 0.7,
                    track_id: None,
                },
            ],
        };

        let events: Vec<_> = DetectionEvent::from_frame(&frame, 2.5, Some("a.mp4")).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].detection_index, 1);
        assert_eq!(events[1].class_label, "person");
        assert_eq!(events[0].timestamp, 2.5);
        assert_eq!(events[0].source_file, Some("a.mp4"));
    }
}
