//! 录制回放源
//! Replays a recorded detection/tracking run from a capture directory
//!
//! 目录结构:
//! ```text
//! <capture>/
//!   capture.json       {"name": "cam01.mp4", "frame_count": 900, "fps": 25.0, "positions_ms": [...]}
//!   detections.jsonl   每行一帧 (原始帧号, 从1开始)
//!   frames/000001.jpg  解码后的原图
//! ```
//!
//! 检测行示例:
//! `{"frame": 1, "image": "frames/000001.jpg", "detections": [{"bbox": [10, 20, 50, 80], "class": "car", "confidence": 0.91, "track_id": 7}]}`

use super::video::{DetectionStream, VideoSource};
use crate::detection::{BBox, Detection, FrameResult, TrackId};
use crate::error::{Result, VisionError};
use image::RgbImage;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CAPTURE_MANIFEST: &str = "capture.json";
pub const CAPTURE_DETECTIONS: &str = "detections.jsonl";

// ========== 文件格式 ==========

#[derive(Debug, Clone, Deserialize)]
struct Manifest {
    /// 原视频文件名
    name: Option<String>,
    /// 录制时使用的检测模型
    #[serde(default)]
    model: Option<String>,
    frame_count: u64,
    #[serde(default)]
    fps: f64,
    #[serde(default)]
    positions_ms: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct CaptureLine {
    frame: u64,
    image: PathBuf,
    #[serde(default)]
    detections: Vec<CaptureDetection>,
}

#[derive(Debug, Clone, Deserialize)]
struct CaptureDetection {
    bbox: [f32; 4],
    class: String,
    confidence: f32,
    #[serde(default)]
    track_id: Option<TrackId>,
}

// ========== 回放源 ==========

/// 录制回放源
///
/// 按步长采样原始帧, 并按运行时的词表与置信度阈值过滤检测框,
/// 与引擎按相同参数运行时的输出一致。
pub struct CaptureSource {
    dir: PathBuf,
    name: String,
    manifest: Manifest,
    lines: Option<Lines<BufReader<File>>>,
    line_no: usize,
    stride: u32,
    vocabulary: Vec<String>,
    min_confidence: f32,
}

impl CaptureSource {
    /// 打开录制目录 (或其中的 capture.json)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let dir = if path.is_file() {
            path.parent().unwrap_or(Path::new(".")).to_path_buf()
        } else {
            path.to_path_buf()
        };
        let display = dir.display().to_string();

        let manifest_path = dir.join(CAPTURE_MANIFEST);
        let text = fs::read_to_string(&manifest_path)
            .map_err(|e| VisionError::unreadable(&display, format!("{}: {}", CAPTURE_MANIFEST, e)))?;
        let manifest: Manifest = serde_json::from_str(&text)
            .map_err(|e| VisionError::unreadable(&display, format!("{}: {}", CAPTURE_MANIFEST, e)))?;

        let name = manifest.name.clone().unwrap_or_else(|| {
            dir.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| display.clone())
        });

        Ok(Self {
            dir,
            name,
            manifest,
            lines: None,
            line_no: 0,
            stride: 1,
            vocabulary: Vec::new(),
            min_confidence: 0.0,
        })
    }

    /// 帧步长 (只保留帧号能被步长整除的帧)
    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride.max(1);
        self
    }

    /// 检测词表 (为空时不过滤, 忽略大小写)
    pub fn with_vocabulary(mut self, prompts: &[String]) -> Self {
        self.vocabulary = prompts.to_vec();
        self
    }

    pub fn with_min_confidence(mut self, confidence: f32) -> Self {
        self.min_confidence = confidence;
        self
    }

    /// 录制时使用的检测模型 (未记录时为 None)
    pub fn model(&self) -> Option<&str> {
        self.manifest.model.as_deref()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn detections_path(&self) -> PathBuf {
        self.dir.join(CAPTURE_DETECTIONS)
    }

    fn capture_error(&self, reason: impl Into<String>) -> VisionError {
        VisionError::Capture {
            path: self.detections_path(),
            line: self.line_no,
            reason: reason.into(),
        }
    }

    fn accepts(&self, det: &CaptureDetection) -> bool {
        det.confidence >= self.min_confidence
            && (self.vocabulary.is_empty()
                || self
                    .vocabulary
                    .iter()
                    .any(|p| p.eq_ignore_ascii_case(&det.class)))
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        if self.lines.is_none() {
            let path = self.detections_path();
            let file = File::open(&path)
                .map_err(|e| VisionError::unreadable(&self.name, format!("{}: {}", CAPTURE_DETECTIONS, e)))?;
            self.lines = Some(BufReader::new(file).lines());
        }

        let Some(lines) = self.lines.as_mut() else {
            return Ok(None);
        };
        loop {
            match lines.next() {
                None => return Ok(None),
                Some(Err(e)) => {
                    return Err(VisionError::Capture {
                        path: self.dir.join(CAPTURE_DETECTIONS),
                        line: self.line_no + 1,
                        reason: e.to_string(),
                    });
                }
                Some(Ok(line)) => {
                    self.line_no += 1;
                    if !line.trim().is_empty() {
                        return Ok(Some(line));
                    }
                }
            }
        }
    }
}

impl VideoSource for CaptureSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.dir
    }

    fn frame_count(&self) -> u64 {
        self.manifest.frame_count
    }

    fn metadata_fps(&self) -> f64 {
        self.manifest.fps
    }

    fn frame_positions_ms(&mut self, max_frames: usize) -> Result<Vec<f64>> {
        Ok(self
            .manifest
            .positions_ms
            .iter()
            .take(max_frames)
            .copied()
            .collect())
    }
}

impl DetectionStream for CaptureSource {
    fn next_frame(&mut self) -> Result<Option<FrameResult>> {
        loop {
            let Some(line) = self.next_line()? else {
                return Ok(None);
            };
            let parsed: CaptureLine =
                serde_json::from_str(&line).map_err(|e| self.capture_error(e.to_string()))?;

            if parsed.frame == 0 || parsed.frame % self.stride as u64 != 0 {
                continue;
            }

            let detections: Vec<Detection> = parsed
                .detections
                .iter()
                .filter(|d| self.accepts(d))
                .map(|d| Detection {
                    bbox: BBox::new(d.bbox[0], d.bbox[1], d.bbox[2], d.bbox[3]),
                    class_label: d.class.clone(),
                    confidence: d.confidence,
                    track_id: d.track_id,
                })
                .collect();

            // 没有检测框的帧不需要原图
            let image = if detections.is_empty() {
                RgbImage::new(0, 0)
            } else {
                let image_path = self.dir.join(&parsed.image);
                image::open(&image_path)
                    .map_err(|e| self.capture_error(format!("{}: {}", image_path.display(), e)))?
                    .to_rgb8()
            };

            debug!(
                frame = parsed.frame,
                kept = detections.len(),
                total = parsed.detections.len(),
                "回放帧"
            );

            return Ok(Some(FrameResult {
                frame_index: parsed.frame / self.stride as u64,
                image,
                detections,
            }));
        }
    }
}

/// 是否为录制目录
pub fn is_capture_dir(path: &Path) -> bool {
    path.is_dir() && path.join(CAPTURE_MANIFEST).is_file()
}

/// 扫描目录下的录制目录 (按名称排序)
pub fn scan_captures(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(VisionError::Config(format!("{} is not a directory", dir.display())));
    }

    let mut found = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| VisionError::fs(dir, e))? {
        let path = entry.map_err(|e| VisionError::fs(dir, e))?.path();
        if is_capture_dir(&path) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}
