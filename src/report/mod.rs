/// 报告系统 (Report System)
///
/// 将聚合后的跟踪记录渲染为单个静态HTML报告
/// - Renderer: 统计/过滤按钮/卡片 → 写入磁盘
/// - Template: 样式与前端脚本 (过滤、复制时间戳、放大查看)
pub mod renderer;
mod template;

pub use renderer::ReportRenderer;

use crate::detection::TrackRecord;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ========== 报告配置 ==========

/// 缩略图输出方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailMode {
    /// base64 内嵌 (单文件,可直接分享)
    #[default]
    Embedded,
    /// 写入 `<name>_thumbs/` 目录,按相对路径引用
    Files,
}

/// 报告元数据
#[derive(Debug, Clone, PartialEq)]
pub struct ReportMetadata {
    /// 报告名 (视频文件名去扩展名, 串联模式为 `<首个视频>_chain`)
    pub name: String,
    /// 标题下方显示的来源说明
    pub source_label: String,
    /// 输出目录
    pub output_dir: PathBuf,
    /// 生成时间 (None 时不写入, 保证输出可复现)
    pub generated_at: Option<DateTime<Local>>,
}

impl ReportMetadata {
    pub fn new(name: impl Into<String>, source_label: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source_label: source_label.into(),
            output_dir: output_dir.into(),
            generated_at: None,
        }
    }

    pub fn with_generated_at(mut self, at: DateTime<Local>) -> Self {
        self.generated_at = Some(at);
        self
    }

    /// `<output_dir>/<name>_report.html`
    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_report.html", self.name))
    }

    /// 文件模式下缩略图目录名 (相对报告所在目录)
    pub fn thumbs_dir_name(&self) -> String {
        format!("{}_thumbs", self.name)
    }

    pub fn thumbs_dir(&self) -> PathBuf {
        self.output_dir.join(self.thumbs_dir_name())
    }
}

/// 已聚合、尚未写出的报告
///
/// 写入失败时随 `VisionError::RenderFailed` 返回, 换个目录即可重新渲染。
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReport {
    pub records: Vec<TrackRecord>,
    pub meta: ReportMetadata,
}

// ========== 统计 ==========

/// 各类别数量 (区分大小写, 按字母排序)
pub fn class_counts(records: &[TrackRecord]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for r in records {
        *counts.entry(r.class_label.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(cls, n)| (cls.to_string(), n))
        .collect()
}

// ========== 格式化 ==========

/// 秒数 → `H:MM:SS` (只截断不四舍五入)
///
/// 调用方保证输入有限且非负;否则按 0 处理。
pub fn format_timestamp(seconds: f64) -> String {
    debug_assert!(seconds.is_finite() && seconds >= 0.0, "invalid timestamp {seconds}");
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    format!("{}:{:02}:{:02}", h, m, s)
}

/// 置信度 → 整数百分比, 0.873 → "87%"
pub fn format_confidence(confidence: f32) -> String {
    format!("{:.0}%", confidence as f64 * 100.0)
}

/// 首字母大写 (每个单词), "traffic light" → "Traffic Light"
pub fn title_case(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut word_start = true;
    for c in label.chars() {
        if c.is_alphabetic() {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}

/// 报告文件名 (视频文件名去扩展名)
pub fn report_name_for(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "visionx".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, class: &str) -> TrackRecord {
        TrackRecord {
            track_id: id,
            class_label: class.to_string(),
            confidence: 0.5,
            first_seen: 0.0,
            last_seen: 0.0,
            first_seen_file: None,
            last_seen_file: None,
            thumbnail: None,
            synthetic: false,
        }
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "0:00:00");
        assert_eq!(format_timestamp(3661.0), "1:01:01");
        assert_eq!(format_timestamp(59.9), "0:00:59");
        assert_eq!(format_timestamp(3599.999), "0:59:59");
        assert_eq!(format_timestamp(36000.0), "10:00:00");
    }

    #[test]
    fn test_format_confidence() {
        assert_eq!(format_confidence(0.873), "87%");
        assert_eq!(format_confidence(1.0), "100%");
        assert_eq!(format_confidence(0.0), "0%");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("car"), "Car");
        assert_eq!(title_case("traffic light"), "Traffic Light");
        assert_eq!(title_case("white-CAR"), "White-Car");
    }

    #[test]
    fn test_class_counts_sorted_case_preserving() {
        let records = vec![
            record(1, "person"),
            record(2, "car"),
            record(3, "Car"),
            record(4, "car"),
        ];
        assert_eq!(
            class_counts(&records),
            vec![
                ("Car".to_string(), 1),
                ("car".to_string(), 2),
                ("person".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_report_paths() {
        let meta = ReportMetadata::new("cam01", "cam01.mp4", "/tmp/out");
        assert_eq!(meta.report_path(), PathBuf::from("/tmp/out/cam01_report.html"));
        assert_eq!(meta.thumbs_dir(), PathBuf::from("/tmp/out/cam01_thumbs"));
        assert_eq!(report_name_for(Path::new("/videos/cam01.mp4")), "cam01");
    }
}
