//! 进度事件
//! JSON-lines progress protocol for GUI front ends, or plain log lines

use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

/// 进度事件 (每行一个JSON对象, `type` 字段区分)
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    Status {
        message: String,
    },
    Progress {
        video: String,
        frame: u64,
        total_frames: u64,
        video_index: usize,
        total_videos: usize,
        fps: f64,
    },
    Report {
        path: PathBuf,
    },
    Complete {
        videos_processed: usize,
        reports_generated: usize,
    },
}

impl ProgressEvent {
    pub fn status(message: impl Into<String>) -> Self {
        ProgressEvent::Status {
            message: message.into(),
        }
    }
}

/// 进度输出
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// JSON行输出 (GUI模式)
pub struct JsonProgress<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonProgress<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonProgress<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> ProgressSink for JsonProgress<W> {
    fn emit(&self, event: ProgressEvent) {
        let Ok(line) = serde_json::to_string(&event) else {
            return;
        };
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        // 管道关闭时忽略
        let _ = writeln!(out, "{}", line);
        let _ = out.flush();
    }
}

/// 日志输出 (命令行模式), 逐帧进度只在每10%打印一次
#[derive(Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Status { message } => info!("{}", message),
            ProgressEvent::Progress {
                video,
                frame,
                total_frames,
                ..
            } => {
                let pct = percent(frame, total_frames);
                if pct % 10 == 0 {
                    info!("  分析中 {}: {}% ({}/{})", video, pct, frame, total_frames);
                }
            }
            ProgressEvent::Report { path } => info!("  Report: {}", path.display()),
            ProgressEvent::Complete {
                videos_processed,
                reports_generated,
            } => info!(
                "✅ Processed {} video(s), generated {} report(s)",
                videos_processed, reports_generated
            ),
        }
    }
}

/// 不输出
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

/// 整数百分比
pub fn percent(frame: u64, total: u64) -> u64 {
    if total == 0 {
        0
    } else {
        frame * 100 / total
    }
}

/// 按整数百分比节流 (百分比变化才发送)
#[derive(Debug, Default)]
pub struct Throttle {
    last_pct: Option<u64>,
}

impl Throttle {
    pub fn should_emit(&mut self, frame: u64, total: u64) -> bool {
        let pct = percent(frame, total);
        if self.last_pct == Some(pct) {
            false
        } else {
            self.last_pct = Some(pct);
            true
        }
    }
}
