/// 视频处理流水线 (Video Processing Pipeline)
///
/// 检测引擎 → 跟踪聚合器 → 报告渲染器, 单向数据流
/// - process_video: 单个视频, 独立聚合器
/// - process_chain: 多个视频连续处理, 跟踪ID跨文件连续
/// - process_batch: 多个独立视频, 工作线程并行处理 (互不共享状态)
pub mod progress;

pub use progress::{JsonProgress, LogProgress, NoProgress, ProgressEvent, ProgressSink, Throttle};

use crate::config::Settings;
use crate::detection::{frame_timestamp, DetectionEvent, TrackAggregator};
use crate::error::{Result, VisionError};
use crate::input::{DetectionStream, VideoInfo, VideoSource};
use crate::report::{report_name_for, PendingReport, ReportMetadata, ReportRenderer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

// ========== 结果 ==========

/// 批处理汇总
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub videos: usize,
    /// 按输入顺序
    pub reports: Vec<PathBuf>,
    /// 无法读取而跳过的视频
    pub skipped: Vec<(PathBuf, String)>,
    /// 报告写入等致命错误
    pub failed: Vec<(PathBuf, VisionError)>,
}

/// 进度位置 (串联模式跨视频累计)
struct Cursor {
    video_index: usize,
    total_videos: usize,
    frame: u64,
    total_frames: u64,
    throttle: Throttle,
}

// ========== 流水线 ==========

pub struct Pipeline {
    settings: Settings,
    progress: Arc<dyn ProgressSink>,
    renderer: ReportRenderer,
}

impl Pipeline {
    pub fn new(settings: Settings, progress: Arc<dyn ProgressSink>) -> Self {
        let renderer = ReportRenderer::new(settings.thumbnail_mode);
        Self {
            settings,
            progress,
            renderer,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn emit(&self, event: ProgressEvent) {
        self.progress.emit(event);
    }

    /// 处理单个视频, 返回报告路径 (无跟踪记录时为 None)
    ///
    /// 报告写入失败时返回 `VisionError::RenderFailed`, 其中带有聚合结果。
    pub fn process_video<S>(
        &self,
        source: &mut S,
        video_index: usize,
        total_videos: usize,
    ) -> Result<Option<PathBuf>>
    where
        S: VideoSource + DetectionStream + ?Sized,
    {
        self.emit(ProgressEvent::status(format!("Processing: {}", source.name())));

        let info = VideoInfo::probe(source)?;
        let mut aggregator = TrackAggregator::with_policy(self.settings.untracked);
        let mut cursor = Cursor {
            video_index,
            total_videos,
            frame: 0,
            total_frames: info.processed_frames(self.settings.stride),
            throttle: Throttle::default(),
        };

        self.ingest(&mut aggregator, source, &info, None, &mut cursor)?;

        let meta = ReportMetadata::new(
            report_name_for(Path::new(&info.name)),
            info.name.clone(),
            self.settings.output_dir_for(source.path()),
        );
        self.finish(aggregator, meta)
    }

    /// 串联处理: 一个聚合器贯穿所有视频, 时间戳为各视频内的本地时间
    ///
    /// 无法打开或探测的视频跳过;报告以第一个可读视频命名 (`<名称>_chain`)。
    pub fn process_chain<S, F>(&self, paths: &[PathBuf], open: F) -> Result<Option<PathBuf>>
    where
        S: VideoSource + DetectionStream,
        F: Fn(&Path) -> Result<S>,
    {
        // 先探测全部视频 (帧率各自独立)
        let mut chain: Vec<(S, VideoInfo)> = Vec::with_capacity(paths.len());
        for path in paths {
            match open(path).and_then(|mut s| VideoInfo::probe(&mut s).map(|info| (s, info))) {
                Ok(entry) => chain.push(entry),
                Err(e) if e.is_source_local() => {
                    warn!("⚠️  跳过 {}: {}", path.display(), e);
                    self.emit(ProgressEvent::status(format!("Skipping: {}", e)));
                }
                Err(e) => return Err(e),
            }
        }
        if chain.is_empty() {
            warn!("⚠️  串联中没有可读取的视频");
            return Ok(None);
        }

        let total_frames: u64 = chain
            .iter()
            .map(|(_, info)| info.processed_frames(self.settings.stride))
            .sum();
        self.emit(ProgressEvent::status(format!(
            "Chain mode: {} videos, {} total frames",
            chain.len(),
            total_frames
        )));

        let mut aggregator = TrackAggregator::with_policy(self.settings.untracked);
        let mut cursor = Cursor {
            video_index: 0,
            total_videos: chain.len(),
            frame: 0,
            total_frames,
            throttle: Throttle::default(),
        };

        let total = chain.len();
        for (i, (source, info)) in chain.iter_mut().enumerate() {
            cursor.video_index = i + 1;
            self.emit(ProgressEvent::status(format!(
                "Processing: {} ({}/{})",
                info.name,
                i + 1,
                total
            )));

            let file = info.name.clone();
            match self.ingest(&mut aggregator, source, info, Some(&file), &mut cursor) {
                Ok(()) => {}
                // 已聚合的部分保留, 继续下一个视频
                Err(e) if e.is_source_local() => warn!("⚠️  {} 中断: {}", info.name, e),
                Err(e) => return Err(e),
            }
        }

        let names: Vec<&str> = chain.iter().map(|(_, info)| info.name.as_str()).collect();
        let (first, first_info) = &chain[0];
        let meta = ReportMetadata::new(
            format!("{}_chain", report_name_for(Path::new(&first_info.name))),
            format!("{} ({} videos)", names.join(" → "), names.len()),
            self.settings.output_dir_for(first.path()),
        );
        self.finish(aggregator, meta)
    }

    /// 并行处理独立视频 (`settings.jobs` 个工作线程)
    ///
    /// 单个视频的读取错误只跳过该视频。
    pub fn process_batch<S, F>(&self, paths: &[PathBuf], open: F) -> BatchSummary
    where
        S: VideoSource + DetectionStream,
        F: Fn(&Path) -> Result<S> + Sync,
    {
        let total = paths.len();
        let workers = self.settings.jobs.clamp(1, total.max(1));

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, &Path)>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        for (i, path) in paths.iter().enumerate() {
            let _ = job_tx.send((i, path.as_path()));
        }
        drop(job_tx);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let open = &open;
                scope.spawn(move || {
                    for (i, path) in job_rx.iter() {
                        let result = open(path)
                            .and_then(|mut source| self.process_video(&mut source, i + 1, total));
                        let _ = result_tx.send((i, result));
                    }
                });
            }
        });
        drop(result_tx);

        let mut results: Vec<(usize, Result<Option<PathBuf>>)> = result_rx.iter().collect();
        results.sort_by_key(|(i, _)| *i);

        let mut summary = BatchSummary {
            videos: total,
            ..Default::default()
        };
        for (i, result) in results {
            let path = paths[i].clone();
            match result {
                Ok(Some(report)) => summary.reports.push(report),
                Ok(None) => {}
                Err(e) if e.is_source_local() => {
                    warn!("⚠️  跳过 {}: {}", path.display(), e);
                    self.emit(ProgressEvent::status(format!("Skipping: {}", e)));
                    summary.skipped.push((path, e.to_string()));
                }
                Err(e) => {
                    warn!("❌ {} 处理失败: {}", path.display(), e);
                    summary.failed.push((path, e));
                }
            }
        }
        summary
    }

    /// 逐帧送入聚合器
    fn ingest<S>(
        &self,
        aggregator: &mut TrackAggregator,
        source: &mut S,
        info: &VideoInfo,
        file: Option<&str>,
        cursor: &mut Cursor,
    ) -> Result<()>
    where
        S: DetectionStream + ?Sized,
    {
        while let Some(frame) = source.next_frame()? {
            cursor.frame += 1;
            if cursor.throttle.should_emit(cursor.frame, cursor.total_frames) {
                self.emit(ProgressEvent::Progress {
                    video: info.name.clone(),
                    frame: cursor.frame,
                    total_frames: cursor.total_frames,
                    video_index: cursor.video_index,
                    total_videos: cursor.total_videos,
                    fps: info.fps,
                });
            }

            if !self.settings.save_report {
                continue;
            }
            let timestamp = frame_timestamp(frame.frame_index, self.settings.stride, info.fps);
            for event in DetectionEvent::from_frame(&frame, timestamp, file) {
                aggregator.ingest(&event);
            }
        }
        Ok(())
    }

    /// 结束聚合并生成报告
    fn finish(&self, aggregator: TrackAggregator, meta: ReportMetadata) -> Result<Option<PathBuf>> {
        let stats = aggregator.stats();
        info!(
            tracks = aggregator.len(),
            events = stats.events,
            untracked = stats.untracked,
            degenerate = stats.degenerate_crops,
            "📊 {} 聚合完成",
            meta.source_label
        );

        if !self.settings.save_report || aggregator.is_empty() {
            return Ok(None);
        }

        let pending = PendingReport {
            records: aggregator.finalize(),
            meta: meta.with_generated_at(chrono::Local::now()),
        };
        match self.renderer.render_pending(&pending) {
            Ok(path) => {
                self.emit(ProgressEvent::Report { path: path.clone() });
                Ok(Some(path))
            }
            Err(e) => Err(VisionError::render_failed(pending, e)),
        }
    }
}
