/// VisionX 视频分析报告
///
/// 读取录制的检测结果 → 按跟踪ID聚合 → 生成HTML报告
/// 直接运行: cargo run --bin visionx -- <capture-dir>... [--chain] [--json-progress]
use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use visionx::input::{scan_captures, CaptureSource};
use visionx::pipeline::{JsonProgress, LogProgress, Pipeline, ProgressEvent, ProgressSink};
use visionx::{Args, RunConfig, Settings};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 日志输出到 stderr, stdout 留给 JSON 进度
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = RunConfig::load(&args.config);
    let settings = Settings::resolve(&args, &config).context("参数无效")?;

    if args.write_config {
        let config = RunConfig {
            model: settings.model.clone(),
            prompts: settings.prompts.clone(),
            confidence: settings.confidence,
            vid_stride: settings.stride,
            save_report: settings.save_report,
            thumbnail_mode: settings.thumbnail_mode,
            untracked: settings.untracked,
            output_dir: settings.output_dir.clone(),
            jobs: settings.jobs,
        };
        config.save(&args.config)?;
        return Ok(());
    }

    let sources = collect_sources(&args)?;
    if sources.is_empty() {
        Args::command().print_help()?;
        return Ok(());
    }

    info!("🚀 VisionX 启动");
    info!("📦 检测模型: {}", settings.model);
    info!("🔍 检测词表: {}", settings.prompts.join(", "));
    info!("📹 视频数: {}", sources.len());

    let progress: Arc<dyn ProgressSink> = if settings.json_progress {
        Arc::new(JsonProgress::stdout())
    } else {
        Arc::new(LogProgress)
    };

    let open = {
        let settings = settings.clone();
        move |path: &Path| -> visionx::Result<CaptureSource> {
            let source = CaptureSource::open(path)?;
            if let Some(recorded) = source.model() {
                if recorded != settings.model {
                    warn!("⚠️  {} 录制时使用模型 {}, 当前配置为 {}", path.display(), recorded, settings.model);
                }
            }
            Ok(source
                .with_stride(settings.stride)
                .with_vocabulary(&settings.prompts)
                .with_min_confidence(settings.confidence))
        }
    };

    let pipeline = Pipeline::new(settings.clone(), progress.clone());

    if settings.chain && sources.len() > 1 {
        let report = pipeline.process_chain(&sources, open)?;
        progress.emit(ProgressEvent::Complete {
            videos_processed: sources.len(),
            reports_generated: usize::from(report.is_some()),
        });
        return Ok(());
    }
    if settings.chain {
        warn!("⚠️  串联模式至少需要2个视频, 按单个视频处理");
    }

    let summary = pipeline.process_batch(&sources, open);
    progress.emit(ProgressEvent::Complete {
        videos_processed: summary.videos,
        reports_generated: summary.reports.len(),
    });

    if let Some((path, err)) = summary.failed.into_iter().next() {
        return Err(err).with_context(|| format!("处理 {} 失败", path.display()));
    }
    Ok(())
}

/// 命令行位置参数 + `--dir` 下的全部录制
fn collect_sources(args: &Args) -> anyhow::Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    if let Some(dir) = &args.dir {
        if !dir.is_dir() {
            bail!("目录不存在: {}", dir.display());
        }
        let found = scan_captures(dir)?;
        if found.is_empty() {
            warn!("⚠️  {} 下没有录制", dir.display());
        }
        sources.extend(found);
    }
    sources.extend(args.sources.iter().cloned());
    Ok(sources)
}
