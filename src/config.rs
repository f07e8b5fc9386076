//! 运行配置 - 命令行参数 + JSON配置文件
//! Command-line arguments override values from the config file

use crate::detection::UntrackedPolicy;
use crate::error::{Result, VisionError};
use crate::report::ThumbnailMode;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_FILE: &str = "visionx.json";

// ========== 命令行参数 ==========

/// VisionX 视频分析报告
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "VisionX - tracked object reports from video analysis", long_about = None)]
pub struct Args {
    /// 录制目录 (可多个)
    pub sources: Vec<PathBuf>,

    /// 处理目录下全部录制
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// 检测模型 (覆盖配置)
    #[arg(long)]
    pub model: Option<String>,

    /// 检测词表 (覆盖配置)
    #[arg(long, num_args = 1..)]
    pub search: Option<Vec<String>>,

    /// 置信度阈值
    #[arg(long)]
    pub conf: Option<f32>,

    /// 输出目录 (默认与视频同目录)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 帧步长 (2 = 快2倍)
    #[arg(long)]
    pub stride: Option<u32>,

    /// 多个视频作为连续序列处理 (跟踪ID跨文件连续)
    #[arg(long)]
    pub chain: bool,

    /// 配置文件
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// 输出JSON进度 (供GUI使用)
    #[arg(long)]
    pub json_progress: bool,

    /// 缩略图方式
    #[arg(long, value_enum)]
    pub thumbnails: Option<ThumbnailMode>,

    /// 未跟踪检测框也生成记录
    #[arg(long)]
    pub synthesize_untracked: bool,

    /// 并行处理的视频数
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// 写出当前配置后退出
    #[arg(long)]
    pub write_config: bool,
}

// ========== 配置文件 ==========

/// 配置文件内容
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// 检测模型 (与录制时的模型比对)
    pub model: String,
    /// 检测词表
    pub prompts: Vec<String>,
    /// 置信度阈值
    pub confidence: f32,
    /// 帧步长
    pub vid_stride: u32,
    /// 是否生成报告
    pub save_report: bool,
    /// 缩略图方式
    pub thumbnail_mode: ThumbnailMode,
    /// 未跟踪检测框处理
    pub untracked: UntrackedPolicy,
    /// 输出目录
    pub output_dir: Option<PathBuf>,
    /// 并行处理的视频数
    pub jobs: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: "yoloe-26m-seg.pt".to_string(),
            prompts: vec!["car".to_string(), "person".to_string(), "motorcycle".to_string()],
            confidence: 0.5,
            vid_stride: 1,
            save_report: true,
            thumbnail_mode: ThumbnailMode::Embedded,
            untracked: UntrackedPolicy::Drop,
            output_dir: None,
            jobs: 1,
        }
    }
}

impl RunConfig {
    /// 从JSON文件加载配置
    ///
    /// 文件不存在时先找用户配置 (`~/.config/visionx/config.json`),
    /// 仍不存在则在 `path` 写出默认配置。解析失败时使用默认值。
    pub fn load(path: &Path) -> Self {
        let source = if path.exists() {
            path.to_path_buf()
        } else if let Some(user) = user_config_path().filter(|p| p.exists()) {
            user
        } else {
            info!("📝 配置文件不存在,创建默认配置...");
            let config = Self::default();
            if let Err(e) = config.save(path) {
                warn!("❌ 保存配置失败: {}", e);
            }
            return config;
        };

        let parsed = fs::read_to_string(&source)
            .map_err(|e| VisionError::fs(&source, e))
            .and_then(|json| serde_json::from_str::<Self>(&json).map_err(VisionError::from));
        match parsed {
            Ok(config) => {
                info!("✅ 配置已从 {} 加载", source.display());
                config
            }
            Err(e) => {
                warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                Self::default()
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| VisionError::fs(path, e))?;
        info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }
}

/// 用户级配置文件
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push("visionx");
        p.push("config.json");
        p
    })
}

// ========== 合并后的运行参数 ==========

/// 最终运行参数 (命令行优先)
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub model: String,
    pub prompts: Vec<String>,
    pub confidence: f32,
    pub stride: u32,
    pub save_report: bool,
    pub thumbnail_mode: ThumbnailMode,
    pub untracked: UntrackedPolicy,
    pub output_dir: Option<PathBuf>,
    pub jobs: usize,
    pub chain: bool,
    pub json_progress: bool,
}

impl Settings {
    pub fn resolve(args: &Args, config: &RunConfig) -> Result<Self> {
        let settings = Self {
            model: args.model.clone().unwrap_or_else(|| config.model.clone()),
            prompts: args.search.clone().unwrap_or_else(|| config.prompts.clone()),
            confidence: args.conf.unwrap_or(config.confidence),
            stride: args.stride.unwrap_or(config.vid_stride),
            save_report: config.save_report,
            thumbnail_mode: args.thumbnails.unwrap_or(config.thumbnail_mode),
            untracked: if args.synthesize_untracked {
                UntrackedPolicy::Synthesize
            } else {
                config.untracked
            },
            output_dir: args.output.clone().or_else(|| config.output_dir.clone()),
            jobs: args.jobs.unwrap_or(config.jobs),
            chain: args.chain,
            json_progress: args.json_progress,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(VisionError::Config("stride must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(VisionError::Config(format!(
                "confidence must be within [0, 1], got {}",
                self.confidence
            )));
        }
        if self.prompts.is_empty() {
            return Err(VisionError::Config("at least one search prompt is required".to_string()));
        }
        if self.jobs == 0 {
            return Err(VisionError::Config("jobs must be at least 1".to_string()));
        }
        Ok(())
    }

    /// 输出目录: 指定目录, 否则视频所在目录
    pub fn output_dir_for(&self, source: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => source
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        // 默认配置总是合法
        let config = RunConfig::default();
        Self {
            model: config.model,
            prompts: config.prompts,
            confidence: config.confidence,
            stride: config.vid_stride,
            save_report: config.save_report,
            thumbnail_mode: config.thumbnail_mode,
            untracked: config.untracked,
            output_dir: config.output_dir,
            jobs: config.jobs,
            chain: false,
            json_progress: false,
        }
    }
}
