//! 报告渲染器
//! Renders finalized track records into one self-contained HTML document

use super::template::{self, escape_html};
use super::{
    class_counts, format_confidence, format_timestamp, title_case, PendingReport, ReportMetadata,
    ThumbnailMode,
};
use crate::detection::TrackRecord;
use crate::error::{Result, VisionError};
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 文件名中不允许的字符
static UNSAFE_FILENAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

/// 缩略图文件名: `<track_id>_<class>.jpg`, 合成记录为 `u<编号>_<class>.jpg`
pub fn thumbnail_file_name(record: &TrackRecord) -> String {
    format!("{}.jpg", thumbnail_stem(record))
}

fn thumbnail_stem(record: &TrackRecord) -> String {
    let class = UNSAFE_FILENAME.replace_all(&record.class_label, "_");
    let class = match class.trim_matches('_') {
        "" => "object",
        c => c,
    };
    let prefix = if record.synthetic { "u" } else { "" };
    format!("{}{}_{}", prefix, record.track_id, class)
}

/// 每条记录的缩略图文件名 (与 `records` 同序), 重名时追加 `_2`、`_3`
pub fn thumbnail_file_names(records: &[TrackRecord]) -> Vec<String> {
    let mut used = HashSet::with_capacity(records.len());
    records
        .iter()
        .map(|record| {
            let stem = thumbnail_stem(record);
            let mut name = format!("{}.jpg", stem);
            let mut n = 2;
            while !used.insert(name.clone()) {
                name = format!("{}_{}.jpg", stem, n);
                n += 1;
            }
            name
        })
        .collect()
}

/// 报告渲染器
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportRenderer {
    mode: ThumbnailMode,
}

impl ReportRenderer {
    pub fn new(mode: ThumbnailMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ThumbnailMode {
        self.mode
    }

    /// 渲染并写入磁盘, 返回报告路径
    ///
    /// 文件模式下同时写入每条记录的缩略图。失败时返回 `FileSystem` 错误,
    /// `records` 不受影响, 可重试。
    pub fn render(&self, records: &[TrackRecord], meta: &ReportMetadata) -> Result<PathBuf> {
        fs::create_dir_all(&meta.output_dir).map_err(|e| VisionError::fs(&meta.output_dir, e))?;

        if self.mode == ThumbnailMode::Files {
            self.write_thumbnails(records, meta)?;
        }

        let html = self.render_html(records, meta);
        let path = meta.report_path();
        fs::write(&path, html).map_err(|e| VisionError::fs(&path, e))?;

        info!(tracks = records.len(), "📄 报告已生成: {}", path.display());
        Ok(path)
    }

    pub fn render_pending(&self, pending: &PendingReport) -> Result<PathBuf> {
        self.render(&pending.records, &pending.meta)
    }

    /// 生成完整HTML (不写磁盘)
    pub fn render_html(&self, records: &[TrackRecord], meta: &ReportMetadata) -> String {
        let names = thumbnail_file_names(records);
        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by(|&a, &b| records[a].first_seen.total_cmp(&records[b].first_seen));

        let counts = class_counts(records);
        let title = escape_html(&meta.name);

        let mut html = String::with_capacity(16 * 1024 + records.len() * 2048);
        let _ = write!(
            html,
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>VisionX Report - {title}</title>
<style>{style}</style>
</head>
<body>
<h1>VisionX Detection Report</h1>
<div class="source">{source}</div>
<div class="hint">{hint}</div>
"#,
            title = title,
            style = template::STYLE,
            source = escape_html(&meta.source_label),
            hint = template::HINT,
        );

        // 统计
        html.push_str("<div class=\"stats\">\n");
        push_stat(&mut html, records.len(), "Total Detections");
        for (cls, n) in &counts {
            push_stat(&mut html, *n, &title_case(cls));
        }
        html.push_str("</div>\n");

        // 过滤按钮
        html.push_str("<div class=\"filters\">\n");
        let _ = writeln!(
            html,
            r#"<button class="filter active" data-filter="*" onclick="filterClass(this)">All ({})</button>"#,
            records.len()
        );
        for (cls, n) in &counts {
            let _ = writeln!(
                html,
                r#"<button class="filter" data-filter="{}" onclick="filterClass(this)">{} ({})</button>"#,
                escape_html(cls),
                escape_html(&title_case(cls)),
                n
            );
        }
        html.push_str("</div>\n");

        // 卡片
        html.push_str("<div class=\"grid\">\n");
        for &i in &order {
            self.push_card(&mut html, &records[i], &names[i], meta);
        }
        html.push_str("</div>\n");
        if records.is_empty() {
            html.push_str("<div class=\"empty\">No tracked objects.</div>\n");
        }

        html.push_str(
            r#"<div class="toast" id="toast">Copied to clipboard!</div>
<div class="lightbox" id="lightbox" onclick="closeLightbox()">
<img id="lightbox-img" src="" alt="">
<div class="lightbox-title" id="lightbox-title"></div>
</div>
"#,
        );

        if let Some(at) = meta.generated_at {
            let _ = writeln!(
                html,
                "<footer>Generated {}</footer>",
                at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        let _ = write!(html, "<script>{}</script>\n</body>\n</html>\n", template::SCRIPT);
        html
    }

    fn push_card(&self, html: &mut String, record: &TrackRecord, file_name: &str, meta: &ReportMetadata) {
        let class = escape_html(&record.class_label);
        let mut heading = format!("{} #{}", escape_html(&record.class_label.to_uppercase()), record.track_id);
        if record.synthetic {
            heading.push_str(" (untracked)");
        }

        let _ = writeln!(html, r#"<div class="card" data-class="{}">"#, class);

        match self.thumbnail_src(record, file_name, meta) {
            Some(src) => {
                let _ = writeln!(
                    html,
                    r#"<img class="thumbnail" src="{}" alt="{}" title="Click to zoom" onclick="openLightbox(this)">"#,
                    src, heading
                );
            }
            None => html.push_str("<div class=\"thumbnail missing\">no image</div>\n"),
        }

        let _ = write!(
            html,
            r#"<div class="info">
<div class="title">{heading}</div>
<div class="confidence">Confidence: {confidence}</div>
<div class="timestamps">
"#,
            heading = heading,
            confidence = format_confidence(record.confidence),
        );
        push_timestamp(html, "First", record.first_seen, record.first_seen_file.as_deref());
        push_timestamp(html, "Last", record.last_seen, record.last_seen_file.as_deref());
        html.push_str("</div>\n</div>\n</div>\n");
    }

    fn thumbnail_src(&self, record: &TrackRecord, file_name: &str, meta: &ReportMetadata) -> Option<String> {
        let thumb = record.thumbnail.as_ref()?;
        Some(match self.mode {
            ThumbnailMode::Embedded => format!(
                "data:image/jpeg;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(&thumb.jpeg)
            ),
            ThumbnailMode::Files => {
                escape_html(&format!("{}/{}", meta.thumbs_dir_name(), file_name))
            }
        })
    }

    fn write_thumbnails(&self, records: &[TrackRecord], meta: &ReportMetadata) -> Result<()> {
        let dir = meta.thumbs_dir();
        if records.iter().all(|r| r.thumbnail.is_none()) {
            return Ok(());
        }
        fs::create_dir_all(&dir).map_err(|e| VisionError::fs(&dir, e))?;

        for (record, name) in records.iter().zip(thumbnail_file_names(records)) {
            if let Some(thumb) = &record.thumbnail {
                let path = dir.join(name);
                write_file(&path, &thumb.jpeg)?;
            }
        }
        debug!("缩略图已写入 {}", dir.display());
        Ok(())
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).map_err(|e| VisionError::fs(path, e))
}

fn push_stat(html: &mut String, value: usize, label: &str) {
    let _ = writeln!(
        html,
        r#"<div class="stat"><div class="stat-value">{}</div><div class="stat-label">{}</div></div>"#,
        value,
        escape_html(label)
    );
}

fn push_timestamp(html: &mut String, label: &str, seconds: f64, file: Option<&str>) {
    let ts = format_timestamp(seconds);
    let _ = writeln!(
        html,
        r#"<span class="ts" data-ts="{ts}" onclick="copyTimestamp(this)" title="Click to copy">{label}: {ts}</span>"#,
        ts = ts,
        label = label
    );
    if let Some(file) = file {
        let _ = writeln!(html, r#"<span class="ts-file">{}</span>"#, escape_html(file));
    }
}
