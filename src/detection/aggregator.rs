//! 跟踪聚合器
//! Folds per-frame detection events into one best-evidence record per track
//!
//! 规则:
//! 1. 每个 track_id 只有一条记录,创建后不删除
//! 2. 置信度严格更高时替换 类别/置信度/缩略图 (相等保留旧记录)
//! 3. 每个事件都更新 last_seen
//! 4. first_seen 创建后不变

use super::thumbnail::{self, Thumbnail};
use super::types::{DetectionEvent, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

// ========== 配置 ==========

/// 未跟踪检测框的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UntrackedPolicy {
    /// 丢弃 (默认)
    #[default]
    Drop,
    /// 每个未跟踪框生成独立记录, 显示编号为 frame_index * 1000 + detection_index
    Synthesize,
}

/// 合成编号时每帧预留的序号空间 (仅用于显示)
pub const SYNTHETIC_IDS_PER_FRAME: u64 = 1000;

/// 记录索引键: 跟踪器ID与合成记录互不重叠
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Tracked(TrackId),
    /// 串联模式下帧号按文件重新计数, 所以带上文件名
    Synthetic {
        file: Option<String>,
        frame: u64,
        index: usize,
    },
}

// ========== 数据结构 ==========

/// 聚合后的跟踪记录
#[derive(Clone, Debug, PartialEq)]
pub struct TrackRecord {
    pub track_id: TrackId,
    /// 最高置信度事件的类别
    pub class_label: String,
    /// 最高置信度
    pub confidence: f32,
    pub first_seen: f64,
    pub last_seen: f64,
    /// 串联模式: first_seen 所属视频
    pub first_seen_file: Option<String>,
    /// 串联模式: last_seen 所属视频
    pub last_seen_file: Option<String>,
    /// 最高置信度事件的裁剪图 (退化裁剪时为 None)
    pub thumbnail: Option<Thumbnail>,
    /// 由未跟踪检测框合成的记录
    pub synthetic: bool,
}

/// 单个事件的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// 新建记录
    Created,
    /// 置信度提升,证据已替换
    Improved,
    /// 仅更新 last_seen
    Extended,
    /// 事件被丢弃
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// 无跟踪ID
    Untracked,
    /// 检测框或置信度无效
    Malformed,
}

/// 聚合统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    pub events: u64,
    pub untracked: u64,
    pub malformed: u64,
    pub degenerate_crops: u64,
}

// ========== 聚合器 ==========

/// 跟踪聚合器
///
/// 单线程顺序调用 `ingest`;串联模式下同一实例跨多个视频使用,
/// 事件携带 `source_file` 即记录文件归属。
#[derive(Debug, Default)]
pub struct TrackAggregator {
    /// 按创建顺序存放
    records: Vec<TrackRecord>,
    /// 记录键 → records 下标
    index: HashMap<RecordKey, usize>,
    policy: UntrackedPolicy,
    stats: AggregatorStats,
}

impl TrackAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: UntrackedPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn policy(&self) -> UntrackedPolicy {
        self.policy
    }

    pub fn stats(&self) -> AggregatorStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 按跟踪器ID查找 (不含合成记录)
    pub fn get(&self, track_id: TrackId) -> Option<&TrackRecord> {
        self.get_by_key(&RecordKey::Tracked(track_id))
    }

    pub fn get_by_key(&self, key: &RecordKey) -> Option<&TrackRecord> {
        self.index.get(key).map(|&i| &self.records[i])
    }

    /// 按创建顺序遍历
    pub fn records(&self) -> impl Iterator<Item = &TrackRecord> {
        self.records.iter()
    }

    /// 处理一个检测事件
    pub fn ingest(&mut self, event: &DetectionEvent<'_>) -> IngestOutcome {
        self.stats.events += 1;

        if !event.bbox.is_valid()
            || !(0.0..=1.0).contains(&event.confidence)
            || !event.timestamp.is_finite()
        {
            self.stats.malformed += 1;
            debug!(
                frame = event.frame_index,
                bbox = ?event.bbox,
                confidence = event.confidence,
                "丢弃无效检测"
            );
            return IngestOutcome::Dropped(DropReason::Malformed);
        }

        let (key, track_id) = match (event.track_id, self.policy) {
            (Some(id), _) => (RecordKey::Tracked(id), id),
            (None, UntrackedPolicy::Drop) => {
                self.stats.untracked += 1;
                return IngestOutcome::Dropped(DropReason::Untracked);
            }
            (None, UntrackedPolicy::Synthesize) => (
                RecordKey::Synthetic {
                    file: event.source_file.map(str::to_string),
                    frame: event.frame_index,
                    index: event.detection_index,
                },
                event.frame_index * SYNTHETIC_IDS_PER_FRAME + event.detection_index as u64,
            ),
        };
        let synthetic = matches!(key, RecordKey::Synthetic { .. });

        match self.index.get(&key).copied() {
            None => {
                let thumbnail = self.thumbnail_for(event);
                self.index.insert(key, self.records.len());
                self.records.push(TrackRecord {
                    track_id,
                    class_label: event.class_label.to_string(),
                    confidence: event.confidence,
                    first_seen: event.timestamp,
                    last_seen: event.timestamp,
                    first_seen_file: event.source_file.map(str::to_string),
                    last_seen_file: event.source_file.map(str::to_string),
                    thumbnail,
                    synthetic,
                });
                IngestOutcome::Created
            }
            Some(i) if event.confidence > self.records[i].confidence => {
                let thumbnail = self.thumbnail_for(event);
                let record = &mut self.records[i];
                record.class_label = event.class_label.to_string();
                record.confidence = event.confidence;
                record.thumbnail = thumbnail;
                touch(record, event);
                IngestOutcome::Improved
            }
            Some(i) => {
                touch(&mut self.records[i], event);
                IngestOutcome::Extended
            }
        }
    }

    /// 结束聚合: 按 first_seen 升序 (相同时保持创建顺序)
    pub fn finalize(self) -> Vec<TrackRecord> {
        let mut records = self.records;
        records.sort_by(|a, b| a.first_seen.total_cmp(&b.first_seen));
        records
    }

    fn thumbnail_for(&mut self, event: &DetectionEvent<'_>) -> Option<Thumbnail> {
        match thumbnail::extract(event.frame, &event.bbox) {
            Ok(Some(thumb)) => Some(thumb),
            Ok(None) => {
                self.stats.degenerate_crops += 1;
                debug!(frame = event.frame_index, bbox = ?event.bbox, "裁剪区域为空,无缩略图");
                None
            }
            Err(e) => {
                warn!(frame = event.frame_index, "缩略图编码失败: {}", e);
                None
            }
        }
    }
}

/// 更新最后出现时间 (及所属文件)
fn touch(record: &mut TrackRecord, event: &DetectionEvent<'_>) {
    record.last_seen = event.timestamp;
    if let Some(file) = event.source_file {
        record.last_seen_file = Some(file.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::BBox;
    use image::{Rgb, RgbImage};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn event<'a>(
        frame: &'a RgbImage,
        track_id: Option<TrackId>,
        class_label: &'a str,
        confidence: f32,
        timestamp: f64,
    ) -> DetectionEvent<'a> {
        DetectionEvent {
            frame_index: (timestamp * 10.0) as u64,
            detection_index: 0,
            timestamp,
            track_id,
            class_label,
            confidence,
            bbox: BBox::new(10.0, 10.0, 30.0, 30.0),
            frame,
            source_file: None,
        }
    }

    /// 每个颜色一帧,用于区分缩略图来源
    fn solid(r: u8) -> RgbImage {
        RgbImage::from_pixel(64, 64, Rgb([r, 0, 0]))
    }

    fn thumb_of(frame: &RgbImage) -> Thumbnail {
        thumbnail::extract(frame, &BBox::new(10.0, 10.0, 30.0, 30.0))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_best_evidence_end_to_end() {
        let (f1, f2, f3) = (solid(10), solid(120), solid(250));
        let mut agg = TrackAggregator::new();

        assert_eq!(agg.ingest(&event(&f1, Some(7), "car", 0.4, 1.0)), IngestOutcome::Created);
        assert_eq!(agg.ingest(&event(&f2, Some(7), "car", 0.9, 2.0)), IngestOutcome::Improved);
        assert_eq!(agg.ingest(&event(&f3, Some(7), "car", 0.6, 3.0)), IngestOutcome::Extended);

        let records = agg.finalize();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.track_id, 7);
        assert_eq!(r.confidence, 0.9);
        assert_eq!(r.first_seen, 1.0);
        assert_eq!(r.last_seen, 3.0);
        assert_eq!(r.thumbnail.as_ref(), Some(&thumb_of(&f2)));
    }

    #[test]
    fn test_tie_keeps_first_evidence() {
        let (f1, f2) = (solid(10), solid(250));
        let mut agg = TrackAggregator::new();
        agg.ingest(&event(&f1, Some(3), "car", 0.5, 1.0));
        assert_eq!(agg.ingest(&event(&f2, Some(3), "truck", 0.5, 4.0)), IngestOutcome::Extended);

        let r = agg.get(3).unwrap();
        assert_eq!(r.class_label, "car");
        assert_eq!(r.thumbnail.as_ref(), Some(&thumb_of(&f1)));
        assert_eq!(r.last_seen, 4.0);
    }

    #[test]
    fn test_class_follows_confidence_maximum() {
        let f = solid(90);
        let mut agg = TrackAggregator::new();
        agg.ingest(&event(&f, Some(1), "truck", 0.3, 0.5));
        agg.ingest(&event(&f, Some(1), "car", 0.8, 1.5));
        agg.ingest(&event(&f, Some(1), "bus", 0.7, 2.5));

        let r = agg.get(1).unwrap();
        assert_eq!(r.class_label, "car");
        assert_eq!(r.confidence, 0.8);
        assert_eq!(r.last_seen, 2.5);
    }

    #[test]
    fn test_untracked_dropped_by_default() {
        let f = solid(0);
        let mut agg = TrackAggregator::new();
        assert_eq!(
            agg.ingest(&event(&f, None, "person", 0.99, 1.0)),
            IngestOutcome::Dropped(DropReason::Untracked)
        );
        assert!(agg.is_empty());
        assert_eq!(agg.stats().untracked, 1);
    }

    #[test]
    fn test_untracked_synthesized_when_configured() {
        let f = solid(0);
        let mut agg = TrackAggregator::with_policy(UntrackedPolicy::Synthesize);
        let mut ev = event(&f, None, "person", 0.9, 1.0);
        ev.frame_index = 12;
        ev.detection_index = 3;
        assert_eq!(agg.ingest(&ev), IngestOutcome::Created);

        let key = RecordKey::Synthetic {
            file: None,
            frame: 12,
            index: 3,
        };
        let r = agg.get_by_key(&key).unwrap();
        assert!(r.synthetic);
        assert_eq!(r.track_id, 12_003);
        assert_eq!(r.class_label, "person");
        assert!(agg.get(12_003).is_none());
    }

    #[test]
    fn test_synthetic_records_never_fold_into_tracks() {
        let f = solid(0);
        let mut agg = TrackAggregator::with_policy(UntrackedPolicy::Synthesize);

        // 跟踪器ID 12003 与第12帧第3个未跟踪框的显示编号相同
        assert_eq!(agg.ingest(&event(&f, Some(12_003), "car", 0.5, 1.0)), IngestOutcome::Created);
        let mut untracked = event(&f, None, "person", 0.9, 1.2);
        untracked.frame_index = 12;
        untracked.detection_index = 3;
        assert_eq!(agg.ingest(&untracked), IngestOutcome::Created);

        // 单帧超过1000个框时与下一帧编号重叠
        let mut a = event(&f, None, "person", 0.6, 2.0);
        a.frame_index = 1;
        a.detection_index = 1000;
        let mut b = event(&f, None, "person", 0.6, 2.1);
        b.frame_index = 2;
        b.detection_index = 0;
        assert_eq!(agg.ingest(&a), IngestOutcome::Created);
        assert_eq!(agg.ingest(&b), IngestOutcome::Created);

        assert_eq!(agg.len(), 4);
        let car = agg.get(12_003).unwrap();
        assert_eq!(car.class_label, "car");
        assert!(!car.synthetic);
        assert_eq!(agg.records().filter(|r| r.synthetic).count(), 3);
    }

    #[test]
    fn test_synthetic_keys_are_per_file_in_chain() {
        let f = solid(0);
        let mut agg = TrackAggregator::with_policy(UntrackedPolicy::Synthesize);
        for file in ["a.mp4", "b.mp4"] {
            let mut ev = event(&f, None, "person", 0.6, 1.0);
            ev.frame_index = 5;
            ev.source_file = Some(file);
            assert_eq!(agg.ingest(&ev), IngestOutcome::Created);
        }
        assert_eq!(agg.len(), 2);
    }

    #[test]
    fn test_malformed_box_dropped() {
        let f = solid(0);
        let mut agg = TrackAggregator::new();
        let mut ev = event(&f, Some(1), "car", 0.9, 1.0);
        ev.bbox = BBox::new(30.0, 10.0, 10.0, 30.0);
        assert_eq!(agg.ingest(&ev), IngestOutcome::Dropped(DropReason::Malformed));
        assert!(agg.is_empty());
    }

    #[test]
    fn test_confidence_outside_unit_range_dropped() {
        let f = solid(0);
        let mut agg = TrackAggregator::new();
        for conf in [1.5, -0.1, f32::NAN] {
            assert_eq!(
                agg.ingest(&event(&f, Some(1), "car", conf, 1.0)),
                IngestOutcome::Dropped(DropReason::Malformed)
            );
        }
        assert_eq!(agg.ingest(&event(&f, Some(1), "car", 1.0, 1.0)), IngestOutcome::Created);
        assert_eq!(agg.stats().malformed, 3);
    }

    #[test]
    fn test_degenerate_crop_leaves_thumbnail_absent() {
        let f = RgbImage::new(15, 15);
        let mut agg = TrackAggregator::new();
        let mut ev = event(&f, Some(5), "car", 0.7, 1.0);
        ev.bbox = BBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(agg.ingest(&ev), IngestOutcome::Created);

        let r = agg.get(5).unwrap();
        assert!(r.thumbnail.is_none());
        assert_eq!(agg.stats().degenerate_crops, 1);
    }

    #[test]
    fn test_improvement_with_degenerate_crop_clears_thumbnail() {
        let f = solid(40);
        let mut agg = TrackAggregator::new();
        agg.ingest(&event(&f, Some(5), "car", 0.5, 1.0));

        let mut better = event(&f, Some(5), "car", 0.8, 2.0);
        better.bbox = BBox::new(100.0, 100.0, 120.0, 120.0);
        assert_eq!(agg.ingest(&better), IngestOutcome::Improved);
        assert!(agg.get(5).unwrap().thumbnail.is_none());
    }

    #[test]
    fn test_chain_mode_tracks_files() {
        let f = solid(60);
        let mut agg = TrackAggregator::new();

        let mut a = event(&f, Some(9), "car", 0.9, 42.0);
        a.source_file = Some("cam_0001.mp4");
        agg.ingest(&a);

        // 下一个视频的本地时间从0开始,ID保持连续
        let mut b = event(&f, Some(9), "car", 0.2, 3.0);
        b.source_file = Some("cam_0002.mp4");
        agg.ingest(&b);

        let r = agg.get(9).unwrap();
        assert_eq!(r.first_seen, 42.0);
        assert_eq!(r.first_seen_file.as_deref(), Some("cam_0001.mp4"));
        assert_eq!(r.last_seen, 3.0);
        assert_eq!(r.last_seen_file.as_deref(), Some("cam_0002.mp4"));
    }

    #[test]
    fn test_finalize_orders_by_first_seen_then_insertion() {
        let f = solid(0);
        let mut agg = TrackAggregator::new();
        agg.ingest(&event(&f, Some(30), "car", 0.5, 2.0));
        agg.ingest(&event(&f, Some(10), "car", 0.5, 1.0));
        agg.ingest(&event(&f, Some(20), "car", 0.5, 2.0));
        agg.ingest(&event(&f, Some(5), "car", 0.5, 3.0));

        let ids: Vec<_> = agg.finalize().iter().map(|r| r.track_id).collect();
        assert_eq!(ids, vec![10, 30, 20, 5]);
    }

    #[test]
    fn test_random_sequences_match_reference() {
        let frames: Vec<RgbImage> = (0..4).map(|i| solid(i * 60)).collect();
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..50 {
            // (track, frame, conf, t)
            let mut events = Vec::new();
            for step in 0..40 {
                let track = rng.gen_range(0..5u64);
                let frame = rng.gen_range(0..frames.len());
                let conf = (rng.gen_range(0..10) as f32) / 10.0;
                events.push((track, frame, conf, step as f64 * 0.5));
            }

            let run = || {
                let mut agg = TrackAggregator::new();
                for &(track, frame, conf, t) in &events {
                    agg.ingest(&event(&frames[frame], Some(track), "car", conf, t));
                }
                agg.finalize()
            };
            let records = run();
            assert_eq!(records, run(), "aggregation is deterministic");

            for r in &records {
                let mine: Vec<_> = events.iter().filter(|e| e.0 == r.track_id).collect();
                let max = mine.iter().map(|e| e.2).fold(f32::MIN, f32::max);
                let best = mine.iter().find(|e| e.2 == max).unwrap();

                assert_eq!(r.confidence, max);
                assert_eq!(r.first_seen, mine.first().unwrap().3);
                assert_eq!(r.last_seen, mine.last().unwrap().3);
                assert_eq!(r.thumbnail.as_ref(), Some(&thumb_of(&frames[best.1])));
            }
        }
    }
}
