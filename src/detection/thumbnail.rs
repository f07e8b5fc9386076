//! 缩略图提取
//! Thumbnail cropping with padding + JPEG encoding

use super::types::{BBox, THUMBNAIL_JPEG_QUALITY, THUMBNAIL_PAD_RATIO};
use crate::error::Result;
use image::{imageops, RgbImage};
use std::io::Cursor;

/// 裁剪区域 (像素, 右/下边界不含)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropRect {
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// 已编码的缩略图
#[derive(Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thumbnail")
            .field("size", &format_args!("{}x{}", self.width, self.height))
            .field("jpeg_bytes", &self.jpeg.len())
            .finish()
    }
}

/// 检测框四周扩展 `pad = 0.3 × 边长`,再裁剪到图像范围内
///
/// 坐标先截断为整数像素。扩展后面积为0时返回 None (退化裁剪)。
pub fn padded_crop(bbox: &BBox, frame_width: u32, frame_height: u32) -> Option<CropRect> {
    let (x1, y1) = (bbox.x1 as i64, bbox.y1 as i64);
    let (x2, y2) = (bbox.x2 as i64, bbox.y2 as i64);

    let pad_x = ((x2 - x1) as f32 * THUMBNAIL_PAD_RATIO) as i64;
    let pad_y = ((y2 - y1) as f32 * THUMBNAIL_PAD_RATIO) as i64;

    let x1 = (x1 - pad_x).max(0);
    let y1 = (y1 - pad_y).max(0);
    let x2 = (x2 + pad_x).min(frame_width as i64);
    let y2 = (y2 + pad_y).min(frame_height as i64);

    if x2 > x1 && y2 > y1 {
        Some(CropRect {
            x1: x1 as u32,
            y1: y1 as u32,
            x2: x2 as u32,
            y2: y2 as u32,
        })
    } else {
        None
    }
}

/// 裁剪并编码为JPEG (质量85)
pub fn encode_crop(frame: &RgbImage, rect: CropRect) -> Result<Thumbnail> {
    let crop = imageops::crop_imm(frame, rect.x1, rect.y1, rect.width(), rect.height()).to_image();

    let mut buf = Cursor::new(Vec::new());
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, THUMBNAIL_JPEG_QUALITY);
    crop.write_with_encoder(encoder)?;

    Ok(Thumbnail {
        jpeg: buf.into_inner(),
        width: rect.width(),
        height: rect.height(),
    })
}

/// 提取缩略图: 退化裁剪返回 Ok(None)
pub fn extract(frame: &RgbImage, bbox: &BBox) -> Result<Option<Thumbnail>> {
    match padded_crop(bbox, frame.width(), frame.height()) {
        Some(rect) => encode_crop(frame, rect).map(Some),
        None => Ok(None),
    }
}
