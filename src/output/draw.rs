// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/draw.rs - 人脸检测结果可视化与记录
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

#[cfg(feature = "directory_record")]
use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
#[cfg(feature = "directory_record")]
use serde_json::{Value, json};

use crate::{frame::LetterboxFrame, geometry::BBox, model::DetectResult};

const BOX_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const BOX_THICKNESS: u32 = 2;

/// 在原图上绘制人脸框
#[derive(Debug, Clone)]
pub struct Draw {
  color: [u8; 3],
  thickness: u32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      color: BOX_COLOR,
      thickness: BOX_THICKNESS,
    }
  }
}

impl Draw {
  // bbox 为像素坐标，超出图像的部分被裁掉
  fn draw_bbox(&self, image: &mut RgbImage, bbox: &BBox) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = (bbox.x_min.floor() as i32).clamp(0, w - 1);
    let y_min = (bbox.y_min.floor() as i32).clamp(0, h - 1);
    let x_max = (bbox.x_max.ceil() as i32).clamp(0, w - 1);
    let y_max = (bbox.y_max.ceil() as i32).clamp(0, h - 1);

    for t in 0..self.thickness as i32 {
      let (left, top, right, bottom) = (x_min + t, y_min + t, x_max - t, y_max - t);
      if left >= right || top >= bottom {
        break;
      }
      let rect = Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
      draw_hollow_rect_mut(image, rect, Rgb(self.color));
    }
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    let (w, h) = (image.width() as f32, image.height() as f32);
    for detection in result.iter() {
      self.draw_bbox(image, &detection.bbox.scale(w, h));
    }
  }

  /// 复制帧的原图并画上检测结果
  pub fn draw_detection<const W: u32, const H: u32>(
    &self,
    frame: &LetterboxFrame<W, H>,
    result: &DetectResult,
  ) -> RgbImage {
    let mut image = frame.source().clone();
    self.draw_detections_on_image(&mut image, result);
    image
  }
}

/// 以 JSON 记录检测结果，坐标同时给出归一化值和像素值
#[cfg(feature = "directory_record")]
#[derive(Debug, Clone, Default)]
pub struct Record;

#[cfg(feature = "directory_record")]
impl Record {
  pub fn to_json(&self, result: &DetectResult, width: u32, height: u32) -> Value {
    let faces: Vec<Value> = result
      .iter()
      .map(|detection| {
        let pixels = detection.bbox.scale(width as f32, height as f32);
        json!({
          "score": detection.score,
          "bbox": detection.bbox.to_array(),
          "pixels": pixels.to_array(),
        })
      })
      .collect();

    json!({
      "width": width,
      "height": height,
      "faces": faces,
    })
  }

  /// 写到与图像同名的 `.json` 文件
  pub fn record(
    &self,
    result: &DetectResult,
    width: u32,
    height: u32,
    path: &Path,
  ) -> Result<(), std::io::Error> {
    let value = self.to_json(result, width, height);
    let content = serde_json::to_vec_pretty(&value)?;
    std::fs::write(path.with_extension("json"), content)
  }
}
