// 该文件是 Beifeng （北风） 项目的一部分。
// src/postprocess/letterbox.rs - 去除 letterbox 填充
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

use crate::{geometry::BBox, postprocess::Detection};

/// 单侧填充占模型输入边长的比例
///
/// 必须满足 `x < 0.5` 且 `y < 0.5`，否则缩放系数不为正，结果无意义。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Padding {
  pub x: f32,
  pub y: f32,
}

impl Padding {
  pub const NONE: Padding = Padding { x: 0.0, y: 0.0 };

  pub const fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }

  fn scales(&self) -> (f32, f32) {
    (1.0 - self.x * 2.0, 1.0 - self.y * 2.0)
  }
}

/// 把填充后正方形输入中的归一化坐标映射回原图的归一化坐标
pub fn remove_letterbox(detections: &[Detection], padding: Padding) -> Vec<Detection> {
  let (h_scale, v_scale) = padding.scales();

  detections
    .iter()
    .map(|det| {
      let bbox = BBox::new(
        (det.bbox.x_min - padding.x) / h_scale,
        (det.bbox.y_min - padding.y) / v_scale,
        (det.bbox.x_max - padding.x) / h_scale,
        (det.bbox.y_max - padding.y) / v_scale,
      );
      Detection::new(bbox, det.score)
    })
    .collect()
}

/// [`remove_letterbox`] 的逆变换：把原图归一化坐标映射到填充后的输入坐标
pub fn apply_letterbox(bbox: &BBox, padding: Padding) -> BBox {
  let (h_scale, v_scale) = padding.scales();

  BBox::new(
    bbox.x_min * h_scale + padding.x,
    bbox.y_min * v_scale + padding.y,
    bbox.x_max * h_scale + padding.x,
    bbox.y_max * v_scale + padding.y,
  )
}
