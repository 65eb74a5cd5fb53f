// 该文件是 Beifeng （北风） 项目的一部分。
// src/anchor.rs - SSD 锚点生成
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

use std::{num::NonZeroU32, ops::Deref, sync::Arc};

use tracing::debug;

use crate::geometry::Point2D;

/// SSD 锚点参数
///
/// 这里只保留短距离人脸检测模型用得到的字段，锚点的宽高在该模型中固定为 1，
/// 因此只需要中心点。
#[derive(Debug, Clone, PartialEq)]
pub struct SsdAnchorOptions {
  pub input_size_height: u32,
  pub input_size_width: u32,
  pub anchor_offset_x: f32,
  pub anchor_offset_y: f32,
  /// 每层的步长，层数即为该列表长度
  pub strides: Vec<NonZeroU32>,
  pub interpolated_scale_aspect_ratio: f32,
}

const fn stride(value: u32) -> NonZeroU32 {
  match NonZeroU32::new(value) {
    Some(stride) => stride,
    None => panic!("步长必须大于 0"),
  }
}

const SHORT_RANGE_STRIDES: [NonZeroU32; 4] = [stride(8), stride(16), stride(16), stride(16)];

impl SsdAnchorOptions {
  /// mediapipe/modules/face_detection/face_detection_short_range.pbtxt
  pub fn short_range() -> Self {
    Self {
      input_size_height: 128,
      input_size_width: 128,
      anchor_offset_x: 0.5,
      anchor_offset_y: 0.5,
      strides: SHORT_RANGE_STRIDES.to_vec(),
      interpolated_scale_aspect_ratio: 1.0,
    }
  }

  pub fn num_layers(&self) -> usize {
    self.strides.len()
  }

  fn repeats_per_layer(&self) -> usize {
    // 插值尺度比例为 1.0 时每层两个锚点，否则一个
    if self.interpolated_scale_aspect_ratio == 1.0 {
      2
    } else {
      1
    }
  }
}

impl Default for SsdAnchorOptions {
  fn default() -> Self {
    Self::short_range()
  }
}

/// 按模型输出顺序排列的锚点中心列表
///
/// 内部为 `Arc<[Point2D]>`，克隆代价很低，可在多个推理之间只读共享。
#[derive(Debug, Clone, PartialEq)]
pub struct Anchors(Arc<[Point2D]>);

impl Anchors {
  /// 生成锚点
  ///
  /// 连续步长相同的层合并为一组，每组内按行优先遍历特征图，
  /// 每个位置重复 `组内层数 × 每层锚点数` 次。输出顺序必须与模型展平顺序一致。
  pub fn generate(options: &SsdAnchorOptions) -> Self {
    let num_layers = options.num_layers();
    let repeats_per_layer = options.repeats_per_layer();
    let mut anchors = Vec::new();

    let mut layer_id = 0;
    while layer_id < num_layers {
      let stride = options.strides[layer_id];

      let mut last_same_stride_layer = layer_id;
      let mut repeats = 0;
      while last_same_stride_layer < num_layers && options.strides[last_same_stride_layer] == stride
      {
        last_same_stride_layer += 1;
        repeats += repeats_per_layer;
      }

      let feature_map_height = options.input_size_height / stride;
      let feature_map_width = options.input_size_width / stride;

      for y in 0..feature_map_height {
        let y_center = (y as f32 + options.anchor_offset_y) / feature_map_height as f32;
        for x in 0..feature_map_width {
          let x_center = (x as f32 + options.anchor_offset_x) / feature_map_width as f32;
          for _ in 0..repeats {
            anchors.push(Point2D::new(x_center, y_center));
          }
        }
      }

      debug!(
        "锚点层 {}..{}: 步长 {}, 特征图 {}x{}, 每位置重复 {} 次",
        layer_id, last_same_stride_layer, stride, feature_map_width, feature_map_height, repeats
      );

      layer_id = last_same_stride_layer;
    }

    debug!("共生成 {} 个锚点", anchors.len());
    Self(anchors.into())
  }
}

impl Default for Anchors {
  fn default() -> Self {
    Self::generate(&SsdAnchorOptions::short_range())
  }
}

impl Deref for Anchors {
  type Target = [Point2D];

  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

impl From<Vec<Point2D>> for Anchors {
  fn from(value: Vec<Point2D>) -> Self {
    Self(value.into())
  }
}
