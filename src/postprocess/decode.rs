// 该文件是 Beifeng （北风） 项目的一部分。
// src/postprocess/decode.rs - 回归值解码
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

use crate::{
  anchor::Anchors,
  postprocess::{NUM_COORDS, PostprocessError},
};

/// 模型原始回归输出，形状 1 x N x 16
///
/// 每个锚点前 4 个值依次为 (y_center, x_center, height, width)，其余为关键点。
#[derive(Debug, Clone, PartialEq)]
pub struct RawRegressions(Box<[f32]>);

impl RawRegressions {
  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl From<Vec<f32>> for RawRegressions {
  fn from(value: Vec<f32>) -> Self {
    Self(value.into_boxed_slice())
  }
}

impl From<Box<[f32]>> for RawRegressions {
  fn from(value: Box<[f32]>) -> Self {
    Self(value)
  }
}

/// 解码后的回归输出
///
/// 每个锚点前 4 个值改写为 (y_min, x_min, y_max, x_max)，关键点保持原样。
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBoxes(Box<[f32]>);

impl DecodedBoxes {
  pub fn num_anchors(&self) -> usize {
    self.0.len() / NUM_COORDS
  }

  /// 第 `index` 个锚点的 (y_min, x_min, y_max, x_max)
  pub fn corners(&self, index: usize) -> [f32; 4] {
    let offset = index * NUM_COORDS;
    [
      self.0[offset],
      self.0[offset + 1],
      self.0[offset + 2],
      self.0[offset + 3],
    ]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.0
  }
}

/// 把锚点相对的回归值解码为归一化角点坐标
///
/// 缓冲区按值传入、原地改写后以 [`DecodedBoxes`] 返回，
/// 已解码的数据在类型上无法被再次解码。
pub fn decode_boxes(
  scale: f32,
  anchors: &Anchors,
  raw: RawRegressions,
) -> Result<DecodedBoxes, PostprocessError> {
  let expected = anchors.len() * NUM_COORDS;
  if raw.len() != expected {
    return Err(PostprocessError::shape_mismatch(
      "regressors",
      expected,
      raw.len(),
    ));
  }

  let mut data = raw.0;
  for (anchor, slot) in anchors.iter().zip(data.chunks_exact_mut(NUM_COORDS)) {
    let y_center = slot[0] / scale + anchor.y;
    let x_center = slot[1] / scale + anchor.x;
    let h = slot[2] / scale;
    let w = slot[3] / scale;

    slot[0] = y_center - h / 2.0;
    slot[1] = x_center - w / 2.0;
    slot[2] = y_center + h / 2.0;
    slot[3] = x_center + w / 2.0;
  }

  Ok(DecodedBoxes(data))
}
