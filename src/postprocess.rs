// 该文件是 Beifeng （北风） 项目的一部分。
// src/postprocess.rs - 模型输出后处理
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

//! 人脸检测模型的后处理流水线：
//! 解码 → 分数归一化 → 过滤 → 加权 NMS → 去除 letterbox 填充。

use thiserror::Error;
use tracing::debug;

use crate::{anchor::Anchors, geometry::BBox};

mod convert;
mod decode;
mod letterbox;
mod nms;
mod score;

pub use self::convert::convert_to_detections;
pub use self::decode::{DecodedBoxes, RawRegressions, decode_boxes};
pub use self::letterbox::{Padding, apply_letterbox, remove_letterbox};
pub use self::nms::{NmsMode, NonMaxSuppression};
pub use self::score::{RawScores, Scores, sigmoid, sigmoid_scores};

/// 模型输入宽度，同时也是回归值的缩放系数
pub const INPUT_WIDTH: u32 = 128;
/// 模型输入高度
pub const INPUT_HEIGHT: u32 = 128;
/// 锚点数量 (16x16x2 + 8x8x6)
pub const NUM_ANCHORS: usize = 896;
/// 每个锚点的回归值数量：4 个框参数 + 6 个关键点 x 2
pub const NUM_COORDS: usize = 16;
/// 原始分数裁剪上限，避免 sigmoid 中 exp 溢出
pub const RAW_SCORE_LIMIT: f32 = 80.0;
/// 分数阈值
pub const MIN_SCORE: f32 = 0.5;
/// NMS 相似度阈值
pub const MIN_SUPPRESSION_THRESHOLD: f32 = 0.3;

/// 单个检测结果，坐标为归一化坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  pub bbox: BBox,
  pub score: f32,
}

impl Detection {
  pub fn new(bbox: BBox, score: f32) -> Self {
    Self { bbox, score }
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PostprocessError {
  #[error("{name} 张量大小不匹配: 期望 {expected}, 实际 {actual}")]
  ShapeMismatch {
    name: &'static str,
    expected: usize,
    actual: usize,
  },
  #[error("未知的 NMS 模式: {0}")]
  UnknownNmsMode(String),
}

impl PostprocessError {
  pub(crate) fn shape_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
    PostprocessError::ShapeMismatch {
      name,
      expected,
      actual,
    }
  }
}

/// 后处理参数
#[derive(Debug, Clone, PartialEq)]
pub struct PostprocessOptions {
  /// 回归值缩放系数（模型输入宽度）
  pub scale: f32,
  /// 构建检测结果时的分数阈值（严格大于才保留）
  pub score_threshold: f32,
  /// NMS 中视为同一簇的 IoU 阈值（严格大于）
  pub overlap_threshold: f32,
  /// NMS 停止处理的最低分数
  pub min_suppression_score: f32,
  pub nms_mode: NmsMode,
}

impl Default for PostprocessOptions {
  fn default() -> Self {
    Self {
      scale: INPUT_WIDTH as f32,
      score_threshold: MIN_SCORE,
      overlap_threshold: MIN_SUPPRESSION_THRESHOLD,
      min_suppression_score: MIN_SCORE,
      nms_mode: NmsMode::default(),
    }
  }
}

/// 完整后处理流水线
///
/// 输入缓冲区按值传入并在内部被改写，因此每次推理都必须使用独立的缓冲区。
/// 返回的检测框位于去除填充后的归一化坐标系，调用方可用 [`BBox::scale`]
/// 映射到像素坐标。
pub fn detect(
  regressors: RawRegressions,
  scores: RawScores,
  anchors: &Anchors,
  padding: Padding,
  options: &PostprocessOptions,
) -> Result<Vec<Detection>, PostprocessError> {
  if scores.len() != anchors.len() {
    return Err(PostprocessError::shape_mismatch(
      "classificators",
      anchors.len(),
      scores.len(),
    ));
  }

  let boxes = decode_boxes(options.scale, anchors, regressors)?;
  let scores = sigmoid_scores(scores);

  let detections = convert_to_detections(&boxes, &scores, options.score_threshold)?;
  debug!("阈值过滤后剩余 {} 个候选框", detections.len());

  let suppressed = NonMaxSuppression::from(options).suppress(&detections);
  debug!("NMS 后剩余 {} 个检测结果", suppressed.len());

  Ok(remove_letterbox(&suppressed, padding))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn empty_buffers(anchors: &Anchors) -> (Vec<f32>, Vec<f32>) {
    (
      vec![0.0; anchors.len() * NUM_COORDS],
      vec![-100.0; anchors.len()],
    )
  }

  #[test]
  fn rejects_short_score_buffer() {
    let anchors = Anchors::default();
    let (regressors, _) = empty_buffers(&anchors);
    let err = detect(
      regressors.into(),
      vec![0.0; NUM_ANCHORS - 1].into(),
      &anchors,
      Padding::NONE,
      &PostprocessOptions::default(),
    )
    .unwrap_err();

    assert_eq!(
      err,
      PostprocessError::shape_mismatch("classificators", NUM_ANCHORS, NUM_ANCHORS - 1)
    );
  }

  #[test]
  fn rejects_short_regression_buffer() {
    let anchors = Anchors::default();
    let (_, scores) = empty_buffers(&anchors);
    let err = detect(
      vec![0.0; 10].into(),
      scores.into(),
      &anchors,
      Padding::NONE,
      &PostprocessOptions::default(),
    )
    .unwrap_err();

    assert_eq!(
      err,
      PostprocessError::shape_mismatch("regressors", NUM_ANCHORS * NUM_COORDS, 10)
    );
  }

  #[test]
  fn nothing_above_threshold_gives_no_detections() {
    let anchors = Anchors::default();
    let (regressors, scores) = empty_buffers(&anchors);
    let detections = detect(
      regressors.into(),
      scores.into(),
      &anchors,
      Padding::NONE,
      &PostprocessOptions::default(),
    )
    .unwrap();
    assert!(detections.is_empty());
  }

  #[test]
  fn overlapping_anchors_merge_and_padding_is_removed() {
    let anchors = Anchors::default();
    let (mut regressors, mut scores) = empty_buffers(&anchors);

    // 锚点 0 和 1 的中心相同 (1/32, 1/32)，给出同样大小的框
    for i in 0..2 {
      let offset = i * NUM_COORDS;
      regressors[offset + 2] = 12.8; // 高 0.1
      regressors[offset + 3] = 12.8; // 宽 0.1
    }
    scores[0] = 1.0;
    scores[1] = 3.0;

    let padding = Padding::new(0.25, 0.0);
    let detections = detect(
      regressors.into(),
      scores.into(),
      &anchors,
      padding,
      &PostprocessOptions::default(),
    )
    .unwrap();

    assert_eq!(detections.len(), 1);
    let det = detections[0];
    assert!((det.score - sigmoid(3.0)).abs() < 1e-6);

    let center = 0.03125;
    let expected_x_min = (center - 0.05 - 0.25) / 0.5;
    let expected_x_max = (center + 0.05 - 0.25) / 0.5;
    assert!((det.bbox.x_min - expected_x_min).abs() < 1e-5);
    assert!((det.bbox.x_max - expected_x_max).abs() < 1e-5);
    assert!((det.bbox.y_min - (center - 0.05)).abs() < 1e-5);
    assert!((det.bbox.y_max - (center + 0.05)).abs() < 1e-5);
  }
}
