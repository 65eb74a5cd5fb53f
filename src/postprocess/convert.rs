// 该文件是 Beifeng （北风） 项目的一部分。
// src/postprocess/convert.rs - 构建检测结果
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
  geometry::BBox,
  postprocess::{DecodedBoxes, Detection, PostprocessError, Scores},
};

/// 按锚点顺序筛选出分数高于阈值且宽高为正的检测框
pub fn convert_to_detections(
  boxes: &DecodedBoxes,
  scores: &Scores,
  min_score: f32,
) -> Result<Vec<Detection>, PostprocessError> {
  if boxes.num_anchors() != scores.len() {
    return Err(PostprocessError::shape_mismatch(
      "classificators",
      boxes.num_anchors(),
      scores.len(),
    ));
  }

  let detections = scores
    .iter()
    .enumerate()
    .filter(|&(_, &score)| score > min_score)
    .filter_map(|(index, &score)| {
      let [y_min, x_min, y_max, x_max] = boxes.corners(index);
      (y_max > y_min && x_max > x_min)
        .then(|| Detection::new(BBox::new(x_min, y_min, x_max, y_max), score))
    })
    .collect();

  Ok(detections)
}
