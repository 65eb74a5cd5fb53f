// 该文件是 Beifeng （北风） 项目的一部分。
// src/postprocess/nms.rs - 加权非极大值抑制
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

use std::{fmt, str::FromStr};

use tracing::{debug, trace};

use crate::{
  geometry::BBox,
  postprocess::{
    Detection, MIN_SCORE, MIN_SUPPRESSION_THRESHOLD, PostprocessError, PostprocessOptions,
  },
};

/// NMS 聚类方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NmsMode {
  /// 首轮排序后不再重排，某一轮没有任何框被归入簇时立即停止。
  #[default]
  Legacy,
  /// 每轮都把簇头移出队列并按分数重新排序，不会因退化框提前停止。
  Greedy,
}

impl FromStr for NmsMode {
  type Err = PostprocessError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "legacy" => Ok(NmsMode::Legacy),
      "greedy" => Ok(NmsMode::Greedy),
      other => Err(PostprocessError::UnknownNmsMode(other.to_string())),
    }
  }
}

impl fmt::Display for NmsMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      NmsMode::Legacy => write!(f, "legacy"),
      NmsMode::Greedy => write!(f, "greedy"),
    }
  }
}

/// 加权非极大值抑制
///
/// 与丢弃式 NMS 不同，簇内所有框按分数加权平均得到输出框，
/// 输出分数取簇头自身的分数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonMaxSuppression {
  pub overlap_threshold: f32,
  pub min_score: f32,
  pub mode: NmsMode,
}

impl Default for NonMaxSuppression {
  fn default() -> Self {
    Self {
      overlap_threshold: MIN_SUPPRESSION_THRESHOLD,
      min_score: MIN_SCORE,
      mode: NmsMode::default(),
    }
  }
}

impl From<&PostprocessOptions> for NonMaxSuppression {
  fn from(options: &PostprocessOptions) -> Self {
    Self {
      overlap_threshold: options.overlap_threshold,
      min_score: options.min_suppression_score,
      mode: options.nms_mode,
    }
  }
}

/// (检测结果下标, 分数)
type IndexedScore = (usize, f32);

fn sort_by_score_desc(scores: &mut [IndexedScore]) {
  // 稳定排序，分数相同时保持下标升序
  scores.sort_by(|a, b| b.1.total_cmp(&a.1));
}

impl NonMaxSuppression {
  pub fn with_mode(mut self, mode: NmsMode) -> Self {
    self.mode = mode;
    self
  }

  pub fn suppress(&self, detections: &[Detection]) -> Vec<Detection> {
    let mut remaining: Vec<IndexedScore> = detections
      .iter()
      .enumerate()
      .map(|(index, det)| (index, det.score))
      .collect();
    sort_by_score_desc(&mut remaining);

    let mut outputs = Vec::new();
    let mut candidate: Vec<IndexedScore> = Vec::new();
    let mut backed: Vec<IndexedScore> = Vec::new();

    while let Some(&(head_index, head_score)) = remaining.first() {
      if head_score < self.min_score {
        break;
      }

      let head = &detections[head_index];
      candidate.clear();
      backed.clear();

      for &pair in remaining.iter() {
        let similarity = detections[pair.0].bbox.iou(&head.bbox);
        if similarity > self.overlap_threshold {
          trace!("框 {} ~= 簇头 {}: {}", pair.0, head_index, similarity);
          candidate.push(pair);
        } else {
          trace!("框 {} != 簇头 {}: {}", pair.0, head_index, similarity);
          backed.push(pair);
        }
      }

      debug!(
        "簇头 {} (分数 {:.4}): 合并 {} 个, 剩余 {} 个",
        head_index,
        head_score,
        candidate.len(),
        backed.len()
      );

      outputs.push(weighted_detection(detections, head, &candidate));

      match self.mode {
        NmsMode::Legacy => {
          if backed.len() == remaining.len() {
            debug!("本轮没有框被归入簇，停止 NMS");
            break;
          }
        }
        NmsMode::Greedy => {
          backed.retain(|&(index, _)| index != head_index);
          sort_by_score_desc(&mut backed);
        }
      }

      std::mem::swap(&mut remaining, &mut backed);
    }

    outputs
  }
}

fn weighted_detection(
  detections: &[Detection],
  head: &Detection,
  candidate: &[IndexedScore],
) -> Detection {
  // 只有簇头自己（或簇为空）时原样输出
  if candidate.len() <= 1 {
    return *head;
  }

  let mut total_score = 0.0f32;
  let mut x_min = 0.0f32;
  let mut y_min = 0.0f32;
  let mut x_max = 0.0f32;
  let mut y_max = 0.0f32;

  for &(index, score) in candidate {
    let bbox = &detections[index].bbox;
    total_score += score;
    x_min += bbox.x_min * score;
    y_min += bbox.y_min * score;
    x_max += bbox.x_max * score;
    y_max += bbox.y_max * score;
  }

  Detection::new(
    BBox::new(
      x_min / total_score,
      y_min / total_score,
      x_max / total_score,
      y_max / total_score,
    ),
    head.score,
  )
}
