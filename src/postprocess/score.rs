// 该文件是 Beifeng （北风） 项目的一部分。
// src/postprocess/score.rs - 分数归一化
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

use std::ops::Deref;

use crate::postprocess::RAW_SCORE_LIMIT;

/// 模型原始分类输出 (logit)，形状 1 x N x 1
#[derive(Debug, Clone, PartialEq)]
pub struct RawScores(Box<[f32]>);

impl From<Vec<f32>> for RawScores {
  fn from(value: Vec<f32>) -> Self {
    Self(value.into_boxed_slice())
  }
}

impl From<Box<[f32]>> for RawScores {
  fn from(value: Box<[f32]>) -> Self {
    Self(value)
  }
}

impl Deref for RawScores {
  type Target = [f32];

  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

/// sigmoid 后的置信度
#[derive(Debug, Clone, PartialEq)]
pub struct Scores(Box<[f32]>);

impl Deref for Scores {
  type Target = [f32];

  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

pub fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

/// 裁剪到 [-80, 80] 后逐元素做 sigmoid
pub fn sigmoid_scores(raw: RawScores) -> Scores {
  let mut data = raw.0;
  for value in data.iter_mut() {
    *value = sigmoid(value.clamp(-RAW_SCORE_LIMIT, RAW_SCORE_LIMIT));
  }
  Scores(data)
}
