// 该文件是 Beifeng （北风） 项目的一部分。
// src/model.rs - 模型
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

use std::time::Duration;

use crate::postprocess::Detection;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 推理后端，只负责把输入张量变成原始输出张量
pub trait InferenceEngine {
  type Error;

  fn run(&self, input: &[f32]) -> Result<RawOutput, Self::Error>;
}

/// 推理后端的两个原始输出
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
  /// NUM_ANCHORS x NUM_COORDS
  pub regressors: Vec<f32>,
  /// NUM_ANCHORS 个未经 sigmoid 的分数
  pub classificators: Vec<f32>,
}

/// 单帧各阶段耗时
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTimings {
  /// 缩放、填充、归一化
  pub preprocess: Duration,
  /// 推理后端
  pub engine: Duration,
  /// 解码、过滤、NMS、去除填充
  pub postprocess: Duration,
}

impl StageTimings {
  pub fn total(&self) -> Duration {
    self.preprocess + self.engine + self.postprocess
  }
}

/// 能报告分阶段耗时的推理结果
pub trait WithTimings {
  fn timings(&self) -> StageTimings;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
  pub timings: StageTimings,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into_boxed_slice(),
      timings: StageTimings::default(),
    }
  }
}

impl WithTimings for DetectResult {
  fn timings(&self) -> StageTimings {
    self.timings
  }
}

mod face_detection;
mod replay;

pub use self::face_detection::{FaceDetection, FaceDetectionBuilder, FaceDetectionError};
pub use self::replay::{
  CLASSIFICATORS_FILE, REGRESSORS_FILE, ReplayEngine, ReplayEngineError, dump_tensors,
};
