// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/face_detection.rs - 短距离人脸检测模型
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

use std::{path::PathBuf, time::Instant};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  anchor::Anchors,
  frame::{AsNhwcTensor, FaceFrame},
  model::{
    DetectResult, InferenceEngine, Model, ReplayEngine, ReplayEngineError, StageTimings,
  },
  postprocess::{self, PostprocessError, PostprocessOptions, RawRegressions, RawScores},
};

#[derive(Error, Debug)]
pub enum FaceDetectionError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch {
    expected: &'static str,
    actual: String,
  },
  #[error("无效的参数 {key}={value}")]
  InvalidOption { key: String, value: String },
  #[error("回放后端错误: {0}")]
  ReplayEngineError(#[from] ReplayEngineError),
  #[error("推理后端错误: {0}")]
  EngineError(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("后处理错误: {0}")]
  PostprocessError(#[from] PostprocessError),
}

/// 人脸检测：推理后端 + 锚点解码 + 加权 NMS
pub struct FaceDetection<E> {
  engine: E,
  anchors: Anchors,
  options: PostprocessOptions,
}

impl<E> FaceDetection<E> {
  pub fn new(engine: E) -> Self {
    Self {
      engine,
      anchors: Anchors::default(),
      options: PostprocessOptions::default(),
    }
  }

  pub fn with_options(mut self, options: PostprocessOptions) -> Self {
    self.options = options;
    self
  }
}

impl<E> Model for FaceDetection<E>
where
  E: InferenceEngine,
  E::Error: std::error::Error + Send + Sync + 'static,
{
  type Input = FaceFrame;
  type Output = DetectResult;
  type Error = FaceDetectionError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("执行模型推理");
    let now = Instant::now();
    let output = self
      .engine
      .run(input.as_nhwc())
      .map_err(|e| FaceDetectionError::EngineError(Box::new(e)))?;
    let engine = now.elapsed();

    let now = Instant::now();
    let detections = postprocess::detect(
      RawRegressions::from(output.regressors),
      RawScores::from(output.classificators),
      &self.anchors,
      input.padding(),
      &self.options,
    )?;
    let postprocess = now.elapsed();
    debug!(
      "检测到 {} 张人脸, 推理 {:.2?}, 后处理 {:.2?}",
      detections.len(),
      engine,
      postprocess
    );

    Ok(DetectResult {
      items: detections.into_boxed_slice(),
      timings: StageTimings {
        preprocess: input.preprocess_elapsed(),
        engine,
        postprocess,
      },
    })
  }
}

/// `replay:///path/to/dump?score=0.5&overlap=0.3&nms=legacy`
pub struct FaceDetectionBuilder {
  directory: PathBuf,
  options: PostprocessOptions,
}

impl FromUrlWithScheme for FaceDetectionBuilder {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for FaceDetectionBuilder {
  type Error = FaceDetectionError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(FaceDetectionError::SchemeMismatch {
        expected: Self::SCHEME,
        actual: url.scheme().to_string(),
      });
    }

    let mut options = PostprocessOptions::default();
    for (key, value) in url.query_pairs() {
      let invalid = || FaceDetectionError::InvalidOption {
        key: key.to_string(),
        value: value.to_string(),
      };
      match key.as_ref() {
        "score" => {
          let score: f32 = value.parse().map_err(|_| invalid())?;
          options.score_threshold = score;
          options.min_suppression_score = score;
        }
        "overlap" => options.overlap_threshold = value.parse().map_err(|_| invalid())?,
        "nms" => options.nms_mode = value.parse().map_err(|_| invalid())?,
        _ => debug!("忽略未知参数: {}={}", key, value),
      }
    }

    Ok(FaceDetectionBuilder {
      directory: PathBuf::from(url.path()),
      options,
    })
  }
}

impl FaceDetectionBuilder {
  pub fn build(self) -> Result<FaceDetection<ReplayEngine>, FaceDetectionError> {
    let engine = ReplayEngine::open(&self.directory)?;
    info!(
      "模型加载完成, 分数阈值 {}, 重叠阈值 {}, NMS {}",
      self.options.score_threshold, self.options.overlap_threshold, self.options.nms_mode
    );
    Ok(FaceDetection::new(engine).with_options(self.options))
  }
}

impl FromUrl for FaceDetection<ReplayEngine> {
  type Error = FaceDetectionError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    FaceDetectionBuilder::from_url(url)?.build()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    model::RawOutput,
    postprocess::{NUM_ANCHORS, NUM_COORDS, NmsMode},
  };
  use image::RgbImage;
  use std::time::Duration;

  struct FixedEngine(RawOutput);

  impl InferenceEngine for FixedEngine {
    type Error = std::io::Error;

    fn run(&self, _input: &[f32]) -> Result<RawOutput, Self::Error> {
      Ok(self.0.clone())
    }
  }

  struct FailingEngine;

  impl InferenceEngine for FailingEngine {
    type Error = std::io::Error;

    fn run(&self, _input: &[f32]) -> Result<RawOutput, Self::Error> {
      Err(std::io::Error::other("设备不可用"))
    }
  }

  /// 模拟耗时固定的推理后端
  struct SlowEngine(Duration);

  impl InferenceEngine for SlowEngine {
    type Error = std::io::Error;

    fn run(&self, _input: &[f32]) -> Result<RawOutput, Self::Error> {
      std::thread::sleep(self.0);
      Ok(silent_output())
    }
  }

  fn silent_output() -> RawOutput {
    RawOutput {
      regressors: vec![0.0; NUM_ANCHORS * NUM_COORDS],
      classificators: vec![-100.0; NUM_ANCHORS],
    }
  }

  #[test]
  fn options_from_query() {
    let url = Url::parse("replay:///tmp/dump?score=0.7&overlap=0.4&nms=greedy").unwrap();
    let builder = FaceDetectionBuilder::from_url(&url).unwrap();
    assert_eq!(builder.directory, PathBuf::from("/tmp/dump"));
    assert_eq!(builder.options.score_threshold, 0.7);
    assert_eq!(builder.options.min_suppression_score, 0.7);
    assert_eq!(builder.options.overlap_threshold, 0.4);
    assert_eq!(builder.options.nms_mode, NmsMode::Greedy);
  }

  #[test]
  fn bad_query_and_scheme_are_rejected() {
    let url = Url::parse("replay:///tmp/dump?nms=fast").unwrap();
    assert!(matches!(
      FaceDetectionBuilder::from_url(&url),
      Err(FaceDetectionError::InvalidOption { .. })
    ));
    let url = Url::parse("yolo26:///tmp/model.rknn").unwrap();
    assert!(matches!(
      FaceDetectionBuilder::from_url(&url),
      Err(FaceDetectionError::SchemeMismatch { .. })
    ));
  }

  #[test]
  fn no_faces_in_silent_output() {
    let model = FaceDetection::new(FixedEngine(silent_output()));
    let frame = FaceFrame::try_from(RgbImage::new(64, 64)).unwrap();
    assert!(model.infer(&frame).unwrap().is_empty());
  }

  #[test]
  fn engine_errors_are_wrapped() {
    let model = FaceDetection::new(FailingEngine);
    let frame = FaceFrame::try_from(RgbImage::new(64, 64)).unwrap();
    assert!(matches!(
      model.infer(&frame),
      Err(FaceDetectionError::EngineError(_))
    ));
  }

  #[test]
  fn short_output_is_a_postprocess_error() {
    let mut output = silent_output();
    output.classificators.truncate(100);
    let model = FaceDetection::new(FixedEngine(output));
    let frame = FaceFrame::try_from(RgbImage::new(64, 64)).unwrap();
    assert!(matches!(
      model.infer(&frame),
      Err(FaceDetectionError::PostprocessError(
        PostprocessError::ShapeMismatch { .. }
      ))
    ));
  }

  #[test]
  fn engine_and_postprocess_are_timed_separately() {
    let delay = Duration::from_millis(50);
    let model = FaceDetection::new(SlowEngine(delay));
    let frame = FaceFrame::try_from(RgbImage::new(64, 64)).unwrap();

    let result = model.infer(&frame).unwrap();
    let timings = result.timings;
    assert!(timings.engine >= delay);
    assert!(timings.postprocess < delay);
    assert_eq!(timings.preprocess, frame.preprocess_elapsed());
    assert_eq!(
      timings.total(),
      timings.preprocess + timings.engine + timings.postprocess
    );
  }
}
