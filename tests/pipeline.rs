// 该文件是 Beifeng （北风） 项目的一部分。
// tests/pipeline.rs - 端到端测试
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

use image::RgbImage;
use url::Url;

use beifeng::{
  FromUrl,
  anchor::Anchors,
  frame::FaceFrame,
  geometry::BBox,
  model::{FaceDetection, Model, ReplayEngine, dump_tensors},
  postprocess::{
    INPUT_WIDTH, NUM_ANCHORS, NUM_COORDS, Padding, PostprocessOptions, RawRegressions, RawScores,
    detect, sigmoid,
  },
};

const SCALE: f32 = INPUT_WIDTH as f32;

/// 只有第 0 个锚点给出高分的模型输出，其回归值解码为 `bbox`
fn single_face_output(bbox: BBox, logit: f32) -> (Vec<f32>, Vec<f32>) {
  let anchors = Anchors::default();
  let anchor = anchors[0];

  let mut regressors = vec![0.0; NUM_ANCHORS * NUM_COORDS];
  regressors[0] = ((bbox.y_min + bbox.y_max) / 2.0 - anchor.y) * SCALE;
  regressors[1] = ((bbox.x_min + bbox.x_max) / 2.0 - anchor.x) * SCALE;
  regressors[2] = bbox.height() * SCALE;
  regressors[3] = bbox.width() * SCALE;

  let mut classificators = vec![-100.0; NUM_ANCHORS];
  classificators[0] = logit;
  (regressors, classificators)
}

fn assert_close(actual: &BBox, expected: &BBox) {
  for (a, e) in actual.to_array().iter().zip(expected.to_array()) {
    assert!((a - e).abs() < 1e-5, "{actual:?} != {expected:?}");
  }
}

#[test]
fn single_anchor_yields_single_detection() {
  let expected = BBox::new(0.2, 0.2, 0.4, 0.4);
  let (regressors, classificators) = single_face_output(expected, 2.0);

  let detections = detect(
    RawRegressions::from(regressors),
    RawScores::from(classificators),
    &Anchors::default(),
    Padding::NONE,
    &PostprocessOptions::default(),
  )
  .unwrap();

  assert_eq!(detections.len(), 1);
  assert_close(&detections[0].bbox, &expected);
  assert!((detections[0].score - 0.8808).abs() < 1e-4);
  assert_eq!(detections[0].score, sigmoid(2.0));
}

#[test]
fn replayed_dump_runs_through_model() {
  let dir = tempfile::tempdir().unwrap();
  let expected = BBox::new(0.2, 0.2, 0.4, 0.4);
  let (regressors, classificators) = single_face_output(expected, 2.0);
  dump_tensors(dir.path(), &regressors, &classificators).unwrap();

  let url = Url::parse(&format!("replay://{}?score=0.5&nms=greedy", dir.path().display())).unwrap();
  let model = FaceDetection::<ReplayEngine>::from_url(&url).unwrap();
  let frame = FaceFrame::try_from(RgbImage::new(64, 64)).unwrap();

  let result = model.infer(&frame).unwrap();
  assert_eq!(result.len(), 1);
  assert_close(&result.items[0].bbox, &expected);
}

#[test]
fn letterbox_padding_is_removed_for_wide_frames() {
  // 256x128 的图像上下各填充 1/4
  let padded = BBox::new(0.2, 0.375, 0.4, 0.625);
  let (regressors, classificators) = single_face_output(padded, 3.0);
  let engine = ReplayEngine::new(regressors, classificators).unwrap();
  let model = FaceDetection::new(engine);

  let frame = FaceFrame::try_from(RgbImage::new(256, 128)).unwrap();
  let result = model.infer(&frame).unwrap();

  assert_eq!(result.len(), 1);
  assert_close(&result.items[0].bbox, &BBox::new(0.2, 0.25, 0.4, 0.75));
}

#[test]
fn raising_the_score_threshold_drops_the_face() {
  let (regressors, classificators) = single_face_output(BBox::new(0.2, 0.2, 0.4, 0.4), 2.0);
  let engine = ReplayEngine::new(regressors, classificators).unwrap();
  let model = FaceDetection::new(engine).with_options(PostprocessOptions {
    score_threshold: 0.9,
    min_suppression_score: 0.9,
    ..PostprocessOptions::default()
  });

  let frame = FaceFrame::try_from(RgbImage::new(64, 64)).unwrap();
  assert!(model.infer(&frame).unwrap().is_empty());
}

#[cfg(feature = "save_image_file")]
#[test]
fn annotated_image_is_saved() {
  use beifeng::{
    output::{OutputWrapper, Render},
    postprocess::INPUT_HEIGHT,
  };

  let dir = tempfile::tempdir().unwrap();
  let (regressors, classificators) = single_face_output(BBox::new(0.25, 0.25, 0.5, 0.5), 2.0);
  let model = FaceDetection::new(ReplayEngine::new(regressors, classificators).unwrap());
  let frame = FaceFrame::try_from(RgbImage::new(100, 100)).unwrap();
  let result = model.infer(&frame).unwrap();

  let path = dir.path().join("faces.png");
  let url = Url::parse(&format!("image://{}", path.display())).unwrap();
  let output = OutputWrapper::<INPUT_WIDTH, INPUT_HEIGHT>::from_url(&url).unwrap();
  output.render_result(&frame, &result).unwrap();

  let saved = image::open(&path).unwrap().into_rgb8();
  assert_eq!(saved.dimensions(), (100, 100));
  assert_ne!(*saved.get_pixel(25, 40), image::Rgb([0, 0, 0]));
  assert_eq!(*saved.get_pixel(40, 40), image::Rgb([0, 0, 0]));
}
