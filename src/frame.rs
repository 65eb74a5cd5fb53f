// 该文件是 Beifeng （北风） 项目的一部分。
// src/frame.rs - letterbox 帧定义
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

use std::time::{Duration, Instant};

use image::{RgbImage, imageops};
use thiserror::Error;
use tracing::debug;

use crate::postprocess::{INPUT_HEIGHT, INPUT_WIDTH, Padding};

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("图像尺寸为零")]
  ZeroDimensions,
}

pub trait AsNhwcTensor {
  /// NHWC 排列的 f32 输入张量，取值范围 [0, 1]
  fn as_nhwc(&self) -> &[f32];
  /// 生成张量时记录的填充比例
  fn padding(&self) -> Padding;
}

/// 保持长宽比缩放并居中填充到 W x H 的帧
///
/// 同时保留原图，便于把检测结果画回原始分辨率。
#[derive(Debug, Clone)]
pub struct LetterboxFrame<const W: u32, const H: u32> {
  source: RgbImage,
  tensor: Box<[f32]>,
  padding: Padding,
  elapsed: Duration,
}

/// 短距离人脸检测模型的输入帧
pub type FaceFrame = LetterboxFrame<INPUT_WIDTH, INPUT_HEIGHT>;

impl<const W: u32, const H: u32> LetterboxFrame<W, H> {
  pub fn source(&self) -> &RgbImage {
    &self.source
  }

  pub fn into_source(self) -> RgbImage {
    self.source
  }

  /// 缩放、填充并归一化所用的时间
  pub fn preprocess_elapsed(&self) -> Duration {
    self.elapsed
  }
}

impl<const W: u32, const H: u32> AsNhwcTensor for LetterboxFrame<W, H> {
  fn as_nhwc(&self) -> &[f32] {
    &self.tensor
  }

  fn padding(&self) -> Padding {
    self.padding
  }
}

/// 计算缩放后的尺寸以及左、上方向的填充像素数
///
/// 宽图填充上下，高图填充左右；奇数余量多出的一个像素放在右/下侧。
fn letterbox_layout<const W: u32, const H: u32>(width: u32, height: u32) -> (u32, u32, u32, u32) {
  let aspect_ratio = height as f32 / width as f32;

  let (resized_w, resized_h) = if aspect_ratio > 1.0 {
    ((W as f32 / aspect_ratio) as u32, H)
  } else {
    (W, (H as f32 * aspect_ratio) as u32)
  };
  // 极端长宽比下至少保留一个像素
  let resized_w = resized_w.clamp(1, W);
  let resized_h = resized_h.clamp(1, H);

  let left = (W - resized_w) / 2;
  let top = (H - resized_h) / 2;
  (resized_w, resized_h, left, top)
}

impl<const W: u32, const H: u32> TryFrom<RgbImage> for LetterboxFrame<W, H> {
  type Error = FrameError;

  fn try_from(source: RgbImage) -> Result<Self, Self::Error> {
    let (width, height) = source.dimensions();
    if width == 0 || height == 0 {
      return Err(FrameError::ZeroDimensions);
    }
    let now = Instant::now();

    let (resized_w, resized_h, left, top) = letterbox_layout::<W, H>(width, height);
    debug!(
      "letterbox: {}x{} -> {}x{}, 填充 左 {} 上 {}",
      width, height, resized_w, resized_h, left, top
    );

    let resized = imageops::resize(&source, resized_w, resized_h, imageops::FilterType::Triangle);
    let mut padded = RgbImage::new(W, H);
    imageops::replace(&mut padded, &resized, left as i64, top as i64);

    let tensor = padded
      .as_raw()
      .iter()
      .map(|&value| value as f32 / 255.0)
      .collect::<Vec<_>>()
      .into_boxed_slice();

    let padding = Padding::new(left as f32 / W as f32, top as f32 / H as f32);
    let elapsed = now.elapsed();
    debug!("letterbox 耗时: {:.2?}", elapsed);

    Ok(Self {
      source,
      tensor,
      padding,
      elapsed,
    })
  }
}
