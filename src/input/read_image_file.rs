// 该文件是 Beifeng （北风） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::{path::Path, time::Instant};

use image::{ImageReader, RgbImage, imageops};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{FrameError, LetterboxFrame},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch {
    expected: &'static str,
    actual: String,
  },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("帧错误: {0}")]
  FrameError(#[from] FrameError),
  #[error("无效的参数 {key}={value}")]
  InvalidOption { key: String, value: String },
}

/// 送入 letterbox 之前对原图的处理
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SourceOptions {
  /// 长边超过该值时等比缩小
  pub max_size: Option<u32>,
  /// 顺时针旋转 90 度（竖拍照片）
  pub rotate: bool,
}

/// 默认长边上限
pub const DEFAULT_MAX_SIZE: u32 = 1024;

impl SourceOptions {
  pub fn from_url(url: &Url) -> Result<Self, ImageFileInputError> {
    let mut options = SourceOptions {
      max_size: Some(DEFAULT_MAX_SIZE),
      rotate: false,
    };

    for (key, value) in url.query_pairs() {
      let invalid = || ImageFileInputError::InvalidOption {
        key: key.to_string(),
        value: value.to_string(),
      };
      match key.as_ref() {
        "max_size" => {
          let size: u32 = value.parse().map_err(|_| invalid())?;
          options.max_size = (size > 0).then_some(size);
        }
        "rotate" => match value.as_ref() {
          "90" => options.rotate = true,
          "0" => options.rotate = false,
          _ => return Err(invalid()),
        },
        _ => debug!("忽略未知参数: {}={}", key, value),
      }
    }

    Ok(options)
  }

  /// 按长边上限缩放并可选旋转
  pub fn prepare(&self, image: RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let size = width.max(height);

    let image = match self.max_size {
      Some(max_size) if size > max_size => {
        let scale = max_size as f32 / size as f32;
        let new_w = ((width as f32 * scale) as u32).max(1);
        let new_h = ((height as f32 * scale) as u32).max(1);
        debug!("缩放原图: {}x{} -> {}x{}", width, height, new_w, new_h);
        imageops::resize(&image, new_w, new_h, imageops::FilterType::Triangle)
      }
      _ => image,
    };

    if self.rotate {
      imageops::rotate90(&image)
    } else {
      image
    }
  }

  pub fn load<const W: u32, const H: u32>(
    &self,
    path: &Path,
  ) -> Result<LetterboxFrame<W, H>, ImageFileInputError> {
    let now = Instant::now();
    let image = ImageReader::open(path)?.decode()?.into_rgb8();
    let decoded = now.elapsed();
    let image = self.prepare(image);
    let prepared = now.elapsed();
    let frame = LetterboxFrame::try_from(image)?;
    debug!(
      "构建帧完成: 解码 {:.2?}, 缩放/旋转 {:.2?}, letterbox {:.2?}, 合计 {:.2?}",
      decoded,
      prepared - decoded,
      frame.preprocess_elapsed(),
      now.elapsed()
    );
    Ok(frame)
  }
}

/// 单张图像输入，`image:///path/to/photo.jpg?max_size=1024&rotate=90`
pub struct ImageFileInput<const W: u32, const H: u32> {
  frame: Option<LetterboxFrame<W, H>>,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for ImageFileInput<W, H> {
  const SCHEME: &'static str = "image";
}

impl<const W: u32, const H: u32> FromUrl for ImageFileInput<W, H> {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch {
        expected: Self::SCHEME,
        actual: url.scheme().to_string(),
      });
    }

    let options = SourceOptions::from_url(url)?;
    let frame = options.load(Path::new(url.path()))?;

    Ok(ImageFileInput { frame: Some(frame) })
  }
}

impl<const W: u32, const H: u32> From<LetterboxFrame<W, H>> for ImageFileInput<W, H> {
  fn from(frame: LetterboxFrame<W, H>) -> Self {
    Self { frame: Some(frame) }
  }
}

impl<const W: u32, const H: u32> Iterator for ImageFileInput<W, H> {
  type Item = LetterboxFrame<W, H>;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}
