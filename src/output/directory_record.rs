// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::LetterboxFrame,
  model::DetectResult,
  output::{
    Render,
    draw::{Draw, Record},
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

pub enum DrawWrapper {
  /// 保存画好框的图像
  Draw(Draw),
  /// 保存原图，检测结果另存为 JSON
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result<const W: u32, const H: u32>(
    &self,
    path: &Path,
    frame: &LetterboxFrame<W, H>,
    result: &DetectResult,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        draw.draw_detection(frame, result).save(path)?;
      }
      DrawWrapper::Record(record) => {
        let image = frame.source();
        image.save(path)?;
        record.record(result, image.width(), image.height(), path)?;
      }
    };

    Ok(())
  }
}

/// 按日期分目录保存每一帧，`folder:///path/to/dir?record&always`
///
/// 默认只保存检出人脸的帧；带上 `always` 后每帧都保存。
pub struct DirectoryRecordOutput<const W: u32, const H: u32> {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: Mutex<u16>,
  always: bool,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for DirectoryRecordOutput<W, H> {
  const SCHEME: &'static str = "folder";
}

impl<const W: u32, const H: u32> FromUrl for DirectoryRecordOutput<W, H> {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let draw = if uri.query_pairs().any(|(k, _)| k == "record") {
      DrawWrapper::Record(Record)
    } else {
      DrawWrapper::Draw(Draw::default())
    };
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw,
      frame_counter: Mutex::new(0),
      always,
    })
  }
}

impl<const W: u32, const H: u32> DirectoryRecordOutput<W, H> {
  fn frame_id(&self) -> u16 {
    let mut counter = self
      .frame_counter
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    *counter = counter.wrapping_add(1);
    *counter
  }

  fn frame_path(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl<const W: u32, const H: u32> Render<LetterboxFrame<W, H>, DetectResult>
  for DirectoryRecordOutput<W, H>
{
  type Error = DirectoryRecordOutputError;

  fn render_result(
    &self,
    frame: &LetterboxFrame<W, H>,
    result: &DetectResult,
  ) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("未检测到人脸，跳过保存");
      return Ok(());
    }

    let path = self.frame_path(Utc::now())?;
    self.draw.save_result(&path, frame, result)?;
    debug!("保存帧到 {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{frame::FaceFrame, geometry::BBox, postprocess::Detection};
  use chrono::TimeZone;
  use image::RgbImage;

  fn output(dir: &Path, query: &str) -> DirectoryRecordOutput<128, 128> {
    let url = url::Url::parse(&format!("folder://{}{}", dir.display(), query)).unwrap();
    DirectoryRecordOutput::from_url(&url).unwrap()
  }

  fn saved_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(path) = stack.pop() {
      for entry in std::fs::read_dir(path).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else {
          files.push(path);
        }
      }
    }
    files.sort();
    files
  }

  fn face() -> DetectResult {
    DetectResult::from(vec![Detection::new(BBox::new(0.1, 0.1, 0.5, 0.5), 0.9)])
  }

  #[test]
  fn frame_path_is_partitioned_by_date() {
    let dir = tempfile::tempdir().unwrap();
    let output = output(dir.path(), "");
    let now = Utc.with_ymd_and_hms(2026, 3, 7, 8, 9, 10).unwrap();

    let first = output.frame_path(now).unwrap();
    let second = output.frame_path(now).unwrap();
    assert_eq!(first, dir.path().join("2026/03/07/08-09-10-0001.png"));
    assert_eq!(second, dir.path().join("2026/03/07/08-09-10-0002.png"));
  }

  #[test]
  fn skips_empty_results_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let frame = FaceFrame::try_from(RgbImage::new(32, 32)).unwrap();

    output(dir.path(), "")
      .render_result(&frame, &DetectResult::default())
      .unwrap();
    assert!(saved_files(dir.path()).is_empty());

    output(dir.path(), "?always")
      .render_result(&frame, &DetectResult::default())
      .unwrap();
    assert_eq!(saved_files(dir.path()).len(), 1);
  }

  #[test]
  fn record_mode_saves_image_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let frame = FaceFrame::try_from(RgbImage::new(32, 32)).unwrap();
    output(dir.path(), "?record")
      .render_result(&frame, &face())
      .unwrap();

    let files = saved_files(dir.path());
    let extensions: Vec<_> = files
      .iter()
      .filter_map(|p| p.extension().and_then(|e| e.to_str()))
      .collect();
    assert_eq!(extensions, vec!["json", "png"]);

    // 记录模式保存未加框的原图
    let saved = image::open(&files[1]).unwrap().into_rgb8();
    assert!(saved.pixels().all(|p| *p == image::Rgb([0, 0, 0])));
  }
}
