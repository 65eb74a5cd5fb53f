// 该文件是 Beifeng （北风） 项目的一部分。
// src/input/image_folder.rs - 图像目录输入
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

use std::{path::PathBuf, vec::IntoIter};

use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::LetterboxFrame,
  input::{ImageFileInputError, SourceOptions},
};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// 按文件名顺序逐张读取目录中的图像，`folder:///path/to/dir?max_size=1024`
///
/// 读取失败的文件记录错误后跳过。
pub struct ImageFolderInput<const W: u32, const H: u32> {
  paths: IntoIter<PathBuf>,
  options: SourceOptions,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for ImageFolderInput<W, H> {
  const SCHEME: &'static str = "folder";
}

impl<const W: u32, const H: u32> FromUrl for ImageFolderInput<W, H> {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageFileInputError::SchemeMismatch {
        expected: Self::SCHEME,
        actual: url.scheme().to_string(),
      });
    }

    let options = SourceOptions::from_url(url)?;

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(url.path())? {
      let path = entry?.path();
      let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
      if path.is_file() && is_image {
        paths.push(path);
      }
    }
    paths.sort();
    info!("目录 {} 中共有 {} 张图像", url.path(), paths.len());

    Ok(ImageFolderInput {
      paths: paths.into_iter(),
      options,
    })
  }
}

impl<const W: u32, const H: u32> Iterator for ImageFolderInput<W, H> {
  type Item = LetterboxFrame<W, H>;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.paths.by_ref() {
      match self.options.load(&path) {
        Ok(frame) => return Some(frame),
        Err(e) => error!("读取图像 {} 失败: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;

  #[test]
  fn iterates_images_in_name_order_and_skips_others() {
    let dir = tempfile::tempdir().unwrap();
    RgbImage::new(20, 10).save(dir.path().join("b.png")).unwrap();
    RgbImage::new(10, 20).save(dir.path().join("a.png")).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
    std::fs::write(dir.path().join("broken.jpg"), "not a jpeg").unwrap();

    let url = Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let frames: Vec<_> = ImageFolderInput::<128, 128>::from_url(&url)
      .unwrap()
      .map(|frame| frame.into_source().dimensions())
      .collect();

    assert_eq!(frames, vec![(10, 20), (20, 10)]);
  }
}
