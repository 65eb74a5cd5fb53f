// 该文件是 Beifeng （北风） 项目的一部分。
// src/output.rs - 输出定义
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::LetterboxFrame, model::DetectResult};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

#[cfg(any(feature = "save_image_file", feature = "directory_record"))]
pub mod draw;

mod log_output;
pub use self::log_output::LogOutput;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper<const W: u32, const H: u32> {
  LogOutput(LogOutput<W, H>),
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput<W, H>),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput<W, H>),
}

impl<const W: u32, const H: u32> FromUrl for OutputWrapper<W, H> {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let scheme = url.scheme();
    if scheme == LogOutput::<W, H>::SCHEME {
      let Ok(output) = LogOutput::from_url(url);
      return Ok(OutputWrapper::LogOutput(output));
    }
    #[cfg(feature = "save_image_file")]
    if scheme == SaveImageFileOutput::<W, H>::SCHEME {
      let output = SaveImageFileOutput::from_url(url)?;
      return Ok(OutputWrapper::SaveImageFileOutput(output));
    }
    #[cfg(feature = "directory_record")]
    if scheme == DirectoryRecordOutput::<W, H>::SCHEME {
      let output = DirectoryRecordOutput::from_url(url)?;
      return Ok(OutputWrapper::DirectoryRecordOutput(output));
    }
    Err(OutputError::SchemeMismatch(scheme.to_string()))
  }
}

impl<const W: u32, const H: u32> Render<LetterboxFrame<W, H>, DetectResult>
  for OutputWrapper<W, H>
{
  type Error = OutputError;

  fn render_result(
    &self,
    frame: &LetterboxFrame<W, H>,
    result: &DetectResult,
  ) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::LogOutput(output) => {
        let Ok(()) = output.render_result(frame, result);
        Ok(())
      }
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}
