// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use std::convert::Infallible;

use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, frame::LetterboxFrame, model::DetectResult, output::Render,
};

/// 只把检测结果写进日志，`log:`
#[derive(Debug, Default)]
pub struct LogOutput<const W: u32, const H: u32>;

impl<const W: u32, const H: u32> FromUrlWithScheme for LogOutput<W, H> {
  const SCHEME: &'static str = "log";
}

impl<const W: u32, const H: u32> FromUrl for LogOutput<W, H> {
  type Error = Infallible;

  fn from_url(_url: &Url) -> Result<Self, Self::Error> {
    Ok(LogOutput)
  }
}

impl<const W: u32, const H: u32> Render<LetterboxFrame<W, H>, DetectResult> for LogOutput<W, H> {
  type Error = Infallible;

  fn render_result(
    &self,
    frame: &LetterboxFrame<W, H>,
    result: &DetectResult,
  ) -> Result<(), Self::Error> {
    let (width, height) = frame.source().dimensions();
    info!("检测到 {} 张人脸 ({}x{})", result.len(), width, height);
    for (i, detection) in result.iter().enumerate() {
      let bbox = detection.bbox.scale(width as f32, height as f32);
      info!(
        "  [{}] {:.3} at ({:.0}, {:.0}, {:.0}x{:.0})",
        i,
        detection.score,
        bbox.x_min,
        bbox.y_min,
        bbox.width(),
        bbox.height()
      );
    }
    Ok(())
  }
}
