// 该文件是 Beifeng （北风） 项目的一部分。
// src/main.rs - 项目主程序
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

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::info;
use url::Url;

use beifeng::{
  FromUrl,
  input::InputWrapper,
  model::{FaceDetection, ReplayEngine},
  output::OutputWrapper,
  postprocess::{INPUT_HEIGHT, INPUT_WIDTH},
  task::{ContinuousTask, OneShotTask, RepeatShotTask, Task},
};

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Mode {
  /// 只处理第一帧
  Oneshot,
  /// 对第一帧重复推理
  Repeat,
  /// 逐帧处理全部输入
  Continuous,
}

/// Beifeng 人脸检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// 模型输出回放目录，如 replay:///data/dump?score=0.5&nms=legacy
  #[arg(long, value_name = "MODEL")]
  model: Url,
  /// 输入来源，如 image:///photo.jpg 或 folder:///photos
  #[arg(long, value_name = "SOURCE")]
  input: Url,
  /// 输出路径，如 image:///out.png、folder:///records?record 或 log:
  #[arg(long, value_name = "OUTPUT")]
  output: Url,
  #[arg(long, value_enum, default_value_t = Mode::Oneshot)]
  mode: Mode,
  /// 连续模式下最多处理的帧数
  #[arg(long, value_name = "FRAME_NUMBER")]
  frame_number: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input: InputWrapper<INPUT_WIDTH, INPUT_HEIGHT> = InputWrapper::from_url(&args.input)?;
  let model: FaceDetection<ReplayEngine> = FaceDetection::from_url(&args.model)?;
  let output: OutputWrapper<INPUT_WIDTH, INPUT_HEIGHT> = OutputWrapper::from_url(&args.output)?;

  match args.mode {
    Mode::Oneshot => OneShotTask.run_task(input, model, output),
    Mode::Repeat => RepeatShotTask::default().run_task(input, model, output),
    Mode::Continuous => ContinuousTask::default()
      .with_frame_number(args.frame_number)
      .run_task(input, model, output),
  }
}
