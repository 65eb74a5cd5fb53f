// 该文件是 Beifeng （北风） 项目的一部分。
// src/task.rs - 任务调度
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

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc,
  },
  thread,
  time::{Duration, Instant},
};

use anyhow::{Context, anyhow};
use tracing::{info, warn};

use crate::{
  model::{Model, StageTimings, WithTimings},
  output::Render,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
where
  D: WithTimings,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let result = model.infer(&frame).context("推理失败")?;
    let elapsed = now.elapsed();
    info!("推理完成，耗时: {:.2?}", elapsed);
    log_timings(&result.timings());
    output.render_result(&frame, &result).context("渲染失败")?;
    info!("渲染完成，总耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 同一帧重复推理，统计平均耗时
pub struct RepeatShotTask {
  repeat: usize,
}

/// 计入平均值之前丢弃的预热轮数
const WARMUP_ROUNDS: usize = 2;

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_repeat(mut self, repeat: usize) -> Self {
    self.repeat = repeat;
    self
  }
}

fn skip_warmup<T>(samples: &[T]) -> &[T] {
  if samples.len() > WARMUP_ROUNDS {
    &samples[WARMUP_ROUNDS..]
  } else {
    samples
  }
}

/// 去掉预热轮次后的平均耗时；轮数不足时使用全部样本
pub fn average_elapsed(times: &[Duration]) -> Option<Duration> {
  let samples = skip_warmup(times);
  let count = u32::try_from(samples.len()).ok().filter(|&n| n > 0)?;
  Some(samples.iter().sum::<Duration>() / count)
}

/// 按阶段分别求平均，预热规则同 [`average_elapsed`]
pub fn average_timings(timings: &[StageTimings]) -> Option<StageTimings> {
  let samples = skip_warmup(timings);
  let count = u32::try_from(samples.len()).ok().filter(|&n| n > 0)?;
  let sum = samples.iter().fold(StageTimings::default(), |acc, t| StageTimings {
    preprocess: acc.preprocess + t.preprocess,
    engine: acc.engine + t.engine,
    postprocess: acc.postprocess + t.postprocess,
  });
  Some(StageTimings {
    preprocess: sum.preprocess / count,
    engine: sum.engine / count,
    postprocess: sum.postprocess / count,
  })
}

/// 帧率；耗时为零时返回 0
pub fn frames_per_second(frames: usize, elapsed: Duration) -> f64 {
  let seconds = elapsed.as_secs_f64();
  if seconds > 0.0 {
    frames as f64 / seconds
  } else {
    0.0
  }
}

fn log_timings(timings: &StageTimings) {
  info!(
    "预处理 {:.2?}, 推理 {:.2?}, 后处理 {:.2?}",
    timings.preprocess, timings.engine, timings.postprocess
  );
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
where
  D: WithTimings,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.repeat);
    let mut stages = Vec::with_capacity(self.repeat);
    for i in 0..self.repeat {
      let now = Instant::now();
      let result = model.infer(&frame).context("推理失败")?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result).context("渲染失败")?;
      info!("({})渲染完成，耗时: {:.2?}", i, now.elapsed());
      times.push(elapsed);
      stages.push(result.timings());
    }

    match average_elapsed(&times) {
      Some(average) => warn!("平均推理时间: {:.2?}", average),
      None => warn!("没有执行任何推理"),
    }
    if let Some(average) = average_timings(&stages) {
      warn!(
        "平均分阶段耗时: 预处理 {:.2?}, 推理 {:.2?}, 后处理 {:.2?}",
        average.preprocess, average.engine, average.postprocess
      );
    }

    Ok(())
  }
}

/// 推理在后台线程执行，结果经通道交给当前线程渲染
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  F: Send + 'static,
  D: Send + 'static,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F> + Send + 'static,
  M: Model<Input = F, Output = D, Error = ME> + Send + 'static,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
where
  D: WithTimings,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let stop = Arc::new(AtomicBool::new(false));

    let handler_stop = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      handler_stop.store(true, Ordering::SeqCst);
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    }) {
      warn!("无法设置 Ctrl-C 处理函数: {}", e);
    }

    // 容量为 1：渲染跟不上时推理线程等待，不会堆积帧
    let (tx, rx) = mpsc::sync_channel::<Result<(F, D), ME>>(1);
    let worker_stop = stop.clone();
    let worker = thread::spawn(move || {
      for frame in input {
        if worker_stop.load(Ordering::SeqCst) {
          break;
        }
        let message = model.infer(&frame).map(|result| (frame, result));
        let failed = message.is_err();
        if tx.send(message).is_err() || failed {
          break;
        }
      }
    });

    let mut frame_index = 0usize;
    let started = Instant::now();
    let mut now = Instant::now();
    for message in rx.iter() {
      let (frame, result) = message.context("推理失败")?;
      frame_index = frame_index.wrapping_add(1);
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result).context("渲染失败")?;
      let elapsed_b = now.elapsed();
      now = Instant::now();
      let timings = result.timings();
      info!(
        "第 {} 帧处理完成，耗时: {:.2?} / {:.2?} (预处理 {:.2?}, 推理 {:.2?}, 后处理 {:.2?}), {:.1} fps",
        frame_index,
        elapsed_a,
        elapsed_b,
        timings.preprocess,
        timings.engine,
        timings.postprocess,
        frames_per_second(frame_index, started.elapsed())
      );
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if stop.load(Ordering::SeqCst) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    stop.store(true, Ordering::SeqCst);
    drop(rx);
    worker.join().map_err(|_| anyhow!("推理线程异常退出"))?;

    info!(
      "任务完成，共处理 {} 帧，平均 {:.1} fps",
      frame_index,
      frames_per_second(frame_index, started.elapsed())
    );
    Ok(())
  }
}
