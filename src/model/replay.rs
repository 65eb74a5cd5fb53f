// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/replay.rs - 回放推理后端
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

use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  model::{InferenceEngine, RawOutput},
  postprocess::{INPUT_HEIGHT, INPUT_WIDTH, NUM_ANCHORS, NUM_COORDS},
};

pub const REGRESSORS_FILE: &str = "regressors.bin";
pub const CLASSIFICATORS_FILE: &str = "classificators.bin";

const F32_BYTES: usize = std::mem::size_of::<f32>();
const INPUT_LEN: usize = (INPUT_WIDTH * INPUT_HEIGHT * 3) as usize;

#[derive(Error, Debug)]
pub enum ReplayEngineError {
  #[error("I/O 错误 {path}: {source}")]
  IoError {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("文件 {path} 大小 {len} 不是 4 字节的整数倍")]
  Truncated { path: PathBuf, len: usize },
  #[error("{name} 张量大小不匹配: 期望 {expected}, 实际 {actual}")]
  TensorSize {
    name: &'static str,
    expected: usize,
    actual: usize,
  },
  #[error("输入张量大小不匹配: 期望 {expected}, 实际 {actual}")]
  InputSize { expected: usize, actual: usize },
}

/// 回放事先导出的模型输出
///
/// 目录中需包含 `regressors.bin`（896x16）与 `classificators.bin`（896），
/// 均为小端 f32。每次 `run` 都返回一份新的拷贝。
#[derive(Debug, Clone)]
pub struct ReplayEngine {
  regressors: Box<[f32]>,
  classificators: Box<[f32]>,
}

fn read_tensor(path: &Path) -> Result<Vec<f32>, ReplayEngineError> {
  let bytes = std::fs::read(path).map_err(|source| ReplayEngineError::IoError {
    path: path.to_path_buf(),
    source,
  })?;
  if bytes.len() % F32_BYTES != 0 {
    error!("张量文件 {} 长度异常: {}", path.display(), bytes.len());
    return Err(ReplayEngineError::Truncated {
      path: path.to_path_buf(),
      len: bytes.len(),
    });
  }

  Ok(
    bytes
      .chunks_exact(F32_BYTES)
      .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
      .collect(),
  )
}

fn write_tensor(path: &Path, tensor: &[f32]) -> Result<(), ReplayEngineError> {
  let bytes: Vec<u8> = tensor.iter().flat_map(|v| v.to_le_bytes()).collect();
  std::fs::write(path, bytes).map_err(|source| ReplayEngineError::IoError {
    path: path.to_path_buf(),
    source,
  })
}

/// 按回放目录的格式导出一组模型输出
pub fn dump_tensors(
  directory: &Path,
  regressors: &[f32],
  classificators: &[f32],
) -> Result<(), ReplayEngineError> {
  std::fs::create_dir_all(directory).map_err(|source| ReplayEngineError::IoError {
    path: directory.to_path_buf(),
    source,
  })?;
  write_tensor(&directory.join(REGRESSORS_FILE), regressors)?;
  write_tensor(&directory.join(CLASSIFICATORS_FILE), classificators)
}

impl ReplayEngine {
  pub fn new(regressors: Vec<f32>, classificators: Vec<f32>) -> Result<Self, ReplayEngineError> {
    let expected = NUM_ANCHORS * NUM_COORDS;
    if regressors.len() != expected {
      return Err(ReplayEngineError::TensorSize {
        name: "regressors",
        expected,
        actual: regressors.len(),
      });
    }
    if classificators.len() != NUM_ANCHORS {
      return Err(ReplayEngineError::TensorSize {
        name: "classificators",
        expected: NUM_ANCHORS,
        actual: classificators.len(),
      });
    }

    Ok(Self {
      regressors: regressors.into_boxed_slice(),
      classificators: classificators.into_boxed_slice(),
    })
  }

  pub fn open(directory: &Path) -> Result<Self, ReplayEngineError> {
    info!("加载回放张量: {}", directory.display());
    let regressors = read_tensor(&directory.join(REGRESSORS_FILE))?;
    let classificators = read_tensor(&directory.join(CLASSIFICATORS_FILE))?;
    debug!(
      "回放张量大小: regressors {}, classificators {}",
      regressors.len(),
      classificators.len()
    );
    Self::new(regressors, classificators)
  }
}

impl InferenceEngine for ReplayEngine {
  type Error = ReplayEngineError;

  fn run(&self, input: &[f32]) -> Result<RawOutput, Self::Error> {
    if input.len() != INPUT_LEN {
      return Err(ReplayEngineError::InputSize {
        expected: INPUT_LEN,
        actual: input.len(),
      });
    }

    Ok(RawOutput {
      regressors: self.regressors.to_vec(),
      classificators: self.classificators.to_vec(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tensors() -> (Vec<f32>, Vec<f32>) {
    let regressors = (0..NUM_ANCHORS * NUM_COORDS)
      .map(|i| i as f32 * 0.5)
      .collect();
    let classificators = (0..NUM_ANCHORS).map(|i| -(i as f32)).collect();
    (regressors, classificators)
  }

  #[test]
  fn dumped_tensors_replay_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let (regressors, classificators) = tensors();
    dump_tensors(dir.path(), &regressors, &classificators).unwrap();

    let engine = ReplayEngine::open(dir.path()).unwrap();
    let output = engine.run(&vec![0.0; INPUT_LEN]).unwrap();
    assert_eq!(output.regressors, regressors);
    assert_eq!(output.classificators, classificators);
  }

  #[test]
  fn wrong_tensor_sizes_are_rejected() {
    let (regressors, _) = tensors();
    assert!(matches!(
      ReplayEngine::new(regressors, vec![0.0; 10]),
      Err(ReplayEngineError::TensorSize {
        name: "classificators",
        expected: 896,
        actual: 10
      })
    ));
    assert!(matches!(
      ReplayEngine::new(vec![0.0; 16], vec![0.0; NUM_ANCHORS]),
      Err(ReplayEngineError::TensorSize {
        name: "regressors",
        ..
      })
    ));
  }

  #[test]
  fn truncated_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (regressors, classificators) = tensors();
    dump_tensors(dir.path(), &regressors, &classificators).unwrap();
    std::fs::write(dir.path().join(CLASSIFICATORS_FILE), [0u8; 7]).unwrap();

    assert!(matches!(
      ReplayEngine::open(dir.path()),
      Err(ReplayEngineError::Truncated { len: 7, .. })
    ));
  }

  #[test]
  fn missing_directory_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      ReplayEngine::open(&dir.path().join("missing")),
      Err(ReplayEngineError::IoError { .. })
    ));
  }

  #[test]
  fn input_size_is_checked() {
    let (regressors, classificators) = tensors();
    let engine = ReplayEngine::new(regressors, classificators).unwrap();
    assert!(matches!(
      engine.run(&[0.0; 3]),
      Err(ReplayEngineError::InputSize { actual: 3, .. })
    ));
  }
}
