// 该文件是 Tanbi （探鼻） 项目的一部分。
// src/model.rs - 模型
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

use ndarray::{Array3, ArrayD, Ix3};
use tracing::{debug, info, warn};

use crate::normalizer::InputTensor;

/// 姿态模型。推理句柄不保证可重入，因此 `infer` 需要独占访问。
pub trait Model {
  type Error: std::error::Error;

  fn infer(&mut self, input: InputTensor) -> Result<OutputTensor, Self::Error>;
}

/// 模型原始输出，形状 [1, attribute, anchor]
///
/// attribute 0-3 为检测框，4 为目标置信度，5、6 为鼻尖 x、y（模型像素坐标），
/// 其后为其余关键点。
#[derive(Debug, Clone)]
pub struct OutputTensor {
  data: Array3<f32>,
}

impl OutputTensor {
  pub fn new(data: Array3<f32>) -> Self {
    Self { data }
  }

  /// 只检查维度数量
  pub fn from_dyn(data: ArrayD<f32>) -> Option<Self> {
    data.into_dimensionality::<Ix3>().ok().map(Self::new)
  }

  pub fn batch(&self) -> usize {
    self.data.shape()[0]
  }

  pub fn attributes(&self) -> usize {
    self.data.shape()[1]
  }

  pub fn anchors(&self) -> usize {
    self.data.shape()[2]
  }

  pub fn value(&self, attribute: usize, anchor: usize) -> f32 {
    self.data[[0, attribute, anchor]]
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoResult {
  /// 模型句柄未加载或已释放
  ModelUnavailable,
  /// 本次前向推理失败
  InferenceFailed,
}

/// 一次推理的结果，失败也以值的形式交给后处理
#[derive(Debug, Clone)]
pub enum ModelOutcome {
  Output(OutputTensor),
  NoResult(NoResult),
}

/// 持有模型句柄，隔离推理过程中的瞬时错误
#[derive(Debug)]
pub struct PoseInferenceAdapter<M> {
  model: Option<M>,
}

impl<M: Model> PoseInferenceAdapter<M> {
  pub fn new(model: M) -> Self {
    Self { model: Some(model) }
  }
}

impl<M> PoseInferenceAdapter<M> {
  pub fn unavailable() -> Self {
    Self { model: None }
  }

  pub fn is_available(&self) -> bool {
    self.model.is_some()
  }

  /// 释放模型句柄，此后每次推理都返回 `ModelUnavailable`
  pub fn release(&mut self) {
    if self.model.take().is_some() {
      info!("推理句柄已释放");
    }
  }
}

impl<M: Model> PoseInferenceAdapter<M> {
  pub fn run(&mut self, input: InputTensor) -> ModelOutcome {
    let Some(model) = self.model.as_mut() else {
      return ModelOutcome::NoResult(NoResult::ModelUnavailable);
    };

    let now = std::time::Instant::now();
    match model.infer(input) {
      Ok(output) => {
        debug!(
          "推理完成，耗时: {:.2?}, 输出形状: {:?}",
          now.elapsed(),
          [output.batch(), output.attributes(), output.anchors()]
        );
        ModelOutcome::Output(output)
      }
      Err(e) => {
        warn!("推理失败，本帧按无结果处理: {}", e);
        ModelOutcome::NoResult(NoResult::InferenceFailed)
      }
    }
  }
}

#[cfg(feature = "model_yolo_pose")]
mod yolo_pose;
#[cfg(feature = "model_yolo_pose")]
pub use self::yolo_pose::{YoloPose, YoloPoseBuilder, YoloPoseError};

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::IxDyn;
  use thiserror::Error;

  #[derive(Error, Debug)]
  #[error("资源耗尽")]
  struct Exhausted;

  struct Flaky {
    calls: usize,
  }

  impl Model for Flaky {
    type Error = Exhausted;

    fn infer(&mut self, _input: InputTensor) -> Result<OutputTensor, Self::Error> {
      self.calls += 1;
      if self.calls % 2 == 0 {
        Err(Exhausted)
      } else {
        Ok(OutputTensor::new(Array3::zeros((1, 7, 3))))
      }
    }
  }

  #[test]
  fn transient_failures_become_no_result() {
    let mut adapter = PoseInferenceAdapter::new(Flaky { calls: 0 });
    assert!(matches!(
      adapter.run(InputTensor::zeros(2, 2)),
      ModelOutcome::Output(_)
    ));
    assert!(matches!(
      adapter.run(InputTensor::zeros(2, 2)),
      ModelOutcome::NoResult(NoResult::InferenceFailed)
    ));
  }

  #[test]
  fn released_adapter_is_a_no_op() {
    let mut adapter = PoseInferenceAdapter::new(Flaky { calls: 0 });
    adapter.release();
    assert!(!adapter.is_available());
    assert!(matches!(
      adapter.run(InputTensor::zeros(2, 2)),
      ModelOutcome::NoResult(NoResult::ModelUnavailable)
    ));

    let mut adapter = PoseInferenceAdapter::<Flaky>::unavailable();
    assert!(matches!(
      adapter.run(InputTensor::zeros(2, 2)),
      ModelOutcome::NoResult(NoResult::ModelUnavailable)
    ));
  }

  #[test]
  fn output_rank_is_checked() {
    let output = OutputTensor::from_dyn(ArrayD::zeros(IxDyn(&[1, 56, 8400]))).unwrap();
    assert_eq!(output.attributes(), 56);
    assert_eq!(output.anchors(), 8400);
    assert!(OutputTensor::from_dyn(ArrayD::zeros(IxDyn(&[56, 8400]))).is_none());
  }
}
