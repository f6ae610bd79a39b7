// 该文件是 Tanbi （探鼻） 项目的一部分。
// src/model/yolo_pose.rs - YOLO 姿态模型（ONNX Runtime）
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

use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::Tensor,
};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Model, OutputTensor},
  normalizer::InputTensor,
};

const YOLO_POSE_NUM_INPUTS: usize = 1;
const YOLO_POSE_INPUT_RANK: usize = 4;

pub struct YoloPose {
  session: Session,
}

#[derive(Error, Debug)]
pub enum YoloPoseError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("ONNX Runtime 错误: {0}: {1}")]
  OrtError(String, String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("输出张量形状无效: {0:?}")]
  OutputShape(Vec<usize>),
}

impl YoloPoseError {
  pub fn ort(msg: &str, e: impl std::fmt::Display) -> Self {
    YoloPoseError::OrtError(msg.to_string(), e.to_string())
  }
}

pub struct YoloPoseBuilder {
  model_path: String,
}

impl FromUrlWithScheme for YoloPoseBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for YoloPoseBuilder {
  type Error = YoloPoseError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(YoloPoseError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(YoloPoseBuilder::new(url.path()))
  }
}

impl YoloPoseBuilder {
  pub fn new(model_path: impl Into<String>) -> Self {
    Self {
      model_path: model_path.into(),
    }
  }

  pub fn build(self) -> Result<YoloPose, YoloPoseError> {
    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 ONNX Runtime 推理会话");
    let session = Session::builder()
      .map_err(|e| YoloPoseError::ort("无法创建会话构建器", e))?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(|e| YoloPoseError::ort("无法设置优化级别", e))?
      .commit_from_memory(&model_data)
      .map_err(|e| YoloPoseError::ort("无法解析模型", e))?;
    info!("模型加载完成");

    let num_inputs = session.inputs.len();
    let num_outputs = session.outputs.len();
    if num_inputs != YOLO_POSE_NUM_INPUTS {
      error!(
        "预期模型输入数量为 {}, 实际为 {}",
        YOLO_POSE_NUM_INPUTS, num_inputs
      );
      return Err(YoloPoseError::ModelInvalid(format!(
        "预期模型输入数量为 {}, 实际为 {}",
        YOLO_POSE_NUM_INPUTS, num_inputs
      )));
    }
    if num_outputs == 0 {
      error!("模型没有输出");
      return Err(YoloPoseError::ModelInvalid("模型没有输出".to_string()));
    }

    for input in &session.inputs {
      debug!("模型输入: {} {:?}", input.name, input.input_type);
    }
    for output in &session.outputs {
      debug!("模型输出: {} {:?}", output.name, output.output_type);
    }

    Ok(YoloPose { session })
  }
}

impl Model for YoloPose {
  type Error = YoloPoseError;

  fn infer(&mut self, input: InputTensor) -> Result<OutputTensor, Self::Error> {
    if input.shape().len() != YOLO_POSE_INPUT_RANK {
      return Err(YoloPoseError::ModelInvalid(format!(
        "输入张量维度为 {}",
        input.shape().len()
      )));
    }

    debug!("设置模型输入");
    let tensor = Tensor::from_array(input.into_array())
      .map_err(|e| YoloPoseError::ort("无法创建输入张量", e))?;

    debug!("执行模型推理");
    let outputs = self
      .session
      .run(ort::inputs![tensor])
      .map_err(|e| YoloPoseError::ort("推理失败", e))?;

    debug!("获取模型输出");
    let output = outputs[0]
      .try_extract_array::<f32>()
      .map_err(|e| YoloPoseError::ort("无法提取输出", e))?;
    let shape = output.shape().to_vec();

    OutputTensor::from_dyn(output.to_owned()).ok_or(YoloPoseError::OutputShape(shape))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scheme_is_checked() {
    let url = Url::parse("onnx:///models/yolo11n-pose.onnx").unwrap();
    let builder = YoloPoseBuilder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, "/models/yolo11n-pose.onnx");

    let url = Url::parse("file:///models/yolo11n-pose.onnx").unwrap();
    assert!(matches!(
      YoloPoseBuilder::from_url(&url),
      Err(YoloPoseError::ModelPathError(_))
    ));
  }

  #[test]
  fn missing_model_file_fails_to_load() {
    let result = YoloPoseBuilder::new("/nonexistent/tanbi/yolo11n-pose.onnx").build();
    assert!(matches!(result, Err(YoloPoseError::ModelLoadError(_))));
  }
}
