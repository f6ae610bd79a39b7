// 该文件是 Tanbi （探鼻） 项目的一部分。
// src/extractor.rs - 鼻尖关键点后处理
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

use tracing::debug;

use crate::{config::TrackerConfig, model::OutputTensor};

/// 目标置信度所在的 attribute 下标
pub const SCORE_ATTRIBUTE: usize = 4;
/// 鼻尖 x 坐标所在的 attribute 下标
pub const NOSE_X_ATTRIBUTE: usize = 5;
/// 鼻尖 y 坐标所在的 attribute 下标
pub const NOSE_Y_ATTRIBUTE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extraction {
  /// 接受新的归一化坐标
  Accepted(f32),
  /// 没有足够可信的目标，沿用上一次的值
  Held(f32),
}

impl Extraction {
  pub fn value(&self) -> f32 {
    match self {
      Extraction::Accepted(v) | Extraction::Held(v) => *v,
    }
  }
}

/// 从模型输出中选出最可信的目标，并计算其鼻尖的归一化横坐标
#[derive(Debug, Clone)]
pub struct KeypointExtractor {
  model_width: f32,
  threshold: f32,
  mirror: bool,
}

impl KeypointExtractor {
  pub fn new(model_width: usize, threshold: f32, mirror: bool) -> Self {
    Self {
      model_width: model_width as f32,
      threshold,
      mirror,
    }
  }

  pub fn from_config(config: &TrackerConfig) -> Self {
    Self::new(
      config.model_width,
      config.confidence_threshold,
      config.mirror_output,
    )
  }

  /// 置信度最高的 anchor，分数相同时先出现者胜出
  pub fn best_anchor(output: &OutputTensor) -> Option<(usize, f32)> {
    if output.batch() == 0 || output.attributes() <= SCORE_ATTRIBUTE {
      return None;
    }

    let mut best: Option<(usize, f32)> = None;
    for anchor in 0..output.anchors() {
      let score = output.value(SCORE_ATTRIBUTE, anchor);
      match best {
        Some((_, max)) if score > max => best = Some((anchor, score)),
        None if !score.is_nan() => best = Some((anchor, score)),
        _ => {}
      }
    }
    best
  }

  pub fn extract(&self, output: &OutputTensor, previous: f32) -> Extraction {
    if output.attributes() <= NOSE_Y_ATTRIBUTE {
      debug!("输出 attribute 数量不足: {}", output.attributes());
      return Extraction::Held(previous);
    }

    let Some((anchor, score)) = Self::best_anchor(output) else {
      debug!("没有候选目标，保持上一次的值 {:.3}", previous);
      return Extraction::Held(previous);
    };

    if score <= self.threshold {
      debug!(
        "最高置信度 {:.3} 未超过阈值 {:.3}，保持上一次的值 {:.3}",
        score, self.threshold, previous
      );
      return Extraction::Held(previous);
    }

    let nose_x = output.value(NOSE_X_ATTRIBUTE, anchor);
    if !nose_x.is_finite() {
      debug!("anchor {} 的鼻尖坐标无效: {}", anchor, nose_x);
      return Extraction::Held(previous);
    }

    let normalized = (nose_x / self.model_width).clamp(0.0, 1.0);
    let value = if self.mirror {
      1.0 - normalized
    } else {
      normalized
    };
    debug!(
      "anchor {} 置信度 {:.3}, 鼻尖 x = {:.1}, 归一化 = {:.3}",
      anchor, score, nose_x, value
    );
    Extraction::Accepted(value)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::Array3;

  const ATTRIBUTES: usize = 56;

  /// 每个 anchor 给出 (score, nose_x)
  fn output(anchors: &[(f32, f32)]) -> OutputTensor {
    let mut data = Array3::<f32>::zeros((1, ATTRIBUTES, anchors.len()));
    for (i, (score, nose_x)) in anchors.iter().enumerate() {
      data[[0, SCORE_ATTRIBUTE, i]] = *score;
      data[[0, NOSE_X_ATTRIBUTE, i]] = *nose_x;
      data[[0, NOSE_Y_ATTRIBUTE, i]] = 320.0;
    }
    OutputTensor::new(data)
  }

  #[test]
  fn center_nose_is_half() {
    let out = output(&[(0.9, 320.0)]);
    let plain = KeypointExtractor::new(640, 0.4, false);
    let mirrored = KeypointExtractor::new(640, 0.4, true);
    assert_eq!(plain.extract(&out, 0.1), Extraction::Accepted(0.5));
    assert_eq!(mirrored.extract(&out, 0.1), Extraction::Accepted(0.5));
  }

  #[test]
  fn out_of_range_is_clamped() {
    let plain = KeypointExtractor::new(640, 0.4, false);
    let mirrored = KeypointExtractor::new(640, 0.4, true);

    let edge = output(&[(0.9, 640.0)]);
    assert_eq!(plain.extract(&edge, 0.5).value(), 1.0);
    assert_eq!(mirrored.extract(&edge, 0.5).value(), 0.0);

    let beyond = output(&[(0.9, 900.0)]);
    assert_eq!(plain.extract(&beyond, 0.5).value(), 1.0);

    let negative = output(&[(0.9, -12.0)]);
    assert_eq!(plain.extract(&negative, 0.5).value(), 0.0);
    assert_eq!(mirrored.extract(&negative, 0.5).value(), 1.0);
  }

  #[test]
  fn low_confidence_holds_previous() {
    let extractor = KeypointExtractor::new(640, 0.4, true);
    let out = output(&[(0.1, 100.0), (0.4, 200.0), (0.39, 300.0)]);
    assert_eq!(extractor.extract(&out, 0.73), Extraction::Held(0.73));

    let empty = output(&[]);
    assert_eq!(extractor.extract(&empty, 0.73), Extraction::Held(0.73));
  }

  #[test]
  fn ties_go_to_first_anchor() {
    let out = output(&[(0.2, 10.0), (0.8, 160.0), (0.8, 480.0)]);
    assert_eq!(KeypointExtractor::best_anchor(&out), Some((1, 0.8)));

    let extractor = KeypointExtractor::new(640, 0.4, false);
    assert_eq!(extractor.extract(&out, 0.5), Extraction::Accepted(0.25));
  }

  #[test]
  fn highest_score_wins() {
    let out = output(&[(0.5, 64.0), (0.95, 576.0), (0.6, 320.0)]);
    let extractor = KeypointExtractor::new(640, 0.4, false);
    assert_eq!(extractor.extract(&out, 0.5), Extraction::Accepted(0.9));
  }

  #[test]
  fn truncated_or_invalid_output_holds() {
    let extractor = KeypointExtractor::new(640, 0.4, false);
    let short = OutputTensor::new(Array3::from_elem((1, 5, 4), 0.9));
    assert_eq!(extractor.extract(&short, 0.3), Extraction::Held(0.3));

    // 缺少鼻尖 y 的输出同样不可用
    let mut data = Array3::<f32>::zeros((1, 6, 1));
    data[[0, SCORE_ATTRIBUTE, 0]] = 0.9;
    data[[0, NOSE_X_ATTRIBUTE, 0]] = 320.0;
    let six = OutputTensor::new(data);
    assert_eq!(extractor.extract(&six, 0.2), Extraction::Held(0.2));

    let nan = output(&[(0.9, f32::NAN)]);
    assert_eq!(extractor.extract(&nan, 0.3), Extraction::Held(0.3));

    let nan_score = output(&[(f32::NAN, 100.0), (0.9, 64.0)]);
    assert_eq!(extractor.extract(&nan_score, 0.3), Extraction::Accepted(0.1));
  }
}
