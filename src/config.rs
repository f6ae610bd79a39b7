// 该文件是 Tanbi （探鼻） 项目的一部分。
// src/config.rs - 跟踪器配置
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

use clap::Args;
use thiserror::Error;

pub const DEFAULT_MODEL_WIDTH: usize = 640;
pub const DEFAULT_MODEL_HEIGHT: usize = 640;
pub const DEFAULT_FRAME_SKIP: u32 = 2;
/// 相机 API 版本使用的阈值，与镜像输出配套
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.4;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("模型输入尺寸无效: {0}x{1}")]
  InvalidModelSize(usize, usize),
  #[error("跳帧因子必须大于 0")]
  InvalidFrameSkip,
  #[error("置信度阈值必须位于 [0, 1) 区间: {0}")]
  InvalidThreshold(f32),
}

/// 管线的全部可配置项
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
  /// 模型输入宽度
  pub model_width: usize,
  /// 模型输入高度
  pub model_height: usize,
  /// 每 N 个 tick 运行一次管线
  pub frame_skip: u32,
  /// 目标置信度阈值（严格大于才接受）
  pub confidence_threshold: f32,
  /// 输出 `1 - x`，让控制方向与镜像预览一致
  pub mirror_output: bool,
  /// 相机画面相对观看者是镜像的，预处理时水平翻转
  pub flip_input: bool,
}

impl Default for TrackerConfig {
  fn default() -> Self {
    Self {
      model_width: DEFAULT_MODEL_WIDTH,
      model_height: DEFAULT_MODEL_HEIGHT,
      frame_skip: DEFAULT_FRAME_SKIP,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      mirror_output: true,
      flip_input: false,
    }
  }
}

impl TrackerConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.model_width == 0 || self.model_height == 0 {
      return Err(ConfigError::InvalidModelSize(
        self.model_width,
        self.model_height,
      ));
    }
    if self.frame_skip == 0 {
      return Err(ConfigError::InvalidFrameSkip);
    }
    if !(0.0..1.0).contains(&self.confidence_threshold) {
      return Err(ConfigError::InvalidThreshold(self.confidence_threshold));
    }
    Ok(())
  }
}

/// 命令行上的配置项，二进制程序通过 `#[command(flatten)]` 复用
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
  /// 模型输入宽度
  #[arg(long, default_value_t = DEFAULT_MODEL_WIDTH, value_name = "PIXELS")]
  pub model_width: usize,

  /// 模型输入高度
  #[arg(long, default_value_t = DEFAULT_MODEL_HEIGHT, value_name = "PIXELS")]
  pub model_height: usize,

  /// 每 N 个 tick 运行一次推理
  #[arg(long, default_value_t = DEFAULT_FRAME_SKIP, value_name = "N")]
  pub frame_skip: u32,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// 输出镜像坐标 (1 - x)
  #[arg(long, default_value_t = true, action = clap::ArgAction::Set, value_name = "BOOL")]
  pub mirror_output: bool,

  /// 预处理时水平翻转画面
  #[arg(long)]
  pub flip_input: bool,
}

impl From<ConfigArgs> for TrackerConfig {
  fn from(args: ConfigArgs) -> Self {
    Self {
      model_width: args.model_width,
      model_height: args.model_height,
      frame_skip: args.frame_skip,
      confidence_threshold: args.confidence,
      mirror_output: args.mirror_output,
      flip_input: args.flip_input,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_is_valid() {
    let config = TrackerConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.model_width, 640);
    assert_eq!(config.frame_skip, 2);
    assert!(config.mirror_output);
  }

  #[test]
  fn cli_defaults_match_reference() {
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
      #[command(flatten)]
      config: ConfigArgs,
    }

    let cli = Cli::parse_from(["tanbi"]);
    assert_eq!(TrackerConfig::from(cli.config), TrackerConfig::default());

    let cli = Cli::parse_from(["tanbi", "--mirror-output", "false", "--confidence", "0.5"]);
    let config = TrackerConfig::from(cli.config);
    assert!(!config.mirror_output);
    assert_eq!(config.confidence_threshold, 0.5);
  }

  #[test]
  fn rejects_bad_values() {
    let config = TrackerConfig {
      frame_skip: 0,
      ..Default::default()
    };
    assert_eq!(config.validate(), Err(ConfigError::InvalidFrameSkip));

    let config = TrackerConfig {
      model_height: 0,
      ..Default::default()
    };
    assert_eq!(config.validate(), Err(ConfigError::InvalidModelSize(640, 0)));

    let config = TrackerConfig {
      confidence_threshold: f32::NAN,
      ..Default::default()
    };
    assert!(config.validate().is_err());

    let config = TrackerConfig {
      confidence_threshold: 1.0,
      ..Default::default()
    };
    assert!(config.validate().is_err());
  }
}
