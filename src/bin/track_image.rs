// 该文件是 Tanbi （探鼻） 项目的一部分。
// src/bin/track_image.rs - 单张图片鼻尖定位
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
use clap::Parser;
use tracing::info;
use url::Url;

use tanbi::{
  FromUrl, NoseTracker, TrackerConfig,
  config::ConfigArgs,
  input::ImageFileInput,
  model::{YoloPose, YoloPoseBuilder},
};

/// Tanbi 单张图片参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 姿态模型路径
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 图片路径，例如 image:///tmp/face.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  #[command(flatten)]
  pub config: ConfigArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let config = TrackerConfig::from(args.config);

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);

  let mut tracker = NoseTracker::<YoloPose, ImageFileInput>::new(&config)?;
  // 离线模式下启动失败直接退出
  tracker.start(
    YoloPoseBuilder::from_url(&args.model).and_then(|builder| builder.build()),
    ImageFileInput::from_url(&args.input),
  )?;

  info!("开始推理...");
  let now = std::time::Instant::now();
  let outcome = tracker.process_now();
  info!("推理完成，耗时: {:.2?}", now.elapsed());

  println!(
    "{}",
    serde_json::json!({
      "x": tracker.position(),
      "outcome": outcome.as_str(),
    })
  );
  tracker.shutdown();

  Ok(())
}
