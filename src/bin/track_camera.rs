// 该文件是 Tanbi （探鼻） 项目的一部分。
// src/bin/track_camera.rs - 摄像头实时鼻尖跟踪
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
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use tanbi::{
  FromUrl, NoseTracker, TickOutcome, TrackerConfig,
  config::ConfigArgs,
  input::InputWrapper,
  model::{YoloPose, YoloPoseBuilder},
  task::{TrackingLoop, install_interrupt_handler},
};

/// Tanbi 摄像头跟踪参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 姿态模型路径，例如 onnx:///models/yolo11n-pose.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 v4l:///dev/video0
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 每秒 tick 数
  #[arg(long, value_name = "HZ", default_value_t = 60)]
  pub tick_hz: u32,
  /// 最大 tick 数（0 表示无限制）
  #[arg(long, value_name = "COUNT", default_value_t = 0)]
  pub max_ticks: u64,
  /// 只输出位置有变化的 tick
  #[arg(long)]
  pub only_updates: bool,

  #[command(flatten)]
  pub config: ConfigArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let config = TrackerConfig::from(args.config.clone());

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("置信度阈值: {}", config.confidence_threshold);
  info!("镜像输出: {}", config.mirror_output);

  let mut tracker = NoseTracker::<YoloPose, InputWrapper>::new(&config)?;
  let model = YoloPoseBuilder::from_url(&args.model).and_then(|builder| builder.build());
  let camera = InputWrapper::from_url(&args.input);
  if let Err(e) = tracker.start(model, camera) {
    // 降级运行，位置保持在初始值
    warn!("启动失败，以降级模式继续: {}", e);
  }

  let stop = install_interrupt_handler()?;
  let max_ticks = (args.max_ticks > 0).then_some(args.max_ticks);
  let only_updates = args.only_updates;

  TrackingLoop::default()
    .with_tick_rate(args.tick_hz)
    .with_max_ticks(max_ticks)
    .with_stop_flag(stop)
    .run(&mut tracker, |tick, outcome, x| {
      if only_updates && !matches!(outcome, TickOutcome::Updated(_)) {
        return;
      }
      let line = serde_json::json!({
        "tick": tick,
        "timestamp": Utc::now().to_rfc3339(),
        "x": x,
        "outcome": outcome.as_str(),
      });
      println!("{}", line);
    });

  Ok(())
}
