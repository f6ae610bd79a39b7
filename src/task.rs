// 该文件是 Tanbi （探鼻） 项目的一部分。
// src/task.rs - 固定频率的 tick 循环
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
  },
  thread,
  time::{Duration, Instant},
};

use tracing::{info, warn};

use crate::{
  input::CameraSource,
  model::Model,
  tracker::{NoseTracker, TickOutcome},
};

/// 注册 Ctrl-C 处理函数，返回的标志在收到信号后置位
pub fn install_interrupt_handler() -> anyhow::Result<Arc<AtomicBool>> {
  let stop = Arc::new(AtomicBool::new(false));
  let flag = Arc::clone(&stop);
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    flag.store(true, Ordering::SeqCst);
  })?;
  Ok(stop)
}

/// 代替宿主引擎的更新循环：按固定频率调用 `tick`，结束时关闭跟踪器
#[derive(Debug)]
pub struct TrackingLoop {
  interval: Duration,
  max_ticks: Option<u64>,
  stop: Arc<AtomicBool>,
}

impl Default for TrackingLoop {
  fn default() -> Self {
    Self {
      interval: Duration::from_secs(1) / 60,
      max_ticks: None,
      stop: Arc::new(AtomicBool::new(false)),
    }
  }
}

impl TrackingLoop {
  /// 0 表示不限速
  pub fn with_tick_rate(mut self, hz: u32) -> Self {
    self.interval = if hz == 0 {
      Duration::ZERO
    } else {
      Duration::from_secs(1) / hz
    };
    self
  }

  pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
    self.max_ticks = max_ticks;
    self
  }

  pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
    self.stop = stop;
    self
  }

  /// 返回执行的 tick 数
  pub fn run<M, C, F>(self, tracker: &mut NoseTracker<M, C>, mut on_tick: F) -> u64
  where
    M: Model,
    C: CameraSource,
    F: FnMut(u64, TickOutcome, f32),
  {
    info!("开始 tick 循环，间隔 {:.2?}", self.interval);
    let mut ticks = 0u64;
    let mut slow_ticks = 0u64;

    loop {
      if self.max_ticks.map(|n| ticks >= n).unwrap_or(false) {
        info!("达到指定 tick 数 {}, 退出循环", ticks);
        break;
      }
      if self.stop.load(Ordering::SeqCst) {
        warn!("中断信号接收，退出循环");
        break;
      }

      let started = Instant::now();
      let outcome = tracker.tick();
      ticks += 1;
      on_tick(ticks, outcome, tracker.position());

      if outcome == TickOutcome::ShutDown {
        break;
      }

      let elapsed = started.elapsed();
      if elapsed < self.interval {
        thread::sleep(self.interval - elapsed);
      } else if !self.interval.is_zero() {
        slow_ticks += 1;
      }
    }

    if slow_ticks > 0 {
      warn!("{} 个 tick 超出了预定间隔", slow_ticks);
    }
    tracker.shutdown();
    info!("循环结束，共 {} 个 tick", ticks);
    ticks
  }
}
