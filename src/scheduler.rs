// 该文件是 Tanbi （探鼻） 项目的一部分。
// src/scheduler.rs - 跳帧调度与管线状态
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

use std::fmt;

/// 管线生命周期
///
/// `Uninitialized → Ready → (Running | Degraded)`，任意状态都可进入终态 `Shutdown`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
  Uninitialized,
  Ready,
  Running,
  Degraded,
  Shutdown,
}

impl TrackerState {
  pub fn can_transition_to(&self, next: TrackerState) -> bool {
    use TrackerState::*;
    match (self, next) {
      (Shutdown, _) => false,
      (_, Shutdown) => true,
      (Uninitialized, Ready | Degraded) => true,
      (Ready | Running, Running | Degraded) => true,
      _ => false,
    }
  }

  /// 本状态下是否尝试推理
  pub fn is_active(&self) -> bool {
    matches!(self, TrackerState::Ready | TrackerState::Running)
  }
}

impl fmt::Display for TrackerState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      TrackerState::Uninitialized => "uninitialized",
      TrackerState::Ready => "ready",
      TrackerState::Running => "running",
      TrackerState::Degraded => "degraded",
      TrackerState::Shutdown => "shutdown",
    };
    f.write_str(name)
  }
}

/// 每 N 个 tick 放行一次管线
#[derive(Debug, Clone)]
pub struct FrameScheduler {
  every: u32,
  counter: u64,
}

impl FrameScheduler {
  /// `every` 为 0 时按 1 处理
  pub fn new(every: u32) -> Self {
    Self {
      every: every.max(1),
      counter: 0,
    }
  }

  pub fn every(&self) -> u32 {
    self.every
  }

  pub fn ticks(&self) -> u64 {
    self.counter
  }

  /// 计数器先自增，再判断 `counter mod N == 0`
  pub fn should_run(&mut self) -> bool {
    self.counter = self.counter.wrapping_add(1);
    self.counter % u64::from(self.every) == 0
  }
}
