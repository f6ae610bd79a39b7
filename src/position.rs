// 该文件是 Tanbi （探鼻） 项目的一部分。
// src/position.rs - 跟踪位置状态
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

//! 归一化鼻尖横坐标的进程级状态。
//!
//! 单写多读：只有 [`TrackedPosition`] 能写入，且它不可克隆；
//! 消费者通过 [`PositionReader`] 在任意线程读取。
//! 数值以 `f32` 位模式存放在一个 `AtomicU32` 中，读取不会看到撕裂的值。

use std::sync::{
  Arc,
  atomic::{AtomicU32, Ordering},
};

/// 启动时的初始值：画面中心
pub const CENTER: f32 = 0.5;

#[derive(Debug)]
pub struct TrackedPosition {
  cell: Arc<AtomicU32>,
}

impl Default for TrackedPosition {
  fn default() -> Self {
    Self::new()
  }
}

impl TrackedPosition {
  pub fn new() -> Self {
    Self {
      cell: Arc::new(AtomicU32::new(CENTER.to_bits())),
    }
  }

  pub fn get(&self) -> f32 {
    f32::from_bits(self.cell.load(Ordering::Acquire))
  }

  /// 写入新值，非有限值被忽略，其余夹到 [0, 1]
  pub fn set(&mut self, value: f32) {
    if !value.is_finite() {
      return;
    }
    self
      .cell
      .store(value.clamp(0.0, 1.0).to_bits(), Ordering::Release);
  }

  pub fn reader(&self) -> PositionReader {
    PositionReader {
      cell: Arc::clone(&self.cell),
    }
  }
}

/// 只读访问器，可随意克隆并跨线程传递
#[derive(Debug, Clone)]
pub struct PositionReader {
  cell: Arc<AtomicU32>,
}

impl PositionReader {
  pub fn get(&self) -> f32 {
    f32::from_bits(self.cell.load(Ordering::Acquire))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn starts_centered() {
    let position = TrackedPosition::new();
    assert_eq!(position.get(), 0.5);
    assert_eq!(position.reader().get(), 0.5);
  }

  #[test]
  fn reader_sees_writes() {
    let mut position = TrackedPosition::new();
    let reader = position.reader();
    position.set(0.25);
    assert_eq!(reader.get(), 0.25);

    let handle = std::thread::spawn(move || reader.get());
    assert_eq!(handle.join().unwrap(), 0.25);
  }

  #[test]
  fn stays_in_range() {
    let mut position = TrackedPosition::new();
    position.set(1.7);
    assert_eq!(position.get(), 1.0);
    position.set(-3.0);
    assert_eq!(position.get(), 0.0);
    position.set(f32::NAN);
    assert_eq!(position.get(), 0.0);
  }
}
