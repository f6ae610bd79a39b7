// 该文件是 Tanbi （探鼻） 项目的一部分。
// src/tracker.rs - 逐帧推理管线
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

//! 鼻尖跟踪器。
//!
//! [`NoseTracker`] 独占持有相机源与模型句柄，由外部的更新循环每个 tick
//! 调用一次 [`NoseTracker::tick`]。每个 tick 要么完整地跑完
//! 预处理 → 推理 → 后处理，要么被跳过；任何错误都不会越过 tick 边界，
//! 只会让 [`TrackedPosition`] 保持上一次的值。只有启动失败会通过
//! [`NoseTracker::start`] 报告给调用方。

use std::error::Error;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  config::{ConfigError, TrackerConfig},
  extractor::{Extraction, KeypointExtractor},
  input::{CameraError, CameraSource},
  model::{Model, ModelOutcome, NoResult, PoseInferenceAdapter},
  normalizer::{FrameNormalizer, InputTensor},
  position::{PositionReader, TrackedPosition},
  scheduler::{FrameScheduler, TrackerState},
};

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum StartupError {
  #[error("配置无效: {0}")]
  Config(#[from] ConfigError),
  #[error("模型加载失败: {0}")]
  ModelLoad(#[source] BoxError),
  #[error("相机不可用: {0}")]
  CameraUnavailable(#[source] BoxError),
  #[error("跟踪器已经启动过, 当前状态: {0}")]
  AlreadyStarted(TrackerState),
}

/// 单个 tick 的结果，仅供观察；对外的契约是 [`TrackedPosition`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
  /// 尚未调用 `start`
  NotStarted,
  /// 调度器跳过本 tick
  Skipped,
  /// 降级状态，不做推理
  Degraded,
  /// 已关闭
  ShutDown,
  /// 没有可用帧或帧数据不完整
  FrameUnavailable,
  /// 推理没有给出结果
  NoResult(NoResult),
  /// 置信度不足，沿用上一次的值
  Held(f32),
  /// 接受新值
  Updated(f32),
}

impl TickOutcome {
  pub fn as_str(&self) -> &'static str {
    match self {
      TickOutcome::NotStarted => "not-started",
      TickOutcome::Skipped => "skipped",
      TickOutcome::Degraded => "degraded",
      TickOutcome::ShutDown => "shutdown",
      TickOutcome::FrameUnavailable => "frame-unavailable",
      TickOutcome::NoResult(_) => "no-result",
      TickOutcome::Held(_) => "held",
      TickOutcome::Updated(_) => "updated",
    }
  }
}

pub struct NoseTracker<M: Model, C: CameraSource> {
  state: TrackerState,
  normalizer: FrameNormalizer,
  adapter: PoseInferenceAdapter<M>,
  extractor: KeypointExtractor,
  scheduler: FrameScheduler,
  position: TrackedPosition,
  camera: Option<C>,
}

impl<M: Model, C: CameraSource> NoseTracker<M, C> {
  pub fn new(config: &TrackerConfig) -> Result<Self, ConfigError> {
    config.validate()?;
    debug!("跟踪器配置: {:?}", config);

    Ok(Self {
      state: TrackerState::Uninitialized,
      normalizer: FrameNormalizer::from_config(config),
      adapter: PoseInferenceAdapter::unavailable(),
      extractor: KeypointExtractor::from_config(config),
      scheduler: FrameScheduler::new(config.frame_skip),
      position: TrackedPosition::new(),
      camera: None,
    })
  }

  /// 接收已加载的模型与已打开的相机，激活相机。
  ///
  /// 任一失败都会进入 `Degraded` 并返回第一个错误；此后的 tick 不会再报错。
  pub fn start<ME, CE>(
    &mut self,
    model: Result<M, ME>,
    camera: Result<C, CE>,
  ) -> Result<(), StartupError>
  where
    ME: Error + Send + Sync + 'static,
    CE: Error + Send + Sync + 'static,
  {
    if self.state != TrackerState::Uninitialized {
      return Err(StartupError::AlreadyStarted(self.state));
    }

    let mut failures = Vec::new();

    match model {
      Ok(model) => self.adapter = PoseInferenceAdapter::new(model),
      Err(e) => failures.push(StartupError::ModelLoad(Box::new(e))),
    }

    match camera {
      Ok(mut camera) => match camera.activate() {
        Ok(()) => self.camera = Some(camera),
        Err(e) => failures.push(StartupError::CameraUnavailable(Box::new(e))),
      },
      Err(e) => failures.push(StartupError::CameraUnavailable(Box::new(e))),
    }

    if failures.is_empty() {
      self.transition(TrackerState::Ready);
      info!("跟踪器就绪");
      return Ok(());
    }

    for failure in &failures {
      error!("启动失败: {}", failure);
    }
    self.transition(TrackerState::Degraded);
    warn!("跟踪器进入降级状态，位置将保持为 {:.3}", self.position.get());
    Err(failures.remove(0))
  }

  /// 由外部更新循环每个 tick 调用一次
  pub fn tick(&mut self) -> TickOutcome {
    if let Some(outcome) = self.inactive_outcome() {
      return outcome;
    }
    if !self.scheduler.should_run() {
      return TickOutcome::Skipped;
    }
    self.process()
  }

  /// 不经过调度器，立即处理一帧
  pub fn process_now(&mut self) -> TickOutcome {
    if let Some(outcome) = self.inactive_outcome() {
      return outcome;
    }
    self.process()
  }

  /// 释放推理句柄并停用相机，可重复调用
  pub fn shutdown(&mut self) {
    if self.state == TrackerState::Shutdown {
      return;
    }
    self.adapter.release();
    if let Some(mut camera) = self.camera.take() {
      camera.deactivate();
    }
    self.transition(TrackerState::Shutdown);
    info!("跟踪器已关闭，最终位置 {:.3}", self.position.get());
  }

  pub fn state(&self) -> TrackerState {
    self.state
  }

  pub fn position(&self) -> f32 {
    self.position.get()
  }

  pub fn reader(&self) -> PositionReader {
    self.position.reader()
  }

  fn inactive_outcome(&self) -> Option<TickOutcome> {
    match self.state {
      TrackerState::Uninitialized => Some(TickOutcome::NotStarted),
      TrackerState::Degraded => Some(TickOutcome::Degraded),
      TrackerState::Shutdown => Some(TickOutcome::ShutDown),
      TrackerState::Ready | TrackerState::Running => None,
    }
  }

  fn process(&mut self) -> TickOutcome {
    let Some(camera) = self.camera.as_mut() else {
      self.degrade("相机句柄缺失");
      return TickOutcome::Degraded;
    };

    // Err(Some(_)) 表示相机画面丢失
    let captured: Result<InputTensor, Option<String>> = match camera.latest_frame() {
      Ok(Some(frame)) if frame.is_complete() => Ok(self.normalizer.normalize(&frame)),
      Ok(Some(frame)) => {
        debug!(
          "帧数据不完整 ({}x{}, {} 字节)，跳过本 tick",
          frame.width(),
          frame.height(),
          frame.data().len()
        );
        Err(None)
      }
      Ok(None) => {
        debug!("没有可用帧，跳过本 tick");
        Err(None)
      }
      Err(CameraError::FeedUnavailable(reason)) => Err(Some(reason)),
      Err(e) => {
        warn!("读取帧失败: {}", e);
        Err(None)
      }
    };

    let tensor = match captured {
      Ok(tensor) => tensor,
      Err(Some(reason)) => {
        self.degrade(&reason);
        return TickOutcome::Degraded;
      }
      Err(None) => return TickOutcome::FrameUnavailable,
    };

    let output = match self.adapter.run(tensor) {
      ModelOutcome::Output(output) => output,
      ModelOutcome::NoResult(NoResult::ModelUnavailable) => {
        self.degrade("推理句柄不可用");
        return TickOutcome::Degraded;
      }
      ModelOutcome::NoResult(reason) => return TickOutcome::NoResult(reason),
    };

    if self.state == TrackerState::Ready {
      self.transition(TrackerState::Running);
    }

    match self.extractor.extract(&output, self.position.get()) {
      Extraction::Accepted(value) => {
        self.position.set(value);
        TickOutcome::Updated(self.position.get())
      }
      Extraction::Held(value) => TickOutcome::Held(value),
    }
  }

  fn degrade(&mut self, reason: &str) {
    error!("跟踪器降级: {}", reason);
    self.transition(TrackerState::Degraded);
  }

  fn transition(&mut self, next: TrackerState) {
    if self.state.can_transition_to(next) {
      debug!("状态切换: {} -> {}", self.state, next);
      self.state = next;
    } else {
      warn!("忽略非法状态切换: {} -> {}", self.state, next);
    }
  }
}

impl<M: Model, C: CameraSource> Drop for NoseTracker<M, C> {
  fn drop(&mut self) {
    self.shutdown();
  }
}
