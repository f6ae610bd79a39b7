// 该文件是 Tanbi （探鼻） 项目的一部分。
// src/frame.rs - 相机帧定义
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

use std::borrow::Cow;

/// 交错存储的 8 位像素排布
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
  Rgb,
  Bgr,
  Rgba,
  Bgra,
}

impl PixelLayout {
  pub fn channels(&self) -> usize {
    match self {
      PixelLayout::Rgb | PixelLayout::Bgr => 3,
      PixelLayout::Rgba | PixelLayout::Bgra => 4,
    }
  }

  /// 像素内 R、G、B 三个通道的字节偏移
  pub fn rgb_offsets(&self) -> [usize; 3] {
    match self {
      PixelLayout::Rgb | PixelLayout::Rgba => [0, 1, 2],
      PixelLayout::Bgr | PixelLayout::Bgra => [2, 1, 0],
    }
  }
}

/// 一帧相机图像，数据由相机源持有，本帧只在一次 tick 内有效
#[derive(Debug, Clone)]
pub struct Frame<'a> {
  width: usize,
  height: usize,
  layout: PixelLayout,
  data: Cow<'a, [u8]>,
}

impl<'a> Frame<'a> {
  pub fn new(width: usize, height: usize, layout: PixelLayout, data: impl Into<Cow<'a, [u8]>>) -> Self {
    Self {
      width,
      height,
      layout,
      data: data.into(),
    }
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn layout(&self) -> PixelLayout {
    self.layout
  }

  pub fn channels(&self) -> usize {
    self.layout.channels()
  }

  pub fn data(&self) -> &[u8] {
    &self.data
  }

  /// 声明尺寸所需的字节数
  pub fn expected_len(&self) -> usize {
    self.width * self.height * self.channels()
  }

  /// 尺寸非零且数据长度足够
  pub fn is_complete(&self) -> bool {
    self.width > 0 && self.height > 0 && self.data.len() >= self.expected_len()
  }

  pub fn into_owned(self) -> Frame<'static> {
    Frame {
      width: self.width,
      height: self.height,
      layout: self.layout,
      data: Cow::Owned(self.data.into_owned()),
    }
  }
}
