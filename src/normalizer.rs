// 该文件是 Tanbi （探鼻） 项目的一部分。
// src/normalizer.rs - 帧预处理
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

use image::{ImageBuffer, Rgb, Rgba, imageops::FilterType};
use ndarray::Array4;
use tracing::{debug, warn};

use crate::{
  config::TrackerConfig,
  frame::{Frame, PixelLayout},
};

const RGB_CHANNELS: usize = 3;
const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// 模型输入张量，形状 [1, 3, H, W]，通道顺序 R、G、B，取值 [0, 1]
#[derive(Debug, Clone)]
pub struct InputTensor {
  data: Array4<f32>,
}

impl InputTensor {
  pub fn zeros(height: usize, width: usize) -> Self {
    Self {
      data: Array4::zeros((1, RGB_CHANNELS, height, width)),
    }
  }

  pub fn shape(&self) -> &[usize] {
    self.data.shape()
  }

  pub fn as_array(&self) -> &Array4<f32> {
    &self.data
  }

  pub fn into_array(self) -> Array4<f32> {
    self.data
  }
}

/// 将任意尺寸、任意通道顺序的相机帧转换为固定尺寸的 NCHW 张量
#[derive(Debug, Clone)]
pub struct FrameNormalizer {
  width: usize,
  height: usize,
  flip_horizontal: bool,
}

impl FrameNormalizer {
  pub fn new(width: usize, height: usize) -> Self {
    Self {
      width,
      height,
      flip_horizontal: false,
    }
  }

  pub fn from_config(config: &TrackerConfig) -> Self {
    Self::new(config.model_width, config.model_height).flip_horizontal(config.flip_input)
  }

  /// 源画面相对观看者是镜像时开启
  pub fn flip_horizontal(mut self, flip: bool) -> Self {
    self.flip_horizontal = flip;
    self
  }

  /// 预处理不会失败：空帧或数据不足时返回全零张量
  pub fn normalize(&self, frame: &Frame) -> InputTensor {
    if !frame.is_complete() {
      debug!(
        "帧数据不完整: {}x{}, 期望 {} 字节, 实际 {} 字节",
        frame.width(),
        frame.height(),
        frame.expected_len(),
        frame.data().len()
      );
      return InputTensor::zeros(self.height, self.width);
    }

    let Some(pixels) = self.resize(frame) else {
      warn!("无法构造缩放缓冲区，返回全零张量");
      return InputTensor::zeros(self.height, self.width);
    };

    let channels = frame.channels();
    let offsets = frame.layout().rgb_offsets();
    let mut tensor = Array4::<f32>::zeros((1, RGB_CHANNELS, self.height, self.width));

    for h in 0..self.height {
      for w in 0..self.width {
        let src_w = if self.flip_horizontal {
          self.width - 1 - w
        } else {
          w
        };
        let src_idx = (h * self.width + src_w) * channels;
        for (c, offset) in offsets.iter().enumerate() {
          tensor[[0, c, h, w]] = pixels[src_idx + offset] as f32 / 255.0;
        }
      }
    }

    InputTensor { data: tensor }
  }

  /// 缩放到模型尺寸，保持源通道排布
  fn resize<'a>(&self, frame: &'a Frame) -> Option<Cow<'a, [u8]>> {
    let data = &frame.data()[..frame.expected_len()];
    if frame.width() == self.width && frame.height() == self.height {
      return Some(Cow::Borrowed(data));
    }

    let (src_w, src_h) = (frame.width() as u32, frame.height() as u32);
    let (dst_w, dst_h) = (self.width as u32, self.height as u32);
    let resized = match frame.layout() {
      PixelLayout::Rgb | PixelLayout::Bgr => {
        let image = ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(src_w, src_h, data)?;
        image::imageops::resize(&image, dst_w, dst_h, RESIZE_FILTER).into_raw()
      }
      PixelLayout::Rgba | PixelLayout::Bgra => {
        let image = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(src_w, src_h, data)?;
        image::imageops::resize(&image, dst_w, dst_h, RESIZE_FILTER).into_raw()
      }
    };

    Some(Cow::Owned(resized))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn solid(width: usize, height: usize, layout: PixelLayout, pixel: &[u8]) -> Frame<'static> {
    let data = pixel.repeat(width * height);
    Frame::new(width, height, layout, data)
  }

  #[test]
  fn output_shape_and_range() {
    let normalizer = FrameNormalizer::from_config(&TrackerConfig::default());
    let frame = solid(320, 240, PixelLayout::Rgb, &[12, 200, 255]);
    let tensor = normalizer.normalize(&frame);
    assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
    assert!(tensor.as_array().iter().all(|v| (0.0..=1.0).contains(v)));
  }

  #[test]
  fn solid_red_lands_in_channel_zero() {
    let normalizer = FrameNormalizer::new(640, 640);
    let frame = solid(640, 640, PixelLayout::Rgb, &[255, 0, 0]);
    let tensor = normalizer.normalize(&frame).into_array();
    assert!((tensor[[0, 0, 10, 10]] - 1.0).abs() < 1e-6);
    assert!(tensor[[0, 1, 10, 10]].abs() < 1e-6);
    assert!(tensor[[0, 2, 10, 10]].abs() < 1e-6);
  }

  #[test]
  fn blue_first_sources_are_swapped() {
    let normalizer = FrameNormalizer::new(8, 8);
    let frame = solid(16, 16, PixelLayout::Bgr, &[0, 0, 255]);
    let tensor = normalizer.normalize(&frame).into_array();
    assert!(tensor[[0, 0, 3, 3]] > 0.99);
    assert!(tensor[[0, 2, 3, 3]] < 0.01);

    let frame = solid(8, 8, PixelLayout::Bgra, &[255, 0, 0, 255]);
    let tensor = normalizer.normalize(&frame).into_array();
    assert!(tensor[[0, 0, 0, 0]] < 0.01);
    assert!((tensor[[0, 2, 0, 0]] - 1.0).abs() < 1e-6);
  }

  #[test]
  fn four_channel_frames_are_resized() {
    let normalizer = FrameNormalizer::new(8, 8);

    // 左半红、右半蓝，BGRA 字节序
    let mut bgra = Vec::new();
    let mut rgba = Vec::new();
    for _ in 0..12 {
      for w in 0..16 {
        if w < 8 {
          bgra.extend_from_slice(&[0, 0, 255, 255]);
          rgba.extend_from_slice(&[255, 0, 0, 255]);
        } else {
          bgra.extend_from_slice(&[255, 0, 0, 255]);
          rgba.extend_from_slice(&[0, 0, 255, 255]);
        }
      }
    }
    let bgra = Frame::new(16, 12, PixelLayout::Bgra, bgra);
    let rgba = Frame::new(16, 12, PixelLayout::Rgba, rgba);

    for frame in [&bgra, &rgba] {
      let tensor = normalizer.normalize(frame);
      assert_eq!(tensor.shape(), &[1, 3, 8, 8]);
      let tensor = tensor.into_array();
      assert!(tensor[[0, 0, 4, 0]] > 0.95);
      assert!(tensor[[0, 2, 4, 0]] < 0.05);
      assert!(tensor[[0, 1, 4, 0]] < 0.05);
      assert!(tensor[[0, 0, 4, 7]] < 0.05);
      assert!(tensor[[0, 2, 4, 7]] > 0.95);
    }

    let flipped = normalizer.clone().flip_horizontal(true);
    for frame in [&bgra, &rgba] {
      let tensor = flipped.normalize(frame).into_array();
      assert!(tensor[[0, 2, 4, 0]] > 0.95);
      assert!(tensor[[0, 0, 4, 0]] < 0.05);
      assert!(tensor[[0, 0, 4, 7]] > 0.95);
      assert!(tensor[[0, 2, 4, 7]] < 0.05);
    }
  }

  #[test]
  fn undersized_frame_yields_zeros() {
    let normalizer = FrameNormalizer::new(16, 16);
    let frame = Frame::new(16, 16, PixelLayout::Rgb, vec![255u8; 10]);
    let tensor = normalizer.normalize(&frame);
    assert_eq!(tensor.shape(), &[1, 3, 16, 16]);
    assert!(tensor.as_array().iter().all(|v| *v == 0.0));

    let frame = Frame::new(0, 0, PixelLayout::Rgb, Vec::new());
    assert!(normalizer.normalize(&frame).as_array().iter().all(|v| *v == 0.0));
  }

  #[test]
  fn flip_is_explicit() {
    // 左红右蓝
    let data = vec![255, 0, 0, 0, 0, 255];
    let frame = Frame::new(2, 1, PixelLayout::Rgb, data);

    let plain = FrameNormalizer::new(2, 1).normalize(&frame).into_array();
    assert_eq!(plain[[0, 0, 0, 0]], 1.0);
    assert_eq!(plain[[0, 2, 0, 1]], 1.0);

    let flipped = FrameNormalizer::new(2, 1)
      .flip_horizontal(true)
      .normalize(&frame)
      .into_array();
    assert_eq!(flipped[[0, 0, 0, 0]], 0.0);
    assert_eq!(flipped[[0, 2, 0, 0]], 1.0);
    assert_eq!(flipped[[0, 0, 0, 1]], 1.0);
  }
}
