// 该文件是 Tanbi （探鼻） 项目的一部分。
// src/input/v4l_input.rs - V4L 视频输入
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

use tracing::{debug, error, info, warn};
use url::Url;
use v4l::{
  Device, FourCC,
  buffer::Type,
  io::{mmap::Stream, traits::CaptureStream},
  video::Capture,
};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, PixelLayout},
  input::{CameraError, CameraSource},
};

const V4L_DEFAULT_DEVICE: &str = "/dev/video0";
// 队列越深，取到的帧越旧
const V4L_BUFFER_COUNT: u32 = 2;

/// 设备原生像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelFormat {
  /// 可直接交给预处理的交错格式
  Packed(PixelLayout),
  Yuyv,
  Mjpeg,
}

impl PixelFormat {
  fn from_fourcc(fourcc: &FourCC) -> Option<Self> {
    match &fourcc.repr {
      b"RGB3" => Some(PixelFormat::Packed(PixelLayout::Rgb)),
      b"BGR3" => Some(PixelFormat::Packed(PixelLayout::Bgr)),
      // 内存字节序为 R G B A
      b"AB24" | b"XB24" => Some(PixelFormat::Packed(PixelLayout::Rgba)),
      // 内存字节序为 B G R A
      b"AR24" | b"XR24" => Some(PixelFormat::Packed(PixelLayout::Bgra)),
      b"YUYV" => Some(PixelFormat::Yuyv),
      b"MJPG" => Some(PixelFormat::Mjpeg),
      _ => None,
    }
  }
}

pub struct V4lInput {
  device_path: String,
  device: Device,
  width: usize,
  height: usize,
  stride: usize,
  pixel: PixelFormat,
  stream: Option<Stream<'static>>,
  buffer: Vec<u8>,
}

impl FromUrlWithScheme for V4lInput {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lInput {
  type Error = CameraError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(CameraError::SchemeMismatch);
    }

    // v4l:///dev/video0
    let device_path = if url.path().is_empty() || url.path() == "/" {
      V4L_DEFAULT_DEVICE.to_string()
    } else {
      url.path().to_string()
    };

    V4lInput::open(&device_path)
  }
}

impl V4lInput {
  /// 打开设备并使用它提供的第一种格式
  pub fn open(device_path: &str) -> Result<Self, CameraError> {
    let device = Device::with_path(device_path)
      .map_err(|e| CameraError::FeedUnavailable(format!("{}: {}", device_path, e)))?;

    let formats = device
      .enum_formats()
      .map_err(|e| CameraError::V4lError(e.to_string()))?;
    let first = formats
      .first()
      .ok_or_else(|| CameraError::FeedUnavailable(format!("{}: 设备没有可用格式", device_path)))?;
    debug!("设备提供的第一种格式: {} ({})", first.fourcc, first.description);

    let mut format = device
      .format()
      .map_err(|e| CameraError::V4lError(e.to_string()))?;
    format.fourcc = first.fourcc;
    let format = device
      .set_format(&format)
      .map_err(|e| CameraError::V4lError(e.to_string()))?;

    let pixel = PixelFormat::from_fourcc(&format.fourcc)
      .ok_or_else(|| CameraError::UnsupportedPixelFormat(format.fourcc.to_string()))?;

    info!(
      "打开相机 {}: {}x{} {}",
      device_path, format.width, format.height, format.fourcc
    );

    Ok(V4lInput {
      device_path: device_path.to_string(),
      device,
      width: format.width as usize,
      height: format.height as usize,
      stride: format.stride as usize,
      pixel,
      stream: None,
      buffer: Vec::new(),
    })
  }
}

impl CameraSource for V4lInput {
  fn activate(&mut self) -> Result<(), CameraError> {
    if self.stream.is_some() {
      return Ok(());
    }
    let stream = Stream::with_buffers(&self.device, Type::VideoCapture, V4L_BUFFER_COUNT)
      .map_err(|e| CameraError::FeedUnavailable(format!("{}: {}", self.device_path, e)))?;
    self.stream = Some(stream);
    info!("相机已激活: {}", self.device_path);
    Ok(())
  }

  fn deactivate(&mut self) {
    if self.stream.take().is_some() {
      info!("相机已停用: {}", self.device_path);
    }
  }

  fn latest_frame(&mut self) -> Result<Option<Frame<'_>>, CameraError> {
    let Some(stream) = self.stream.as_mut() else {
      return Ok(None);
    };

    let (data, meta) = stream.next().map_err(|e| {
      error!("Failed to capture frame: {}", e);
      CameraError::IoError(e)
    })?;
    let data = &data[..(meta.bytesused as usize).min(data.len())];

    match self.pixel {
      PixelFormat::Packed(layout) => {
        let row = self.width * layout.channels();
        let stride = self.stride.max(row);
        self.buffer.clear();
        for line in data.chunks(stride).take(self.height) {
          self.buffer.extend_from_slice(&line[..row.min(line.len())]);
        }
        Ok(Some(Frame::new(
          self.width,
          self.height,
          layout,
          self.buffer.as_slice(),
        )))
      }
      PixelFormat::Yuyv => {
        let stride = self.stride.max(self.width * 2);
        yuyv_to_rgb(data, self.width, self.height, stride, &mut self.buffer);
        Ok(Some(Frame::new(
          self.width,
          self.height,
          PixelLayout::Rgb,
          self.buffer.as_slice(),
        )))
      }
      PixelFormat::Mjpeg => {
        match image::load_from_memory_with_format(data, image::ImageFormat::Jpeg) {
          Ok(image) => {
            let image = image.into_rgb8();
            let (width, height) = image.dimensions();
            self.buffer = image.into_raw();
            Ok(Some(Frame::new(
              width as usize,
              height as usize,
              PixelLayout::Rgb,
              self.buffer.as_slice(),
            )))
          }
          Err(e) => {
            // 偶发的截断 JPEG，跳过本帧
            warn!("MJPEG 解码失败: {}", e);
            Ok(None)
          }
        }
      }
    }
  }
}

/// BT.601 有限范围 YUYV 转 RGB
fn yuyv_to_rgb(data: &[u8], width: usize, height: usize, stride: usize, out: &mut Vec<u8>) {
  out.clear();
  out.reserve(width * height * 3);
  for line in data.chunks(stride).take(height) {
    let line = &line[..(width * 2).min(line.len())];
    for chunk in line.chunks_exact(4) {
      let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
      out.extend_from_slice(&yuv_to_rgb(y0, u, v));
      out.extend_from_slice(&yuv_to_rgb(y1, u, v));
    }
  }
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
  let c = (y as f32 - 16.0) * 1.164;
  let d = u as f32 - 128.0;
  let e = v as f32 - 128.0;
  let r = c + 1.596 * e;
  let g = c - 0.392 * d - 0.813 * e;
  let b = c + 2.017 * d;
  [
    r.round().clamp(0.0, 255.0) as u8,
    g.round().clamp(0.0, 255.0) as u8,
    b.round().clamp(0.0, 255.0) as u8,
  ]
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fourcc_mapping() {
    assert_eq!(
      PixelFormat::from_fourcc(&FourCC::new(b"BGR3")),
      Some(PixelFormat::Packed(PixelLayout::Bgr))
    );
    assert_eq!(
      PixelFormat::from_fourcc(&FourCC::new(b"YUYV")),
      Some(PixelFormat::Yuyv)
    );
    assert_eq!(PixelFormat::from_fourcc(&FourCC::new(b"NV12")), None);
  }

  #[test]
  fn yuyv_grey_and_padding() {
    // 两行，每行 2 像素，行尾有 4 字节填充
    let data = [
      128, 128, 235, 128, 0, 0, 0, 0, //
      16, 128, 16, 128, 0, 0, 0, 0,
    ];
    let mut out = Vec::new();
    yuyv_to_rgb(&data, 2, 2, 8, &mut out);
    assert_eq!(out.len(), 2 * 2 * 3);
    assert_eq!(&out[3..6], &[255, 255, 255]);
    assert_eq!(&out[6..9], &[0, 0, 0]);
    assert!(out[0] == out[1] && out[1] == out[2]);
  }

  #[test]
  fn capture_queue_stays_shallow() {
    assert!((1..=2).contains(&V4L_BUFFER_COUNT));
  }

  #[test]
  fn missing_device_is_unavailable() {
    let url = Url::parse("v4l:///dev/tanbi-missing-video").unwrap();
    assert!(matches!(
      V4lInput::from_url(&url),
      Err(CameraError::FeedUnavailable(_))
    ));
  }
}
