// 该文件是 Tanbi （探鼻） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, PixelLayout},
  input::{CameraError, CameraSource},
};

/// 每次 tick 都返回同一张静态图片，用于离线调试
pub struct ImageFileInput {
  image: RgbImage,
  active: bool,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
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

    let path = url.path();
    let image = ImageReader::open(path)?.decode()?;
    info!("读取图像文件: {} ({}x{})", path, image.width(), image.height());

    Ok(ImageFileInput::from(image.into_rgb8()))
  }
}

impl From<RgbImage> for ImageFileInput {
  fn from(image: RgbImage) -> Self {
    Self {
      image,
      active: false,
    }
  }
}

impl CameraSource for ImageFileInput {
  fn activate(&mut self) -> Result<(), CameraError> {
    self.active = true;
    Ok(())
  }

  fn deactivate(&mut self) {
    self.active = false;
  }

  fn latest_frame(&mut self) -> Result<Option<Frame<'_>>, CameraError> {
    if !self.active {
      return Ok(None);
    }
    let (width, height) = self.image.dimensions();
    Ok(Some(Frame::new(
      width as usize,
      height as usize,
      PixelLayout::Rgb,
      self.image.as_raw().as_slice(),
    )))
  }
}
