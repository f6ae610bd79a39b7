// 该文件是 Tanbi （探鼻） 项目的一部分。
// src/input.rs - 相机输入
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

use thiserror::Error;

use crate::{FromUrl, frame::Frame};

/// 相机源：按需提供最新一帧，并支持激活/停用
pub trait CameraSource {
  fn activate(&mut self) -> Result<(), CameraError>;

  fn deactivate(&mut self);

  /// `Ok(None)` 表示本次没有可用帧
  fn latest_frame(&mut self) -> Result<Option<Frame<'_>>, CameraError>;
}

impl<T: CameraSource + ?Sized> CameraSource for Box<T> {
  fn activate(&mut self) -> Result<(), CameraError> {
    (**self).activate()
  }

  fn deactivate(&mut self) {
    (**self).deactivate()
  }

  fn latest_frame(&mut self) -> Result<Option<Frame<'_>>, CameraError> {
    (**self).latest_frame()
  }
}

#[derive(Error, Debug)]
pub enum CameraError {
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("没有可用的相机画面: {0}")]
  FeedUnavailable(String),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("V4L error: {0}")]
  V4lError(String),
  #[error("Unsupported pixel format: {0}")]
  UnsupportedPixelFormat(String),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::ImageFileInput;

#[cfg(feature = "v4l_input")]
mod v4l_input;
#[cfg(feature = "v4l_input")]
pub use self::v4l_input::V4lInput;

pub enum InputWrapper {
  #[cfg(feature = "v4l_input")]
  V4l(V4lInput),
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
}

impl FromUrl for InputWrapper {
  type Error = CameraError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "v4l_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == V4lInput::SCHEME {
        return Ok(InputWrapper::V4l(V4lInput::from_url(url)?));
      }
    }
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        return Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?));
      }
    }
    let _ = url;
    Err(CameraError::SchemeMismatch)
  }
}

impl CameraSource for InputWrapper {
  fn activate(&mut self) -> Result<(), CameraError> {
    match self {
      #[cfg(feature = "v4l_input")]
      InputWrapper::V4l(input) => input.activate(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.activate(),
    }
  }

  fn deactivate(&mut self) {
    match self {
      #[cfg(feature = "v4l_input")]
      InputWrapper::V4l(input) => input.deactivate(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.deactivate(),
    }
  }

  fn latest_frame(&mut self) -> Result<Option<Frame<'_>>, CameraError> {
    match self {
      #[cfg(feature = "v4l_input")]
      InputWrapper::V4l(input) => input.latest_frame(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.latest_frame(),
    }
  }
}
