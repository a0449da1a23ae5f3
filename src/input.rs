// 该文件是 Qianyan （钱眼） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use crate::{FromUrl, frame::RgbFrame};

/// 活动帧源：阻塞拉取最新解码的一帧。
/// `Ok(None)` 表示流自然结束；错误表示源不可恢复。
pub trait FrameSource<const W: u32, const H: u32> {
  type Error: std::error::Error;

  fn current_frame(&mut self) -> Result<Option<RgbFrame<W, H>>, Self::Error>;
}

#[cfg(feature = "camera_v4l")]
mod camera;
#[cfg(feature = "camera_v4l")]
pub use self::camera::{CameraInput, CameraInputError};

#[cfg(feature = "read_image_file")]
mod image_file;
#[cfg(feature = "read_image_file")]
pub use self::image_file::{ImageFileInput, ImageFileInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "camera_v4l")]
  #[error("摄像头输入错误: {0}")]
  CameraInputError(#[from] CameraInputError),
  #[cfg(feature = "read_image_file")]
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum InputWrapper<const W: u32, const H: u32> {
  #[cfg(feature = "camera_v4l")]
  Camera(CameraInput<W, H>),
  #[cfg(feature = "read_image_file")]
  ImageFile(ImageFileInput<W, H>),
}

impl<const W: u32, const H: u32> FromUrl for InputWrapper<W, H> {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "camera_v4l")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == CameraInput::<W, H>::SCHEME {
        let input = CameraInput::from_url(url)?;
        return Ok(InputWrapper::Camera(input));
      }
    }
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::<W, H>::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ImageFile(input));
      }
    }
    Err(InputError::SchemeMismatch)
  }
}

impl<const W: u32, const H: u32> FrameSource<W, H> for InputWrapper<W, H> {
  type Error = InputError;

  fn current_frame(&mut self) -> Result<Option<RgbFrame<W, H>>, Self::Error> {
    match self {
      #[cfg(feature = "camera_v4l")]
      InputWrapper::Camera(input) => input.current_frame().map_err(InputError::from),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ImageFile(input) => input.current_frame().map_err(InputError::from),
    }
  }
}
