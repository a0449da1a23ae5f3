// 该文件是 Qianyan （钱眼） 项目的一部分。
// src/input/image_file.rs - 图像文件输入
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

use image::{ImageReader, imageops};
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbFrame, input::FrameSource};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 把一张静态图片当作帧源，用于测试与演示。
/// 默认只产出一帧；带 `?repeat` 查询参数时循环产出同一帧。
pub struct ImageFileInput<const W: u32, const H: u32> {
  frame: RgbFrame<W, H>,
  repeat: bool,
  served: bool,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for ImageFileInput<W, H> {
  const SCHEME: &'static str = "image";
}

impl<const W: u32, const H: u32> FromUrl for ImageFileInput<W, H> {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageFileInputError::SchemeMismatch(format!(
        "期望输入方案 '{}', 实际方案 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let image = ImageReader::open(url.path())?.decode()?.into_rgb8();
    let image = if image.dimensions() == (W, H) {
      image
    } else {
      imageops::resize(&image, W, H, imageops::FilterType::Triangle)
    };

    let repeat = url.query_pairs().any(|(k, _)| k == "repeat");

    Ok(ImageFileInput {
      frame: RgbFrame::from(image),
      repeat,
      served: false,
    })
  }
}

impl<const W: u32, const H: u32> FrameSource<W, H> for ImageFileInput<W, H> {
  type Error = ImageFileInputError;

  fn current_frame(&mut self) -> Result<Option<RgbFrame<W, H>>, Self::Error> {
    if self.served && !self.repeat {
      return Ok(None);
    }
    self.served = true;
    Ok(Some(self.frame.clone()))
  }
}
