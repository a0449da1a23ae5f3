// 该文件是 Qianyan （钱眼） 项目的一部分。
// src/frame.rs - RGB 帧定义
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

use image::{ImageBuffer, Rgb, RgbImage};

const RGB_CHANNELS: usize = 3;

/// 摄像头送入检测循环的一帧图像，紧密排布的 RGB8 像素（HWC）。
/// 帧的宽高是检测框反归一化的唯一依据。
#[derive(Debug, Clone)]
pub struct RgbFrame<const W: u32, const H: u32> {
  data: Box<[u8]>,
}

impl<const W: u32, const H: u32> From<Vec<u8>> for RgbFrame<W, H> {
  fn from(data: Vec<u8>) -> Self {
    if data.len() != (RGB_CHANNELS * W as usize * H as usize) {
      panic!(
        "数据长度不匹配: 期望长度 {}, 实际长度 {}",
        RGB_CHANNELS * W as usize * H as usize,
        data.len()
      );
    }

    Self {
      data: data.into_boxed_slice(),
    }
  }
}

impl<const W: u32, const H: u32> Default for RgbFrame<W, H> {
  fn default() -> Self {
    let size = RGB_CHANNELS * (W as usize) * (H as usize);
    let data = vec![0u8; size].into_boxed_slice();
    Self { data }
  }
}

impl<const W: u32, const H: u32> RgbFrame<W, H> {
  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_rgb(&self) -> &[u8] {
    &self.data
  }

  /// 转为 `RgbImage` 以便缩放、绘制或保存。
  pub fn to_rgb_image(&self) -> RgbImage {
    ImageBuffer::from_fn(W, H, |x, y| {
      let idx = ((y * W + x) as usize) * RGB_CHANNELS;
      Rgb([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    })
  }
}

impl<const W: u32, const H: u32> AsMut<[u8]> for RgbFrame<W, H> {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl<const W: u32, const H: u32> From<RgbImage> for RgbFrame<W, H> {
  fn from(image: RgbImage) -> Self {
    if image.dimensions() != (W, H) {
      panic!(
        "图像尺寸不匹配: 期望 {}x{}, 实际 {}x{}",
        W,
        H,
        image.width(),
        image.height()
      );
    }

    RgbFrame::from(image.into_raw())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn frame_from_vec_roundtrip() {
    let mut data = vec![0u8; 4 * 4 * 3];
    data[0] = 17;
    data[1] = 34;
    data[2] = 51;
    let frame = RgbFrame::<4, 4>::from(data);
    assert_eq!(frame.width(), 4);
    assert_eq!(frame.height(), 4);
    assert_eq!(frame.channels(), 3);

    let image = frame.to_rgb_image();
    assert_eq!(image.get_pixel(0, 0), &Rgb([17, 34, 51]));
  }

  #[test]
  #[should_panic]
  fn frame_rejects_wrong_length() {
    let _ = RgbFrame::<4, 4>::from(vec![0u8; 7]);
  }
}
