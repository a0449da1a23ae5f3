// 该文件是 Qianyan （钱眼） 项目的一部分。
// src/preprocess.rs - 帧预处理
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

use image::imageops::{self, FilterType};

use crate::{frame::RgbFrame, tensor::InputTensor};

/// 像素归一化方案 `v' = (v - bias) / scale`。
/// 不同的模型导出期望不同的输入范围，必须按配置选择而不是写死。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
  pub scale: f32,
  pub bias: f32,
}

impl Normalization {
  /// 无符号 [0, 1] 归一化，对应导出里的 `div(255.0)`。
  pub fn unit() -> Self {
    Self {
      scale: 255.0,
      bias: 0.0,
    }
  }

  /// 对称 [-1, 1] 归一化。
  pub fn symmetric() -> Self {
    Self {
      scale: 127.5,
      bias: 127.5,
    }
  }

  pub fn apply(&self, value: u8) -> f32 {
    (value as f32 - self.bias) / self.scale
  }
}

/// 把一帧图像整理成模型输入张量：双线性缩放到目标尺寸、
/// 转为 f32 并归一化、补上批大小为 1 的维度。
/// 中间缩放缓冲区在返回前全部释放。
pub fn prepare<const W: u32, const H: u32>(
  frame: &RgbFrame<W, H>,
  target: (u32, u32),
  norm: &Normalization,
) -> InputTensor {
  let (tw, th) = target;
  let image = frame.to_rgb_image();
  let resized = if (W, H) == (tw, th) {
    image
  } else {
    imageops::resize(&image, tw, th, FilterType::Triangle)
  };

  let data: Vec<f32> = resized.into_raw().into_iter().map(|v| norm.apply(v)).collect();
  InputTensor::new(data, tw, th)
}
