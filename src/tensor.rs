// 该文件是 Qianyan （钱眼） 项目的一部分。
// src/tensor.rs - 模型输入张量
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

use std::sync::atomic::{AtomicUsize, Ordering};

const TENSOR_CHANNELS: usize = 3;

// 全局存活张量计数，循环每次迭代结束后应回落到创建前的水平。
static LIVE_TENSORS: AtomicUsize = AtomicUsize::new(0);

/// 当前尚未释放的输入张量数量。
pub fn live_tensors() -> usize {
  LIVE_TENSORS.load(Ordering::SeqCst)
}

/// 模型的输入张量，形状固定为 [1, H, W, 3]，f32 存储。
/// 由预处理器创建，推理结束后在同一次迭代内释放，绝不跨帧保留。
#[derive(Debug)]
pub struct InputTensor {
  data: Box<[f32]>,
  width: u32,
  height: u32,
}

impl InputTensor {
  pub fn new(data: Vec<f32>, width: u32, height: u32) -> Self {
    let expected = TENSOR_CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      panic!("张量长度不匹配: 期望长度 {}, 实际长度 {}", expected, data.len());
    }

    LIVE_TENSORS.fetch_add(1, Ordering::SeqCst);
    Self {
      data: data.into_boxed_slice(),
      width,
      height,
    }
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, self.height as usize, self.width as usize, TENSOR_CHANNELS]
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn as_f32(&self) -> &[f32] {
    &self.data
  }
}

impl Drop for InputTensor {
  fn drop(&mut self) {
    LIVE_TENSORS.fetch_sub(1, Ordering::SeqCst);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tensor_shape_is_nhwc() {
    let tensor = InputTensor::new(vec![0.0; 300 * 300 * 3], 300, 300);
    assert_eq!(tensor.shape(), [1, 300, 300, 3]);
    assert_eq!(tensor.as_f32().len(), 300 * 300 * 3);
  }

  #[test]
  #[should_panic]
  fn tensor_rejects_wrong_length() {
    let _ = InputTensor::new(vec![0.0; 5], 300, 300);
  }
}
