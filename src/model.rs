// 该文件是 Qianyan （钱眼） 项目的一部分。
// src/model.rs - 模型
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

use thiserror::Error;

use crate::{preprocess::Normalization, tensor::InputTensor};

mod ssd;
pub use self::ssd::{Ssd, SsdBuilder, SsdError};

#[cfg(feature = "model_replay")]
mod replay;
#[cfg(feature = "model_replay")]
pub use self::replay::ReplayGraph;

/// 预训练模型产物的加载/执行契约。产物格式对本 crate 不透明，
/// 任何能按图顺序返回输出张量的后端都可以接入；释放即 `Drop`。
pub trait Graph {
  fn execute(&self, input: &InputTensor) -> Result<Vec<Box<[f32]>>, GraphError>;
}

#[derive(Error, Debug)]
pub enum GraphError {
  #[error("推理执行失败: {0}")]
  Execution(String),
  #[error("模型产物错误: {0}")]
  Artifact(String),
}

/// 输出元组的排列顺序。不同导出图的顺序不同，必须作为引擎配置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
  BoxesScoresClasses,
  BoxesClassesScores,
}

/// 一个模型变体的全部约定：输入尺寸、归一化方案、
/// 输出排列与类别序号偏移。观测到的两种导出各占一个预设。
#[derive(Debug, Clone)]
pub struct ModelSpec {
  pub input_width: u32,
  pub input_height: u32,
  pub normalization: Normalization,
  pub layout: OutputLayout,
  pub class_offset: i64,
}

impl ModelSpec {
  /// 300x300 输入、[0,1] 归一化、boxes/scores/classes、1 起始类别。
  pub fn ssd300() -> Self {
    Self {
      input_width: 300,
      input_height: 300,
      normalization: Normalization::unit(),
      layout: OutputLayout::BoxesScoresClasses,
      class_offset: 1,
    }
  }

  /// 320x320 输入、[-1,1] 归一化、boxes/classes/scores、0 起始类别。
  pub fn ssd320() -> Self {
    Self {
      input_width: 320,
      input_height: 320,
      normalization: Normalization::symmetric(),
      layout: OutputLayout::BoxesClassesScores,
      class_offset: 0,
    }
  }

  pub fn preset(name: &str) -> Option<Self> {
    match name {
      "ssd300" => Some(Self::ssd300()),
      "ssd320" => Some(Self::ssd320()),
      _ => None,
    }
  }
}

// 全局存活输出缓冲计数，与输入张量的计数遵循同一迭代内释放的约定。
static LIVE_RAW_OUTPUTS: AtomicUsize = AtomicUsize::new(0);

/// 当前尚未释放的原始输出缓冲数量。
pub fn live_raw_outputs() -> usize {
  LIVE_RAW_OUTPUTS.load(Ordering::SeqCst)
}

/// 一次前向传播的原始输出：按检测展平的归一化框
/// [ymin, xmin, ymax, xmax]、类别值、置信度，以及可选的有效检测数。
/// 每帧产生一份，被后处理消费后即释放。
#[derive(Debug)]
pub struct RawOutputs {
  pub boxes: Box<[f32]>,
  pub classes: Box<[f32]>,
  pub scores: Box<[f32]>,
  pub count: Option<usize>,
}

impl RawOutputs {
  pub fn new(
    boxes: Box<[f32]>,
    classes: Box<[f32]>,
    scores: Box<[f32]>,
    count: Option<usize>,
  ) -> Self {
    LIVE_RAW_OUTPUTS.fetch_add(1, Ordering::SeqCst);
    Self {
      boxes,
      classes,
      scores,
      count,
    }
  }

  /// 待扫描的候选数量：有效检测数（若导出提供）与各数组长度的下界。
  pub fn detections(&self) -> usize {
    let n = self
      .scores
      .len()
      .min(self.classes.len())
      .min(self.boxes.len() / 4);
    match self.count {
      Some(count) => count.min(n),
      None => n,
    }
  }
}

impl Drop for RawOutputs {
  fn drop(&mut self) {
    LIVE_RAW_OUTPUTS.fetch_sub(1, Ordering::SeqCst);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn preset_lookup() {
    assert_eq!(ModelSpec::ssd300().layout, OutputLayout::BoxesScoresClasses);
    assert_eq!(ModelSpec::ssd320().layout, OutputLayout::BoxesClassesScores);
    assert!(ModelSpec::preset("ssd300").is_some());
    assert!(ModelSpec::preset("ssd320").is_some());
    assert!(ModelSpec::preset("ssd512").is_none());
  }

  #[test]
  fn raw_outputs_count_is_bounded_by_arrays() {
    let raw = RawOutputs::new(
      vec![0.0; 8].into_boxed_slice(),
      vec![0.0; 2].into_boxed_slice(),
      vec![0.0; 2].into_boxed_slice(),
      Some(10),
    );
    assert_eq!(raw.detections(), 2);

    let raw = RawOutputs::new(
      vec![0.0; 8].into_boxed_slice(),
      vec![0.0; 2].into_boxed_slice(),
      vec![0.0; 2].into_boxed_slice(),
      Some(1),
    );
    assert_eq!(raw.detections(), 1);
  }
}
