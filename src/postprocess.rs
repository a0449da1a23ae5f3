// 该文件是 Qianyan （钱眼） 项目的一部分。
// src/postprocess.rs - 检测结果后处理
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

use crate::{labels::LabelTable, model::RawOutputs};

/// 帧像素坐标系下的检测框，经过裁剪后始终落在 [0,W]x[0,H] 内。
#[derive(Debug, Clone, PartialEq)]
pub struct PixelRect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

/// 可直接绘制的检测记录，每帧重建，不跨帧保留。
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub label: String,
  pub score: f32,
  pub rect: PixelRect,
}

/// 把一帧原始输出整理成检测记录序列：
/// 按阈值过滤（严格大于）、归一化坐标反算到帧像素并裁剪、解析标签。
/// 序列是惰性的，每次调用重新计算，产出顺序即过滤后的输入顺序。
pub fn process<'a>(
  raw: &'a RawOutputs,
  frame: (u32, u32),
  threshold: f32,
  labels: &'a LabelTable,
) -> DetectionIter<'a> {
  DetectionIter {
    raw,
    width: frame.0 as f32,
    height: frame.1 as f32,
    threshold,
    labels,
    index: 0,
    limit: raw.detections(),
  }
}

pub struct DetectionIter<'a> {
  raw: &'a RawOutputs,
  width: f32,
  height: f32,
  threshold: f32,
  labels: &'a LabelTable,
  index: usize,
  limit: usize,
}

impl Iterator for DetectionIter<'_> {
  type Item = Detection;

  fn next(&mut self) -> Option<Self::Item> {
    while self.index < self.limit {
      let i = self.index;
      self.index += 1;

      let score = self.raw.scores[i];
      // 等于阈值的候选被排除，NaN 同样被排除
      if !(score > self.threshold) {
        continue;
      }

      let ymin = self.raw.boxes[i * 4];
      let xmin = self.raw.boxes[i * 4 + 1];
      let ymax = self.raw.boxes[i * 4 + 2];
      let xmax = self.raw.boxes[i * 4 + 3];

      // 模型在帧边缘可能给出越界的归一化坐标，越界裁剪由这里负责
      let x = (xmin * self.width).clamp(0.0, self.width);
      let y = (ymin * self.height).clamp(0.0, self.height);
      let width = ((xmax - xmin) * self.width).clamp(0.0, self.width - x);
      let height = ((ymax - ymin) * self.height).clamp(0.0, self.height - y);

      return Some(Detection {
        label: self.labels.resolve(self.raw.classes[i]),
        score: score.clamp(0.0, 1.0),
        rect: PixelRect {
          x,
          y,
          width,
          height,
        },
      });
    }
    None
  }
}
