// 该文件是 Qianyan （钱眼） 项目的一部分。
// src/model/replay.rs - 回放式推理后端
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

use tracing::debug;

use crate::{
  model::{Graph, GraphError},
  tensor::InputTensor,
};

/// 按脚本回放的 `Graph` 后端：从 JSON 产物读取逐帧输出并循环播放。
/// 产物格式:
/// `{ "frames": [ { "boxes": [[ymin,xmin,ymax,xmax], ...],
///                  "scores": [...], "classes": [...], "count": 2 }, ... ] }`
/// 输出顺序固定为 boxes/scores/classes(/count)。
pub struct ReplayGraph {
  frames: Vec<Vec<Box<[f32]>>>,
  cursor: AtomicUsize,
}

impl ReplayGraph {
  pub fn from_slice(data: &[u8]) -> Result<Self, GraphError> {
    let value: serde_json::Value = serde_json::from_slice(data)
      .map_err(|e| GraphError::Artifact(format!("回放脚本解析失败: {}", e)))?;

    let frames = value
      .get("frames")
      .and_then(serde_json::Value::as_array)
      .ok_or_else(|| GraphError::Artifact("回放脚本缺少 frames 数组".to_string()))?;

    let mut parsed = Vec::with_capacity(frames.len());
    for (index, frame) in frames.iter().enumerate() {
      parsed.push(parse_frame(frame).map_err(|e| {
        GraphError::Artifact(format!("回放脚本第 {} 帧无效: {}", index, e))
      })?);
    }

    Ok(Self::from_outputs(parsed))
  }

  /// 直接用现成的输出张量组脚本，供测试与演示使用。
  pub fn from_outputs(frames: Vec<Vec<Box<[f32]>>>) -> Self {
    Self {
      frames,
      cursor: AtomicUsize::new(0),
    }
  }
}

fn parse_frame(frame: &serde_json::Value) -> Result<Vec<Box<[f32]>>, String> {
  let boxes = frame
    .get("boxes")
    .and_then(serde_json::Value::as_array)
    .ok_or("缺少 boxes")?;
  let mut flat_boxes = Vec::with_capacity(boxes.len() * 4);
  for item in boxes {
    let corners = item.as_array().filter(|a| a.len() == 4).ok_or("检测框必须是 4 元组")?;
    for corner in corners {
      flat_boxes.push(corner.as_f64().ok_or("检测框坐标必须是数值")? as f32);
    }
  }

  let scores = parse_numbers(frame.get("scores").ok_or("缺少 scores")?)?;
  let classes = parse_numbers(frame.get("classes").ok_or("缺少 classes")?)?;

  let mut outputs = vec![
    flat_boxes.into_boxed_slice(),
    scores.into_boxed_slice(),
    classes.into_boxed_slice(),
  ];
  if let Some(count) = frame.get("count") {
    let count = count.as_f64().ok_or("count 必须是数值")? as f32;
    outputs.push(vec![count].into_boxed_slice());
  }
  Ok(outputs)
}

fn parse_numbers(value: &serde_json::Value) -> Result<Vec<f32>, String> {
  value
    .as_array()
    .ok_or("期望数值数组")?
    .iter()
    .map(|v| v.as_f64().map(|v| v as f32).ok_or("期望数值".to_string()))
    .collect()
}

impl Graph for ReplayGraph {
  fn execute(&self, _input: &InputTensor) -> Result<Vec<Box<[f32]>>, GraphError> {
    if self.frames.is_empty() {
      return Err(GraphError::Execution("回放脚本为空".to_string()));
    }

    let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.frames.len();
    debug!("回放脚本第 {} 帧", index);
    Ok(self.frames[index].clone())
  }
}
