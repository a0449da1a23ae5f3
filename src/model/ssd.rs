// 该文件是 Qianyan （钱眼） 项目的一部分。
// src/model/ssd.rs - SSD 推理引擎
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
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Graph, GraphError, ModelSpec, OutputLayout, RawOutputs},
  tensor::InputTensor,
};

#[derive(Error, Debug)]
pub enum SsdError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("未知的模型预设: {0}")]
  UnknownPreset(String),
  #[error("无效的查询参数 {0}: {1}")]
  InvalidQuery(String, String),
  #[error("模型加载错误: {0}")]
  LoadError(#[from] std::io::Error),
  #[error("图执行错误: {0}")]
  GraphError(#[from] GraphError),
  #[error("模型输出数量无效: 期望 3 或 4 个输出, 实际 {0}")]
  OutputArity(usize),
  #[error("模型输出大小不一致: 检测框 {boxes}, 得分 {scores}, 类别 {classes}")]
  OutputShape {
    boxes: usize,
    scores: usize,
    classes: usize,
  },
}

/// SSD 风格检测引擎：持有已加载的图，按配置的输出排列
/// 把一次前向传播的张量整理成 `RawOutputs`。
pub struct Ssd<G: Graph> {
  graph: G,
  spec: ModelSpec,
}

impl<G: Graph> Ssd<G> {
  pub fn new(graph: G, spec: ModelSpec) -> Self {
    Self { graph, spec }
  }

  pub fn spec(&self) -> &ModelSpec {
    &self.spec
  }

  /// 执行一次前向传播。单帧失败对循环是可恢复的：
  /// 调用方跳过该帧的渲染，下一帧继续。
  pub fn execute(&self, input: &InputTensor) -> Result<RawOutputs, SsdError> {
    debug!("执行模型推理, 输入形状 {:?}", input.shape());
    let mut outputs = self.graph.execute(input)?;

    if outputs.len() < 3 || outputs.len() > 4 {
      error!("模型输出数量无效: {}", outputs.len());
      return Err(SsdError::OutputArity(outputs.len()));
    }

    let count = if outputs.len() == 4 {
      outputs.pop().and_then(|t| t.first().map(|&v| v as usize))
    } else {
      None
    };

    let third = outputs.pop();
    let second = outputs.pop();
    let first = outputs.pop();
    let (Some(boxes), Some(second), Some(third)) = (first, second, third) else {
      return Err(SsdError::OutputArity(0));
    };

    let (scores, classes) = match self.spec.layout {
      OutputLayout::BoxesScoresClasses => (second, third),
      OutputLayout::BoxesClassesScores => (third, second),
    };

    if boxes.len() != scores.len() * 4 || classes.len() != scores.len() {
      error!(
        "模型输出大小不一致: 检测框 {}, 得分 {}, 类别 {}",
        boxes.len(),
        scores.len(),
        classes.len()
      );
      return Err(SsdError::OutputShape {
        boxes: boxes.len(),
        scores: scores.len(),
        classes: classes.len(),
      });
    }

    debug!("模型输出 {} 个候选, 有效数 {:?}", scores.len(), count);
    Ok(RawOutputs::new(boxes, classes, scores, count))
  }
}

/// 从 `ssd://` URL 构造引擎：路径指向模型产物，
/// 查询参数选择预设（`preset`）、覆盖类别偏移（`offset`）
/// 与默认阈值（`threshold`）。
pub struct SsdBuilder {
  artifact_path: String,
  spec: ModelSpec,
  threshold: Option<f32>,
}

impl FromUrlWithScheme for SsdBuilder {
  const SCHEME: &'static str = "ssd";
}

impl FromUrl for SsdBuilder {
  type Error = SsdError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(SsdError::SchemeMismatch(format!(
        "期望模型方案 '{}', 实际方案 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    // 先选定预设，再叠加单项覆盖，避免参数顺序影响结果
    let mut spec = ModelSpec::ssd300();
    for (key, value) in url.query_pairs() {
      if key == "preset" {
        spec = ModelSpec::preset(&value)
          .ok_or_else(|| SsdError::UnknownPreset(value.to_string()))?;
      }
    }

    let mut threshold = None;
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "offset" => {
          spec.class_offset = value
            .parse()
            .map_err(|_| SsdError::InvalidQuery("offset".to_string(), value.to_string()))?;
        }
        "threshold" => {
          threshold = Some(
            value
              .parse()
              .map_err(|_| SsdError::InvalidQuery("threshold".to_string(), value.to_string()))?,
          );
        }
        _ => {}
      }
    }

    Ok(SsdBuilder {
      artifact_path: url.path().to_string(),
      spec,
      threshold,
    })
  }
}

impl SsdBuilder {
  pub fn spec(&self) -> &ModelSpec {
    &self.spec
  }

  pub fn threshold(&self) -> Option<f32> {
    self.threshold
  }

  pub fn with_spec(mut self, spec: ModelSpec) -> Self {
    self.spec = spec;
    self
  }

  /// 用外部已建好的图组装引擎。
  pub fn build<G: Graph>(self, graph: G) -> Ssd<G> {
    Ssd::new(graph, self.spec)
  }

  /// 加载回放产物并组装引擎。加载失败对整个检测器是致命的。
  #[cfg(feature = "model_replay")]
  pub fn build_replay(self) -> Result<Ssd<super::ReplayGraph>, SsdError> {
    info!("加载模型文件: {}", self.artifact_path);
    let data = std::fs::read(&self.artifact_path)?;
    debug!("模型文件大小: {:.2} KB", data.len() as f64 / 1024.0);

    let graph = super::ReplayGraph::from_slice(&data)?;
    info!("模型加载完成");

    Ok(Ssd::new(graph, self.spec))
  }
}
