// 该文件是 Qianyan （钱眼） 项目的一部分。
// src/labels.rs - 类别标签表
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

use std::path::Path;

use thiserror::Error;

/// 奈拉纸币模型的内置标签，与导出图的类别序号按 1 起始对齐。
pub const NAIRA_LABELS: [&str; 7] = [
  "10 Naira",
  "20 Naira",
  "50 Naira",
  "100 Naira",
  "200 Naira",
  "500 Naira",
  "1000 Naira",
];

#[derive(Error, Debug)]
pub enum LabelTableError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标签文件解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("标签文件必须是字符串数组")]
  NotAStringArray,
}

/// 固定的有序标签表。类别序号减去 offset 后查表；
/// offset 取 0 或 1，取决于模型导出约定，是真实的差一错误来源。
#[derive(Debug, Clone)]
pub struct LabelTable {
  names: Vec<String>,
  offset: i64,
}

impl LabelTable {
  pub fn new(names: Vec<String>, offset: i64) -> Self {
    Self { names, offset }
  }

  pub fn naira() -> Self {
    Self::new(NAIRA_LABELS.iter().map(|s| s.to_string()).collect(), 1)
  }

  /// 从 JSON 字符串数组文件加载标签表。
  pub fn from_json_file(path: &Path, offset: i64) -> Result<Self, LabelTableError> {
    let data = std::fs::read(path)?;
    Self::from_json_slice(&data, offset)
  }

  pub fn from_json_slice(data: &[u8], offset: i64) -> Result<Self, LabelTableError> {
    let value: serde_json::Value = serde_json::from_slice(data)?;
    let array = value.as_array().ok_or(LabelTableError::NotAStringArray)?;
    let names = array
      .iter()
      .map(|v| {
        v.as_str()
          .map(String::from)
          .ok_or(LabelTableError::NotAStringArray)
      })
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self::new(names, offset))
  }

  pub fn with_offset(mut self, offset: i64) -> Self {
    self.offset = offset;
    self
  }

  pub fn offset(&self) -> i64 {
    self.offset
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&str> {
    self.names.get(index).map(String::as_str)
  }

  /// 把模型输出的类别值解析为标签。全函数对任意 f32 输入有定义：
  /// 越界、负数、非有限值都落到兜底标签，绝不中断渲染。
  pub fn resolve(&self, class: f32) -> String {
    if class.is_finite() {
      let index = class.round() as i64 - self.offset;
      if index >= 0
        && let Some(name) = self.names.get(index as usize)
      {
        return name.clone();
      }
    }
    format!("unknown({})", class)
  }
}
