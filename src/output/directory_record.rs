// 该文件是 Qianyan （钱眼） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{Datelike, Utc};
use image::RgbImage;
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, output::Render, postprocess::Detection};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 把叠加后的帧按日期分目录存档。默认只保存有检测的帧，
/// `?always` 对每帧都存；`?record` 额外写一份 JSON 行格式的检测记录。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  record: bool,
  always: bool,
  frame_counter: Mutex<u16>,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = url.query_pairs().any(|(k, _)| k == "record");
    let always = url.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(url.path()),
      record,
      always,
      frame_counter: Mutex::new(0),
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    let mut counter = match self.frame_counter.lock() {
      Ok(counter) => counter,
      Err(poisoned) => poisoned.into_inner(),
    };
    *counter = counter.wrapping_add(1);
    *counter
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn write_records(
    &self,
    path: &PathBuf,
    detections: &[Detection],
  ) -> Result<(), DirectoryRecordOutputError> {
    std::fs::write(path.with_extension("jsonl"), record_lines(detections))?;
    Ok(())
  }
}

// 每条检测一行 JSON，行式消费者要求末尾也带换行
fn record_lines(detections: &[Detection]) -> String {
  detections
    .iter()
    .map(|d| {
      let mut line = serde_json::json!({
        "label": d.label,
        "score": d.score,
        "x": d.rect.x,
        "y": d.rect.y,
        "width": d.rect.width,
        "height": d.rect.height,
      })
      .to_string();
      line.push('\n');
      line
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::postprocess::PixelRect;

  fn detection(label: &str) -> Detection {
    Detection {
      label: label.to_string(),
      score: 0.9,
      rect: PixelRect {
        x: 30.0,
        y: 30.0,
        width: 120.0,
        height: 120.0,
      },
    }
  }

  #[test]
  fn record_lines_are_newline_terminated() {
    let lines = record_lines(&[detection("50 Naira"), detection("100 Naira")]);
    assert!(lines.ends_with('\n'));
    assert_eq!(lines.lines().count(), 2);

    let first: serde_json::Value = serde_json::from_str(lines.lines().next().unwrap()).unwrap();
    assert_eq!(first["label"], "50 Naira");
    assert_eq!(first["x"], 30.0);
  }

  #[test]
  fn record_lines_empty_for_no_detections() {
    assert_eq!(record_lines(&[]), "");
  }
}

impl Render for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, image: &RgbImage, detections: &[Detection]) -> Result<(), Self::Error> {
    if !self.always && detections.is_empty() {
      return Ok(());
    }

    let path = self.frame_path()?;
    image.save(&path)?;
    if self.record {
      self.write_records(&path, detections)?;
    }
    Ok(())
  }
}
