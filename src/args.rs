// 该文件是 Qianyan （钱眼） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;
use url::Url;

/// Qianyan 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型产物 URL, 例如 ssd:///models/naira.json?preset=ssd300
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入来源, 例如 camera:///dev/video0?fps=15 或 image:///frame.png?repeat
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径, 例如 image:///out.png 或 folder:///archive?always&record
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 置信度阈值 (0.0 - 1.0)；缺省时依次取模型 URL 的 threshold 参数和 0.5
  #[arg(long, value_name = "THRESHOLD")]
  pub threshold: Option<f32>,

  /// 标签表 JSON 文件（字符串数组），缺省用内置奈拉纸币标签
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 标签文字使用的 TTF 字体文件，缺省用内置点阵字形
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 最大处理帧数（0 表示无限制）
  #[arg(long, default_value_t = 0, value_name = "COUNT")]
  pub max_frames: u64,
}
