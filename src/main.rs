// 该文件是 Qianyan （钱眼） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::{thread, time::Duration};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use qianyan::{
  FromUrl,
  input::InputWrapper,
  labels::LabelTable,
  model::{Graph, SsdBuilder},
  output::{OutputWrapper, OverlayCanvas, Render},
  task::{DetectionLoop, LoopStats},
};

const DEFAULT_THRESHOLD: f32 = 0.5;

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型产物: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let builder = SsdBuilder::from_url(&args.model)?;
  let threshold = args
    .threshold
    .or(builder.threshold())
    .unwrap_or(DEFAULT_THRESHOLD);
  let spec = builder.spec().clone();
  info!(
    "模型预设: {}x{} 输入, 类别偏移 {}, 阈值 {}",
    spec.input_width, spec.input_height, spec.class_offset, threshold
  );

  let labels = match &args.labels {
    Some(path) => LabelTable::from_json_file(path, spec.class_offset)?,
    None => LabelTable::naira().with_offset(spec.class_offset),
  };

  // 模型加载失败对整个检测器是致命的
  let engine = builder.build_replay()?;

  let mut canvas = OverlayCanvas::new(spec.input_width, spec.input_height);
  if let Some(font) = &args.font {
    canvas = canvas.with_font_file(font)?;
  }

  let sink = OutputWrapper::from_url(&args.output)?;
  let mut detector = DetectionLoop::new(engine, labels, threshold, canvas, sink);

  let stop = detector.stop_handle();
  ctrlc::set_handler(move || {
    info!("收到中断信号, 准备退出...");
    stop.stop();
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;

  let max_frames = (args.max_frames > 0).then_some(args.max_frames);

  // 视频表面与模型输入同尺寸，按预设选择具体的帧尺寸
  let stats = match (spec.input_width, spec.input_height) {
    (300, 300) => run::<300, 300, _, _>(&mut detector, &args.input, max_frames)?,
    (320, 320) => run::<320, 320, _, _>(&mut detector, &args.input, max_frames)?,
    (w, h) => anyhow::bail!("不支持的模型输入尺寸: {}x{}", w, h),
  };

  info!(
    "处理完成: 共 {} 帧, {} 个检测, 跳过 {} 帧",
    stats.frames, stats.detections, stats.skipped
  );

  Ok(())
}

fn run<const W: u32, const H: u32, G, S>(
  detector: &mut DetectionLoop<G, S>,
  input: &url::Url,
  max_frames: Option<u64>,
) -> Result<LoopStats>
where
  G: Graph,
  S: Render,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let mut source = InputWrapper::<W, H>::from_url(input)?;
  detector.run(&mut source, max_frames)
}
