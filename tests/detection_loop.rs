// 该文件是 Qianyan （钱眼） 项目的一部分。
// tests/detection_loop.rs - 检测循环集成测试
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

use std::{
  convert::Infallible,
  sync::{Arc, Mutex},
};

use image::RgbImage;

use qianyan::{
  frame::RgbFrame,
  input::FrameSource,
  labels::LabelTable,
  model::{Graph, GraphError, ModelSpec, ReplayGraph, Ssd},
  output::{OverlayCanvas, Render},
  postprocess::{Detection, PixelRect},
  task::{DetectionLoop, LoopState, StopHandle},
  tensor::InputTensor,
};

/// 产出固定数量黑帧的帧源。
struct SolidSource {
  remaining: usize,
}

impl<const W: u32, const H: u32> FrameSource<W, H> for SolidSource {
  type Error = Infallible;

  fn current_frame(&mut self) -> Result<Option<RgbFrame<W, H>>, Self::Error> {
    if self.remaining == 0 {
      return Ok(None);
    }
    self.remaining -= 1;
    Ok(Some(RgbFrame::default()))
  }
}

/// 记录每次渲染调用的输出汇。
#[derive(Clone, Default)]
struct CollectSink {
  renders: Arc<Mutex<Vec<Vec<Detection>>>>,
}

impl CollectSink {
  fn render_count(&self) -> usize {
    self.renders.lock().unwrap().len()
  }

  fn last_detections(&self) -> Vec<Detection> {
    self.renders.lock().unwrap().last().cloned().unwrap_or_default()
  }
}

impl Render for CollectSink {
  type Error = Infallible;

  fn render_result(&self, _image: &RgbImage, detections: &[Detection]) -> Result<(), Self::Error> {
    self.renders.lock().unwrap().push(detections.to_vec());
    Ok(())
  }
}

fn naira_frame(boxes: &[[f32; 4]], scores: &[f32], classes: &[f32]) -> Vec<Box<[f32]>> {
  vec![
    boxes.iter().flatten().copied().collect::<Vec<_>>().into_boxed_slice(),
    scores.to_vec().into_boxed_slice(),
    classes.to_vec().into_boxed_slice(),
  ]
}

#[test]
fn end_to_end_single_detection() {
  let graph = ReplayGraph::from_outputs(vec![naira_frame(
    &[[0.1, 0.1, 0.5, 0.5]],
    &[0.9],
    &[3.0],
  )]);
  let engine = Ssd::new(graph, ModelSpec::ssd300());
  let sink = CollectSink::default();
  let mut detector = DetectionLoop::new(
    engine,
    LabelTable::naira(),
    0.5,
    OverlayCanvas::new(300, 300),
    sink.clone(),
  );

  let mut source = SolidSource { remaining: 1 };
  let stats = detector.run::<300, 300, _>(&mut source, None).unwrap();

  assert_eq!(stats.frames, 1);
  assert_eq!(stats.detections, 1);
  assert_eq!(stats.skipped, 0);
  assert_eq!(detector.state(), LoopState::Stopped);

  let detections = sink.last_detections();
  assert_eq!(detections.len(), 1);
  assert_eq!(detections[0].label, "50 Naira");
  assert_eq!(detections[0].score, 0.9);
  assert_eq!(
    detections[0].rect,
    PixelRect {
      x: 30.0,
      y: 30.0,
      width: 120.0,
      height: 120.0
    }
  );
}

#[test]
fn below_threshold_renders_empty_frame() {
  let graph = ReplayGraph::from_outputs(vec![naira_frame(
    &[[0.1, 0.1, 0.5, 0.5]],
    &[0.4],
    &[3.0],
  )]);
  let engine = Ssd::new(graph, ModelSpec::ssd300());
  let sink = CollectSink::default();
  let mut detector = DetectionLoop::new(
    engine,
    LabelTable::naira(),
    0.5,
    OverlayCanvas::new(300, 300),
    sink.clone(),
  );

  let mut source = SolidSource { remaining: 1 };
  let stats = detector.run::<300, 300, _>(&mut source, None).unwrap();

  assert_eq!(stats.frames, 1);
  assert_eq!(stats.detections, 0);
  assert_eq!(sink.render_count(), 1);
  assert!(sink.last_detections().is_empty());
}

/// 推理执行期间发出停止请求的图后端，
/// 模拟停止发生在前向传播挂起时的竞争。
struct StopDuringExecute {
  handle: Arc<Mutex<Option<StopHandle>>>,
  outputs: Vec<Box<[f32]>>,
}

impl Graph for StopDuringExecute {
  fn execute(&self, _input: &InputTensor) -> Result<Vec<Box<[f32]>>, GraphError> {
    if let Some(handle) = self.handle.lock().unwrap().as_ref() {
      handle.stop();
    }
    Ok(self.outputs.clone())
  }
}

#[test]
fn stop_during_inference_suppresses_render() {
  let sink = CollectSink::default();
  let handle_slot = Arc::new(Mutex::new(None));

  let graph = StopDuringExecute {
    handle: handle_slot.clone(),
    outputs: naira_frame(&[[0.1, 0.1, 0.5, 0.5]], &[0.9], &[3.0]),
  };
  let engine = Ssd::new(graph, ModelSpec::ssd300());
  let mut detector = DetectionLoop::new(
    engine,
    LabelTable::naira(),
    0.5,
    OverlayCanvas::new(300, 300),
    sink.clone(),
  );
  *handle_slot.lock().unwrap() = Some(detector.stop_handle());

  let mut source = SolidSource { remaining: 10 };
  let stats = detector.run::<300, 300, _>(&mut source, None).unwrap();

  assert_eq!(stats.frames, 0);
  assert_eq!(sink.render_count(), 0);
  assert_eq!(detector.state(), LoopState::Stopped);
}

#[test]
fn execute_failure_skips_frame_and_continues() {
  // 空脚本让每次 execute 都失败
  let engine = Ssd::new(ReplayGraph::from_outputs(Vec::new()), ModelSpec::ssd300());
  let sink = CollectSink::default();
  let mut detector = DetectionLoop::new(
    engine,
    LabelTable::naira(),
    0.5,
    OverlayCanvas::new(300, 300),
    sink.clone(),
  );

  let mut source = SolidSource { remaining: 3 };
  let stats = detector.run::<300, 300, _>(&mut source, None).unwrap();

  assert_eq!(stats.frames, 0);
  assert_eq!(stats.skipped, 3);
  assert_eq!(sink.render_count(), 0);
  assert_eq!(detector.state(), LoopState::Stopped);
}

#[test]
fn max_frames_bounds_the_loop() {
  let graph = ReplayGraph::from_outputs(vec![naira_frame(&[], &[], &[])]);
  let engine = Ssd::new(graph, ModelSpec::ssd300());
  let sink = CollectSink::default();
  let mut detector = DetectionLoop::new(
    engine,
    LabelTable::naira(),
    0.5,
    OverlayCanvas::new(300, 300),
    sink.clone(),
  );

  let mut source = SolidSource { remaining: 100 };
  let stats = detector.run::<300, 300, _>(&mut source, Some(5)).unwrap();

  assert_eq!(stats.frames, 5);
  assert_eq!(sink.render_count(), 5);
  assert_eq!(detector.state(), LoopState::Stopped);
}

#[test]
fn stop_before_run_prevents_any_iteration() {
  let graph = ReplayGraph::from_outputs(vec![naira_frame(&[], &[], &[])]);
  let engine = Ssd::new(graph, ModelSpec::ssd300());
  let sink = CollectSink::default();
  let mut detector = DetectionLoop::new(
    engine,
    LabelTable::naira(),
    0.5,
    OverlayCanvas::new(300, 300),
    sink.clone(),
  );

  detector.stop_handle().stop();

  let mut source = SolidSource { remaining: 100 };
  let stats = detector.run::<300, 300, _>(&mut source, None).unwrap();

  assert_eq!(stats.frames, 0);
  assert_eq!(sink.render_count(), 0);
  assert_eq!(detector.state(), LoopState::Stopped);
}

#[test]
fn ssd320_preset_offsets_classes_from_zero() {
  // ssd320 预设: boxes/classes/scores 排列, 0 起始类别
  let graph = ReplayGraph::from_outputs(vec![vec![
    vec![0.0, 0.0, 0.5, 0.5].into_boxed_slice(),
    vec![2.0].into_boxed_slice(),
    vec![0.8].into_boxed_slice(),
  ]]);
  let engine = Ssd::new(graph, ModelSpec::ssd320());
  let sink = CollectSink::default();
  let mut detector = DetectionLoop::new(
    engine,
    LabelTable::naira().with_offset(0),
    0.5,
    OverlayCanvas::new(320, 320),
    sink.clone(),
  );

  let mut source = SolidSource { remaining: 1 };
  let stats = detector.run::<320, 320, _>(&mut source, None).unwrap();

  assert_eq!(stats.detections, 1);
  let detections = sink.last_detections();
  assert_eq!(detections[0].label, "50 Naira");
  assert_eq!(
    detections[0].rect,
    PixelRect {
      x: 0.0,
      y: 0.0,
      width: 160.0,
      height: 160.0
    }
  );
}
