// 该文件是 Qianyan （钱眼） 项目的一部分。
// tests/resource_accounting.rs - 逐帧资源核算测试
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

// 计数器是进程级的，这个属性单独放一个测试二进制避免并发干扰。

use std::convert::Infallible;

use image::RgbImage;

use qianyan::{
  frame::RgbFrame,
  input::FrameSource,
  labels::LabelTable,
  model::{ModelSpec, RawOutputs, ReplayGraph, Ssd, live_raw_outputs},
  output::{OverlayCanvas, Render},
  postprocess::Detection,
  task::DetectionLoop,
  tensor::{InputTensor, live_tensors},
};

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

struct NullSink;

impl Render for NullSink {
  type Error = Infallible;

  fn render_result(&self, _image: &RgbImage, _detections: &[Detection]) -> Result<(), Self::Error> {
    Ok(())
  }
}

#[test]
fn no_live_buffers_after_n_iterations() {
  assert_eq!(live_tensors(), 0);
  assert_eq!(live_raw_outputs(), 0);

  // 直接创建与释放
  {
    let tensor = InputTensor::new(vec![0.0; 300 * 300 * 3], 300, 300);
    let raw = RawOutputs::new(
      vec![0.1, 0.1, 0.5, 0.5].into_boxed_slice(),
      vec![3.0].into_boxed_slice(),
      vec![0.9].into_boxed_slice(),
      None,
    );
    assert_eq!(live_tensors(), 1);
    assert_eq!(live_raw_outputs(), 1);
    drop(tensor);
    drop(raw);
  }
  assert_eq!(live_tensors(), 0);
  assert_eq!(live_raw_outputs(), 0);

  // 跑过检测循环之后：检出为零的帧同样不得保留缓冲
  let graph = ReplayGraph::from_outputs(vec![
    vec![
      vec![0.1, 0.1, 0.5, 0.5].into_boxed_slice(),
      vec![0.9].into_boxed_slice(),
      vec![3.0].into_boxed_slice(),
    ],
    vec![
      vec![0.1, 0.1, 0.5, 0.5].into_boxed_slice(),
      vec![0.2].into_boxed_slice(),
      vec![3.0].into_boxed_slice(),
    ],
  ]);
  let engine = Ssd::new(graph, ModelSpec::ssd300());
  let mut detector = DetectionLoop::new(
    engine,
    LabelTable::naira(),
    0.5,
    OverlayCanvas::new(300, 300),
    NullSink,
  );

  let mut source = SolidSource { remaining: 8 };
  let stats = detector.run::<300, 300, _>(&mut source, None).unwrap();

  assert_eq!(stats.frames, 8);
  assert_eq!(live_tensors(), 0);
  assert_eq!(live_raw_outputs(), 0);
}
