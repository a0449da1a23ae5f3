// 该文件是 Qianyan （钱眼） 项目的一部分。
// src/task.rs - 检测循环
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

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::{
  input::FrameSource,
  labels::LabelTable,
  model::{Graph, Ssd},
  output::{OverlayCanvas, Render},
  postprocess::{Detection, process},
  preprocess::prepare,
};

/// 循环的状态机：就绪需要模型与帧源都完成绑定，
/// 首帧解码进入运行，显式停止或源耗尽进入停止，不可恢复错误进入出错。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
  Idle,
  Ready,
  Running,
  Stopped,
  Error,
}

/// 可克隆的取消令牌。停止请求在推理调用返回后、触碰画布前生效，
/// 推理挂起期间发出的停止也不会让循环再调度下一次迭代。
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn stop(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_stopped(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
  pub frames: u64,
  pub detections: u64,
  pub skipped: u64,
}

/// 每帧一次 预处理 -> 推理 -> 后处理 -> 绘制 -> 输出 的协作式循环。
/// 单线程执行，一次迭代完整跑完（包括释放张量与原始输出）
/// 才开始下一次，节奏由帧源的出帧速度决定。
pub struct DetectionLoop<G: Graph, S: Render> {
  engine: Ssd<G>,
  labels: LabelTable,
  threshold: f32,
  canvas: OverlayCanvas,
  sink: S,
  state: LoopState,
  stop: StopHandle,
}

impl<G: Graph, S: Render> DetectionLoop<G, S>
where
  S::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn new(
    engine: Ssd<G>,
    labels: LabelTable,
    threshold: f32,
    canvas: OverlayCanvas,
    sink: S,
  ) -> Self {
    Self {
      engine,
      labels,
      threshold,
      canvas,
      sink,
      state: LoopState::Idle,
      stop: StopHandle::new(),
    }
  }

  pub fn state(&self) -> LoopState {
    self.state
  }

  pub fn stop_handle(&self) -> StopHandle {
    self.stop.clone()
  }

  /// 驱动循环直到停止、源耗尽、达到帧数上限或出错。
  /// 单帧推理失败只记入跳过数，循环继续；帧源错误是致命的。
  pub fn run<const W: u32, const H: u32, F>(
    &mut self,
    source: &mut F,
    max_frames: Option<u64>,
  ) -> Result<LoopStats>
  where
    F: FrameSource<W, H>,
    F::Error: Send + Sync + 'static,
  {
    // 模型已加载、帧源已绑定，二者齐备即就绪
    self.state = LoopState::Ready;
    info!("检测循环就绪, 等待首帧");

    let mut stats = LoopStats::default();
    loop {
      if self.stop.is_stopped() {
        info!("收到停止请求, 退出检测循环");
        self.state = LoopState::Stopped;
        break;
      }

      let frame = match source.current_frame() {
        Ok(Some(frame)) => frame,
        Ok(None) => {
          info!("帧源结束, 退出检测循环");
          self.state = LoopState::Stopped;
          break;
        }
        Err(e) => {
          error!("帧源错误: {}", e);
          self.state = LoopState::Error;
          return Err(e.into());
        }
      };

      if self.state != LoopState::Running {
        self.state = LoopState::Running;
        info!("首帧解码完成, 进入运行状态");
      }

      let (model_w, model_h, norm) = {
        let spec = self.engine.spec();
        (spec.input_width, spec.input_height, spec.normalization)
      };

      let tensor = prepare(&frame, (model_w, model_h), &norm);
      let raw = match self.engine.execute(&tensor) {
        Ok(raw) => raw,
        Err(e) => {
          // 单帧失败不致命：跳过这一帧的渲染，下一帧继续
          warn!("第 {} 帧推理失败, 跳过: {}", stats.frames + 1, e);
          stats.skipped += 1;
          drop(tensor);
          continue;
        }
      };
      drop(tensor);

      // 推理返回后、触碰画布前重新检查停止令牌，
      // 保证推理挂起期间的停止不会再产生渲染或下一次迭代
      if self.stop.is_stopped() {
        info!("推理期间收到停止请求, 不再渲染");
        drop(raw);
        self.state = LoopState::Stopped;
        break;
      }

      let detections: Vec<Detection> =
        process(&raw, (W, H), self.threshold, &self.labels).collect();
      drop(raw);
      debug!("第 {} 帧检测到 {} 个目标", stats.frames + 1, detections.len());

      self.canvas.draw(&detections);
      let composited = self.canvas.composite_over(&frame);
      if let Err(e) = self.sink.render_result(&composited, &detections) {
        error!("输出失败: {}", e);
        self.state = LoopState::Error;
        return Err(e.into());
      }

      stats.frames += 1;
      stats.detections += detections.len() as u64;

      if let Some(max) = max_frames
        && stats.frames >= max
      {
        info!("达到指定帧数 {}, 退出检测循环", max);
        self.state = LoopState::Stopped;
        break;
      }
    }

    info!(
      "检测循环退出: 共 {} 帧, {} 个检测, 跳过 {} 帧",
      stats.frames, stats.detections, stats.skipped
    );
    Ok(stats)
  }
}
