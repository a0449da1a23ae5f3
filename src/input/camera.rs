// 该文件是 Qianyan （钱眼） 项目的一部分。
// src/input/camera.rs - V4L2 摄像头输入
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
use tracing::{error, info};
use url::Url;
use v4l::{
  Device, FourCC,
  buffer::Type,
  io::traits::CaptureStream,
  video::{Capture, capture::Parameters},
};

use crate::{FromUrl, FromUrlWithScheme, frame::RgbFrame, input::FrameSource};

const DEFAULT_DEVICE_PATH: &str = "/dev/video0";
const CAPTURE_BUFFERS: u32 = 4;
const RGB24_FOURCC: &[u8; 4] = b"RGB3";

#[derive(Error, Debug)]
pub enum CameraInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("摄像头拒绝 {0}x{1} RGB24 格式, 协商结果 {2}x{3} {4}")]
  FormatRejected(u32, u32, u32, u32, FourCC),
  #[error("无效的帧率参数: {0}")]
  InvalidFps(String),
  #[error("采集缓冲过短: 期望 {expected} 字节, 实际 {actual} 字节")]
  ShortFrame { expected: usize, actual: usize },
}

/// 打开 `camera://` URL 指向的 V4L2 设备，协商 WxH 的 RGB24 采集，
/// 绑定时阻塞等待第一帧解码完成；任何失败都是致命的配置错误，
/// 返回给调用方且不重试。
pub struct CameraInput<const W: u32, const H: u32> {
  device: Device,
  pending: Option<RgbFrame<W, H>>,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for CameraInput<W, H> {
  const SCHEME: &'static str = "camera";
}

impl<const W: u32, const H: u32> FromUrl for CameraInput<W, H> {
  type Error = CameraInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(CameraInputError::SchemeMismatch(format!(
        "期望输入方案 '{}', 实际方案 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let device_path = if url.path().is_empty() {
      DEFAULT_DEVICE_PATH.to_string()
    } else {
      url.path().to_string()
    };

    info!("打开摄像头设备: {}", device_path);
    let device = Device::with_path(&device_path)?;

    let wanted = v4l::Format::new(W, H, FourCC::new(RGB24_FOURCC));
    let format = device.set_format(&wanted)?;
    if format.fourcc != wanted.fourcc || format.width != W || format.height != H {
      error!(
        "摄像头格式协商失败: 期望 {}x{} RGB24, 实际 {}x{} {}",
        W, H, format.width, format.height, format.fourcc
      );
      return Err(CameraInputError::FormatRejected(
        W,
        H,
        format.width,
        format.height,
        format.fourcc,
      ));
    }

    for (key, value) in url.query_pairs() {
      if key == "fps" {
        let fps: u32 = value
          .parse()
          .map_err(|_| CameraInputError::InvalidFps(value.to_string()))?;
        device.set_params(&Parameters::with_fps(fps))?;
      }
    }

    let mut input = CameraInput {
      device,
      pending: None,
    };

    // 绑定在第一帧解码完成后才算结束，循环在此之前不会启动
    info!("等待摄像头首帧解码...");
    let first = input.capture_frame()?;
    input.pending = Some(first);
    info!("摄像头绑定完成: {} ({}x{})", device_path, W, H);

    Ok(input)
  }
}

impl<const W: u32, const H: u32> CameraInput<W, H> {
  fn capture_frame(&mut self) -> Result<RgbFrame<W, H>, CameraInputError> {
    let mut stream =
      v4l::io::mmap::Stream::with_buffers(&mut self.device, Type::VideoCapture, CAPTURE_BUFFERS)?;

    let (buf, _meta) = stream.next()?;

    let expected = (W * H * 3) as usize;
    if buf.len() < expected {
      return Err(CameraInputError::ShortFrame {
        expected,
        actual: buf.len(),
      });
    }

    Ok(RgbFrame::from(buf[..expected].to_vec()))
  }
}

impl<const W: u32, const H: u32> FrameSource<W, H> for CameraInput<W, H> {
  type Error = CameraInputError;

  fn current_frame(&mut self) -> Result<Option<RgbFrame<W, H>>, Self::Error> {
    if let Some(frame) = self.pending.take() {
      return Ok(Some(frame));
    }
    self.capture_frame().map(Some)
  }
}
