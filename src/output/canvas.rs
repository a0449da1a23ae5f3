// 该文件是 Qianyan （钱眼） 项目的一部分。
// src/output/canvas.rs - 检测叠加画布
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

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;

use crate::{frame::RgbFrame, postprocess::{Detection, PixelRect}};

// 绘制常量
const STROKE_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]); // lime
const STROKE_WIDTH: i32 = 2;
const TAG_TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const TAG_INSET_X: i32 = 4;
const TAG_INSET_Y: i32 = 4;
const TAG_HEIGHT: u32 = 16;
const TAG_FONT_SIZE: f32 = 14.0;
const TAG_CHAR_WIDTH: u32 = 8; // 每字符平均宽度（粗略估计）
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

#[derive(Error, Debug)]
pub enum CanvasError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  FontError(ab_glyph::InvalidFont),
}

/// 与视频同尺寸的 RGBA 叠加画布。每次 `draw` 先整面清空再绘制，
/// 上一帧的检测框绝不允许残留。配置了 TTF 字体时用 ab_glyph 渲染
/// 标签文字，否则退回内置的 8x12 点阵字形，文字总能画出来。
pub struct OverlayCanvas {
  surface: RgbaImage,
  font: Option<FontVec>,
}

impl OverlayCanvas {
  pub fn new(width: u32, height: u32) -> Self {
    Self {
      surface: RgbaImage::from_pixel(width, height, TRANSPARENT),
      font: None,
    }
  }

  pub fn with_font_file(mut self, path: &Path) -> Result<Self, CanvasError> {
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data).map_err(CanvasError::FontError)?;
    self.font = Some(font);
    Ok(self)
  }

  pub fn surface(&self) -> &RgbaImage {
    &self.surface
  }

  /// 清空整个画布后逐个绘制检测框与标签。
  pub fn draw(&mut self, detections: &[Detection]) {
    self.clear();
    for detection in detections {
      self.stroke_rect(&detection.rect);
      let tag = format!(
        "{} {}%",
        detection.label,
        (detection.score * 100.0).round() as u32
      );
      self.draw_tag(&detection.rect, &tag);
    }
  }

  fn clear(&mut self) {
    for pixel in self.surface.pixels_mut() {
      *pixel = TRANSPARENT;
    }
  }

  fn stroke_rect(&mut self, rect: &PixelRect) {
    let x = rect.x.round() as i32;
    let y = rect.y.round() as i32;
    let width = rect.width.round() as i32;
    let height = rect.height.round() as i32;

    for t in 0..STROKE_WIDTH {
      let w = width - 2 * t;
      let h = height - 2 * t;
      if w < 1 || h < 1 {
        break;
      }
      draw_hollow_rect_mut(
        &mut self.surface,
        Rect::at(x + t, y + t).of_size(w as u32, h as u32),
        STROKE_COLOR,
      );
    }
  }

  // 框内左上角的标签牌：底色块加文字
  fn draw_tag(&mut self, rect: &PixelRect, text: &str) {
    let x = rect.x.round() as i32 + STROKE_WIDTH;
    let y = rect.y.round() as i32 + STROKE_WIDTH;
    let width = text.chars().count() as u32 * TAG_CHAR_WIDTH;

    draw_filled_rect_mut(
      &mut self.surface,
      Rect::at(x, y).of_size(width.max(1), TAG_HEIGHT),
      STROKE_COLOR,
    );

    let text_x = x + TAG_INSET_X - STROKE_WIDTH;
    let text_y = y + TAG_INSET_Y - STROKE_WIDTH;
    match &self.font {
      Some(font) => {
        draw_text_mut(
          &mut self.surface,
          TAG_TEXT_COLOR,
          text_x,
          text_y,
          PxScale::from(TAG_FONT_SIZE),
          font,
          text,
        );
      }
      None => self.draw_bitmap_text(text_x, text_y, text),
    }
  }

  fn draw_bitmap_text(&mut self, x: i32, y: i32, text: &str) {
    let mut cursor = x;
    for ch in text.chars() {
      let rows = glyph_rows(ch);
      for (row, bits) in rows.iter().enumerate() {
        for col in 0..8 {
          if (bits >> (7 - col)) & 1 == 1 {
            let px = cursor + col;
            let py = y + row as i32;
            if px >= 0
              && py >= 0
              && (px as u32) < self.surface.width()
              && (py as u32) < self.surface.height()
            {
              self.surface.put_pixel(px as u32, py as u32, TAG_TEXT_COLOR);
            }
          }
        }
      }
      cursor += TAG_CHAR_WIDTH as i32;
    }
  }

  /// 把画布按透明度混合到一帧之上，交给输出汇。
  pub fn composite_over<const W: u32, const H: u32>(&self, frame: &RgbFrame<W, H>) -> RgbImage {
    let mut image = frame.to_rgb_image();
    let width = image.width().min(self.surface.width());
    let height = image.height().min(self.surface.height());

    for y in 0..height {
      for x in 0..width {
        let Rgba([r, g, b, a]) = *self.surface.get_pixel(x, y);
        if a == 0 {
          continue;
        }
        let Rgb([dr, dg, db]) = *image.get_pixel(x, y);
        let alpha = a as u16;
        let blend = |src: u8, dst: u8| -> u8 {
          ((src as u16 * alpha + dst as u16 * (255 - alpha)) / 255) as u8
        };
        image.put_pixel(x, y, Rgb([blend(r, dr), blend(g, dg), blend(b, db)]));
      }
    }
    image
  }
}

/// 内置 8x12 点阵字形，覆盖标签默认会用到的字符；
/// 未收录的字符画一个实心块占位。
fn glyph_rows(ch: char) -> [u8; 12] {
  match ch {
    ' ' => [0x00; 12],
    '0' => [0x00, 0x3C, 0x42, 0x46, 0x4A, 0x52, 0x62, 0x42, 0x42, 0x3C, 0x00, 0x00],
    '1' => [0x00, 0x08, 0x18, 0x28, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00, 0x00],
    '2' => [0x00, 0x3C, 0x42, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x7E, 0x00, 0x00],
    '3' => [0x00, 0x3C, 0x42, 0x02, 0x1C, 0x02, 0x02, 0x02, 0x42, 0x3C, 0x00, 0x00],
    '4' => [0x00, 0x04, 0x0C, 0x14, 0x24, 0x44, 0x7E, 0x04, 0x04, 0x04, 0x00, 0x00],
    '5' => [0x00, 0x7E, 0x40, 0x40, 0x7C, 0x02, 0x02, 0x02, 0x42, 0x3C, 0x00, 0x00],
    '6' => [0x00, 0x3C, 0x42, 0x40, 0x7C, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00],
    '7' => [0x00, 0x7E, 0x02, 0x04, 0x08, 0x10, 0x10, 0x10, 0x10, 0x10, 0x00, 0x00],
    '8' => [0x00, 0x3C, 0x42, 0x42, 0x3C, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00],
    '9' => [0x00, 0x3C, 0x42, 0x42, 0x42, 0x3E, 0x02, 0x02, 0x42, 0x3C, 0x00, 0x00],
    '%' => [0x00, 0x62, 0x64, 0x08, 0x08, 0x10, 0x10, 0x26, 0x46, 0x00, 0x00, 0x00],
    '(' => [0x00, 0x04, 0x08, 0x10, 0x10, 0x10, 0x10, 0x10, 0x08, 0x04, 0x00, 0x00],
    ')' => [0x00, 0x20, 0x10, 0x08, 0x08, 0x08, 0x08, 0x08, 0x10, 0x20, 0x00, 0x00],
    '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00],
    '-' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x7E, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    'N' => [0x00, 0x42, 0x62, 0x52, 0x4A, 0x46, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00],
    'U' => [0x00, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00],
    'a' => [0x00, 0x00, 0x00, 0x3C, 0x02, 0x3E, 0x42, 0x42, 0x46, 0x3A, 0x00, 0x00],
    'i' => [0x00, 0x08, 0x00, 0x18, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00, 0x00],
    'k' => [0x00, 0x40, 0x40, 0x44, 0x48, 0x70, 0x48, 0x44, 0x42, 0x41, 0x00, 0x00],
    'n' => [0x00, 0x00, 0x00, 0x5C, 0x62, 0x42, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00],
    'o' => [0x00, 0x00, 0x00, 0x3C, 0x42, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00],
    'r' => [0x00, 0x00, 0x00, 0x5C, 0x62, 0x40, 0x40, 0x40, 0x40, 0x40, 0x00, 0x00],
    's' => [0x00, 0x00, 0x00, 0x3C, 0x42, 0x30, 0x0C, 0x02, 0x42, 0x3C, 0x00, 0x00],
    't' => [0x00, 0x10, 0x10, 0x7C, 0x10, 0x10, 0x10, 0x10, 0x12, 0x0C, 0x00, 0x00],
    'u' => [0x00, 0x00, 0x00, 0x42, 0x42, 0x42, 0x42, 0x42, 0x46, 0x3A, 0x00, 0x00],
    'w' => [0x00, 0x00, 0x00, 0x41, 0x41, 0x49, 0x49, 0x49, 0x49, 0x36, 0x00, 0x00],
    _ => [0x00, 0x3C, 0x7E, 0x7E, 0x7E, 0x7E, 0x7E, 0x7E, 0x7E, 0x3C, 0x00, 0x00],
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::postprocess::{Detection, PixelRect};

  fn detection() -> Detection {
    Detection {
      label: "50 Naira".to_string(),
      score: 0.9,
      rect: PixelRect {
        x: 30.0,
        y: 30.0,
        width: 120.0,
        height: 120.0,
      },
    }
  }

  fn stroked_pixels(canvas: &OverlayCanvas) -> usize {
    canvas.surface().pixels().filter(|p| p.0[3] > 0).count()
  }

  #[test]
  fn draw_strokes_box_edges() {
    let mut canvas = OverlayCanvas::new(300, 300);
    canvas.draw(&[detection()]);
    assert_eq!(*canvas.surface().get_pixel(30, 30), STROKE_COLOR);
    assert_eq!(*canvas.surface().get_pixel(149, 149), STROKE_COLOR);
    // 框中心保持透明
    assert_eq!(canvas.surface().get_pixel(90, 90).0[3], 0);
  }

  #[test]
  fn draw_always_clears_previous_frame() {
    let mut canvas = OverlayCanvas::new(300, 300);
    canvas.draw(&[detection()]);
    assert!(stroked_pixels(&canvas) > 0);

    canvas.draw(&[]);
    assert_eq!(stroked_pixels(&canvas), 0);
  }

  #[test]
  fn empty_detections_leave_canvas_untouched() {
    let mut canvas = OverlayCanvas::new(300, 300);
    canvas.draw(&[]);
    assert_eq!(stroked_pixels(&canvas), 0);
  }

  #[test]
  fn composite_blends_stroke_over_frame() {
    let mut canvas = OverlayCanvas::new(8, 8);
    canvas.draw(&[Detection {
      label: String::new(),
      score: 0.9,
      rect: PixelRect {
        x: 0.0,
        y: 0.0,
        width: 8.0,
        height: 8.0,
      },
    }]);

    let frame = RgbFrame::<8, 8>::default();
    let image = canvas.composite_over(&frame);
    assert_eq!(*image.get_pixel(0, 0), Rgb([0, 255, 0]));
  }
}
