// 该文件是 Beifeng （北风） 项目的一部分。
// src/geometry.rs - 边界框几何运算
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

/// 归一化坐标点，取值范围 [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2D {
  pub x: f32,
  pub y: f32,
}

impl Point2D {
  pub const fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

/// 轴对齐边界框 [x_min, y_min, x_max, y_max]
///
/// 任何运算都不会交换角点顺序；若 `x_min > x_max` 或 `y_min > y_max`，
/// 该框即为空框（面积为 0），而不是错误。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
  pub x_min: f32,
  pub y_min: f32,
  pub x_max: f32,
  pub y_max: f32,
}

impl BBox {
  pub const fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
    Self {
      x_min,
      y_min,
      x_max,
      y_max,
    }
  }

  pub fn width(&self) -> f32 {
    self.x_max - self.x_min
  }

  pub fn height(&self) -> f32 {
    self.y_max - self.y_min
  }

  pub fn is_empty(&self) -> bool {
    self.width() <= 0.0 || self.height() <= 0.0
  }

  pub fn area(&self) -> f32 {
    if self.is_empty() {
      0.0
    } else {
      self.width() * self.height()
    }
  }

  /// 按轴独立缩放，通常用于把归一化坐标映射到像素坐标
  pub fn scale(&self, scale_x: f32, scale_y: f32) -> Self {
    Self {
      x_min: self.x_min * scale_x,
      y_min: self.y_min * scale_y,
      x_max: self.x_max * scale_x,
      y_max: self.y_max * scale_y,
    }
  }

  /// 两个框的交集；不相交（或仅边相接）时返回 `None`
  pub fn intersect(&self, other: &BBox) -> Option<BBox> {
    let x_min = self.x_min.max(other.x_min);
    let y_min = self.y_min.max(other.y_min);
    let x_max = self.x_max.min(other.x_max);
    let y_max = self.y_max.min(other.y_max);

    if x_min < x_max && y_min < y_max {
      Some(BBox::new(x_min, y_min, x_max, y_max))
    } else {
      None
    }
  }

  /// 交并比 (IoU)
  pub fn iou(&self, other: &BBox) -> f32 {
    let Some(intersection) = self.intersect(other) else {
      return 0.0;
    };

    let denominator = self.area() + other.area() - intersection.area();
    if denominator > 0.0 {
      intersection.area() / denominator
    } else {
      0.0
    }
  }

  pub fn to_array(&self) -> [f32; 4] {
    [self.x_min, self.y_min, self.x_max, self.y_max]
  }
}

impl From<[f32; 4]> for BBox {
  fn from(value: [f32; 4]) -> Self {
    BBox::new(value[0], value[1], value[2], value[3])
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const EPS: f32 = 1e-6;

  #[test]
  fn derived_sizes() {
    let bbox = BBox::new(0.1, 0.2, 0.5, 0.4);
    assert!((bbox.width() - 0.4).abs() < EPS);
    assert!((bbox.height() - 0.2).abs() < EPS);
    assert!((bbox.area() - 0.08).abs() < EPS);
    assert!(!bbox.is_empty());
  }

  #[test]
  fn inverted_box_is_empty() {
    let bbox = BBox::new(0.5, 0.2, 0.1, 0.4);
    assert!(bbox.is_empty());
    assert_eq!(bbox.area(), 0.0);
    // 角点保持原样
    assert_eq!(bbox.x_min, 0.5);
    assert_eq!(bbox.x_max, 0.1);
  }

  #[test]
  fn scale_is_per_axis() {
    let bbox = BBox::new(0.1, 0.2, 0.5, 0.6).scale(100.0, 10.0);
    assert!((bbox.x_min - 10.0).abs() < 1e-4);
    assert!((bbox.y_min - 2.0).abs() < 1e-4);
    assert!((bbox.x_max - 50.0).abs() < 1e-4);
    assert!((bbox.y_max - 6.0).abs() < 1e-4);
  }

  #[test]
  fn intersect_overlapping() {
    let a = BBox::new(0.0, 0.0, 2.0, 2.0);
    let b = BBox::new(1.0, 1.0, 3.0, 3.0);
    assert_eq!(a.intersect(&b), Some(BBox::new(1.0, 1.0, 2.0, 2.0)));
  }

  #[test]
  fn touching_edges_do_not_intersect() {
    let a = BBox::new(0.0, 0.0, 1.0, 1.0);
    let b = BBox::new(1.0, 0.0, 2.0, 1.0);
    assert_eq!(a.intersect(&b), None);
    assert_eq!(a.iou(&b), 0.0);
  }

  #[test]
  fn iou_properties() {
    let a = BBox::new(0.0, 0.0, 2.0, 2.0);
    let b = BBox::new(1.0, 1.0, 3.0, 3.0);
    let c = BBox::new(5.0, 5.0, 6.0, 6.0);

    assert!((a.iou(&b) - 1.0 / 7.0).abs() < EPS);
    assert_eq!(a.iou(&b), b.iou(&a));
    assert_eq!(a.iou(&a), 1.0);
    assert_eq!(a.iou(&c), 0.0);
  }

  #[test]
  fn empty_box_has_zero_self_iou() {
    let empty = BBox::new(0.3, 0.3, 0.3, 0.5);
    assert_eq!(empty.iou(&empty), 0.0);
  }
}
