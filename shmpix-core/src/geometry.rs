// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Integer pixel geometry.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// A pixel coordinate or a width/height pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Coordinate arithmetic wraps on overflow.
impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x.wrapping_add(rhs.x), self.y.wrapping_add(rhs.y))
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x.wrapping_sub(rhs.x), self.y.wrapping_sub(rhs.y))
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Half-open rectangle: `min` is inside, `max` is just outside.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rectangle {
    pub min: Point,
    pub max: Point,
}

impl Rectangle {
    pub const fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Rectangle spanning `[0,0]` to `size`.
    pub const fn from_size(size: Point) -> Self {
        Self {
            min: Point::ZERO,
            max: size,
        }
    }

    pub const fn from_coords(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            min: Point::new(x0, y0),
            max: Point::new(x1, y1),
        }
    }

    pub fn dx(&self) -> i32 {
        self.max.x.wrapping_sub(self.min.x)
    }

    pub fn dy(&self) -> i32 {
        self.max.y.wrapping_sub(self.min.y)
    }

    pub fn size(&self) -> Point {
        self.max - self.min
    }

    pub fn is_empty(&self) -> bool {
        self.min.x >= self.max.x || self.min.y >= self.max.y
    }

    pub fn contains(&self, p: Point) -> bool {
        self.min.x <= p.x && p.x < self.max.x && self.min.y <= p.y && p.y < self.max.y
    }

    /// Same size, with the origin moved to `origin`.
    pub fn translate_to(&self, origin: Point) -> Rectangle {
        Rectangle::new(origin, origin + self.size())
    }

    /// Largest rectangle contained in both.
    pub fn intersect(&self, other: &Rectangle) -> Rectangle {
        let r = Rectangle::from_coords(
            self.min.x.max(other.min.x),
            self.min.y.max(other.min.y),
            self.max.x.min(other.max.x),
            self.max.y.min(other.max.y),
        );
        if r.is_empty() {
            Rectangle::default()
        } else {
            r
        }
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_keeps_size() {
        let src = Rectangle::from_coords(2, 3, 10, 7);
        let dst = src.translate_to(Point::new(100, 50));
        assert_eq!(dst, Rectangle::from_coords(100, 50, 108, 54));
        assert_eq!(dst.size(), src.size());
    }

    #[test]
    fn test_translate_does_not_clamp() {
        let src = Rectangle::from_coords(0, 0, 4, 4);
        let dst = src.translate_to(Point::new(-3, -3));
        assert_eq!(dst.min, Point::new(-3, -3));
        assert_eq!(dst.max, Point::new(1, 1));
    }

    #[test]
    fn test_translate_far_origin_wraps() {
        let src = Rectangle::from_size(Point::new(4, 4));
        let dst = src.translate_to(Point::new(i32::MAX - 1, 0));
        assert_eq!(dst.min, Point::new(i32::MAX - 1, 0));
        assert_eq!(dst.max, Point::new(i32::MIN + 2, 4));
        assert_eq!(dst.size(), src.size());
    }

    #[test]
    fn test_contains_is_half_open() {
        let r = Rectangle::from_size(Point::new(4, 4));
        assert!(r.contains(Point::new(0, 0)));
        assert!(r.contains(Point::new(3, 3)));
        assert!(!r.contains(Point::new(4, 0)));
        assert!(!r.contains(Point::new(0, -1)));
    }

    #[test]
    fn test_intersect() {
        let a = Rectangle::from_coords(0, 0, 8, 8);
        let b = Rectangle::from_coords(4, 6, 12, 12);
        assert_eq!(a.intersect(&b), Rectangle::from_coords(4, 6, 8, 8));

        let disjoint = Rectangle::from_coords(20, 20, 30, 30);
        assert!(a.intersect(&disjoint).is_empty());
    }
}
