use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }
}

/// An axis-aligned box given by its centre.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// How a scene should apply a visual change. A zero or absent duration applies it immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transition {
    pub duration: Option<Duration>,
}

impl Transition {
    pub const DEFAULT_MILLIS: u64 = 500;

    pub fn immediate() -> Self {
        Transition { duration: None }
    }

    pub fn from_millis(millis: Option<u64>) -> Self {
        Transition {
            duration: millis.filter(|ms| *ms > 0).map(Duration::from_millis),
        }
    }

    pub fn is_animated(&self) -> bool {
        self.duration.is_some()
    }
}

/// The point where the segment from the centre of `rect` toward `point` crosses its border.
pub fn intersect_rect(rect: &Rect, point: Point) -> Point {
    let dx = point.x - rect.x;
    let dy = point.y - rect.y;
    let mut w = rect.width / 2.0;
    let mut h = rect.height / 2.0;

    let (sx, sy) = if dy.abs() * w > dx.abs() * h {
        // top or bottom side
        if dy < 0.0 {
            h = -h;
        }
        (if dy == 0.0 { 0.0 } else { h * dx / dy }, h)
    } else {
        // left or right side
        if dx < 0.0 {
            w = -w;
        }
        (w, if dx == 0.0 { 0.0 } else { w * dy / dx })
    };

    Point::new(rect.x + sx, rect.y + sy)
}

/// Attachment point on a circular connector of `radius` around the node centre, pushed a quarter
/// of the node height toward the side the edge leaves from.
pub fn connector_point(node: &Rect, toward: Point, radius: f64) -> Point {
    let dx = toward.x - node.x;
    let dy = toward.y - node.y;
    let length = (dx * dx + dy * dy).sqrt();
    let (ux, uy) = if length == 0.0 {
        (0.0, 0.0)
    } else {
        (dx / length, dy / length)
    };
    let offset = if dy > 0.0 { 1.0 } else { -1.0 } * node.height / 4.0;
    Point::new(node.x + ux * radius, node.y + offset + uy * radius)
}
