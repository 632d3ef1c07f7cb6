//! Detection results.

/// Axis-aligned box in source-frame coordinates (corner form).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        (self.right - self.left).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Overlap with another rectangle; zero-area when disjoint.
    pub fn intersection(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        }
    }
}

/// One detected object, produced per frame and consumed by the renderer.
#[derive(Clone, Debug)]
pub struct Detection {
    pub rect: Rect,
    /// Final confidence in `[0, 1]`.
    pub confidence: f32,
    /// Index into the deployment's class table.
    pub class_id: usize,
    pub class_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_rect_has_zero_area() {
        let r = Rect::new(10.0, 10.0, 10.0, 20.0);
        assert_eq!(r.area(), 0.0);
    }

    #[test]
    fn disjoint_intersection_is_empty() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.intersection(&b).area(), 0.0);
    }
}
