//! Non-max suppression over decoded candidates.

use crate::detect::result::{Detection, Rect};

/// Intersection-over-Union of two axis-aligned rectangles.
///
/// Returns 0 when the rectangles do not overlap or the union is degenerate.
pub fn iou(a: &Rect, b: &Rect) -> f32 {
    let inter = a.intersection(b).area();
    if inter <= 0.0 {
        return 0.0;
    }
    let union = a.area() + b.area() - inter;
    if union <= 0.0 {
        return 0.0;
    }
    inter / union
}

/// Greedy non-max suppression.
///
/// Candidates are sorted by descending confidence, then swept in order: a
/// candidate is kept only if it has not been suppressed, and every later
/// candidate overlapping a kept one above `threshold` is suppressed.
pub fn non_max_suppression(mut detections: Vec<Detection>, threshold: f32) -> Vec<Detection> {
    if detections.is_empty() {
        return detections;
    }

    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let n = detections.len();
    let mut suppressed = vec![false; n];
    let mut kept = Vec::with_capacity(n);

    for i in 0..n {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..n {
            if suppressed[j] {
                continue;
            }
            if iou(&detections[i].rect, &detections[j].rect) > threshold {
                suppressed[j] = true;
            }
        }
        kept.push(detections[i].clone());
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(rect: Rect, confidence: f32) -> Detection {
        Detection {
            rect,
            confidence,
            class_id: 0,
            class_name: "person".into(),
        }
    }

    #[test]
    fn iou_of_identical_rect_is_one() {
        let a = Rect::new(10.0, 20.0, 110.0, 220.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_rects_is_zero() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(50.0, 50.0, 60.0, 60.0);
        assert_eq!(iou(&a, &b), 0.0);
        assert_eq!(iou(&b, &a), 0.0);
    }

    #[test]
    fn iou_of_half_overlap() {
        // Two 10x10 boxes sharing a 5x10 strip: 50 / (100 + 100 - 50).
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 0.0, 15.0, 10.0);
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn suppresses_overlapping_lower_confidence() {
        // IoU between these is 0.6, above the 0.45 threshold.
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(0.0, 25.0, 100.0, 125.0);
        assert!(iou(&a, &b) > 0.45 && iou(&a, &b) < 0.61);

        let kept = non_max_suppression(vec![det(b, 0.6), det(a, 0.9)], 0.45);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn keeps_non_overlapping_candidates() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(100.0, 100.0, 110.0, 110.0);
        let kept = non_max_suppression(vec![det(a, 0.9), det(b, 0.8)], 0.45);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn nms_is_idempotent() {
        let candidates = vec![
            det(Rect::new(0.0, 0.0, 100.0, 100.0), 0.9),
            det(Rect::new(10.0, 10.0, 110.0, 110.0), 0.8),
            det(Rect::new(300.0, 300.0, 400.0, 400.0), 0.7),
            det(Rect::new(305.0, 305.0, 395.0, 395.0), 0.6),
        ];
        let once = non_max_suppression(candidates, 0.45);
        let twice = non_max_suppression(once.clone(), 0.45);
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.rect, b.rect);
            assert_eq!(a.confidence, b.confidence);
        }
        // No two kept boxes may still overlap above the threshold.
        for i in 0..once.len() {
            for j in (i + 1)..once.len() {
                assert!(iou(&once[i].rect, &once[j].rect) <= 0.45);
            }
        }
    }
}
