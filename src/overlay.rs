//! Detection overlay rendering.
//!
//! Pure function of (frame, detections): draws one rectangle and label per
//! detection onto a copy of the frame and returns the copy. The input frame
//! is never mutated. Callers that have nothing to draw can skip the call and
//! keep displaying the captured frame; when called with no detections the
//! result is pixel-identical to the input.

use crate::detect::Detection;
use crate::frame::{Frame, BYTES_PER_PIXEL};

/// Box colors (BGRA), selected by class id modulo the palette length.
const PALETTE: [[u8; 4]; 4] = [
    [0, 0, 255, 255],   // red
    [255, 0, 0, 255],   // blue
    [0, 200, 0, 255],   // green
    [0, 165, 255, 255], // orange
];

const BOX_THICKNESS: i32 = 3;
const LABEL_BG: [u8; 4] = [0, 0, 0, 200];
const LABEL_FG: [u8; 4] = [255, 255, 255, 255];
const GLYPH_ADVANCE: i32 = 6;
const GLYPH_HEIGHT: i32 = 7;

/// Draw `detections` onto a copy of `frame` and return the copy.
pub fn render(frame: &Frame, detections: &[Detection]) -> Frame {
    let width = frame.width();
    let height = frame.height();
    let mut pixels = frame.pixels_cloned();

    for detection in detections {
        let color = PALETTE[detection.class_id % PALETTE.len()];
        let left = detection.rect.left.round() as i32;
        let top = detection.rect.top.round() as i32;
        let right = detection.rect.right.round() as i32;
        let bottom = detection.rect.bottom.round() as i32;

        for inset in 0..BOX_THICKNESS {
            draw_rect_outline(
                &mut pixels,
                width,
                height,
                left + inset,
                top + inset,
                right - inset,
                bottom - inset,
                color,
            );
        }

        let label = format!(
            "{} {:.0}%",
            detection.class_name,
            detection.confidence * 100.0
        );
        let label_w = label.chars().count() as i32 * GLYPH_ADVANCE + 3;
        let label_x = left.max(0);
        let label_y = (top - GLYPH_HEIGHT - 3).max(0);
        fill_rect(
            &mut pixels,
            width,
            height,
            label_x,
            label_y,
            label_x + label_w,
            label_y + GLYPH_HEIGHT + 2,
            LABEL_BG,
        );
        draw_text(
            &mut pixels,
            width,
            height,
            label_x + 2,
            label_y + 1,
            &label,
            LABEL_FG,
        );
    }

    Frame::new(pixels, width, height)
}

#[inline]
fn put_pixel(pixels: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return;
    }
    let idx = (y as usize * width as usize + x as usize) * BYTES_PER_PIXEL;
    pixels[idx..idx + BYTES_PER_PIXEL].copy_from_slice(&color);
}

#[allow(clippy::too_many_arguments)]
fn draw_rect_outline(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    color: [u8; 4],
) {
    if right < left || bottom < top {
        return;
    }
    for x in left..=right {
        put_pixel(pixels, width, height, x, top, color);
        put_pixel(pixels, width, height, x, bottom, color);
    }
    for y in top..=bottom {
        put_pixel(pixels, width, height, left, y, color);
        put_pixel(pixels, width, height, right, y, color);
    }
}

#[allow(clippy::too_many_arguments)]
fn fill_rect(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    color: [u8; 4],
) {
    for y in top..bottom {
        for x in left..right {
            put_pixel(pixels, width, height, x, y, color);
        }
    }
}

fn draw_text(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    mut x: i32,
    y: i32,
    text: &str,
    color: [u8; 4],
) {
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                for col in 0..5 {
                    if (pattern >> (4 - col)) & 1 == 1 {
                        put_pixel(pixels, width, height, x + col, y + row as i32, color);
                    }
                }
            }
        }
        x += GLYPH_ADVANCE;
    }
}

/// 5x7 bitmap glyphs for label text. Characters without a glyph advance the
/// cursor without drawing.
fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    match ch {
        'A' => Some([
            0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001,
        ]),
        'C' => Some([
            0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110,
        ]),
        'D' => Some([
            0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110,
        ]),
        'E' => Some([
            0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111,
        ]),
        'H' => Some([
            0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001,
        ]),
        'N' => Some([
            0b10001, 0b11001, 0b10101, 0b10101, 0b10011, 0b10001, 0b10001,
        ]),
        'O' => Some([
            0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110,
        ]),
        'P' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000,
        ]),
        'R' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001,
        ]),
        'S' => Some([
            0b01111, 0b10000, 0b01110, 0b00001, 0b00001, 0b10001, 0b01110,
        ]),
        '0' => Some([
            0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110,
        ]),
        '1' => Some([
            0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110,
        ]),
        '2' => Some([
            0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111,
        ]),
        '3' => Some([
            0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110,
        ]),
        '4' => Some([
            0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010,
        ]),
        '5' => Some([
            0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110,
        ]),
        '6' => Some([
            0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110,
        ]),
        '7' => Some([
            0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000,
        ]),
        '8' => Some([
            0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110,
        ]),
        '9' => Some([
            0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100,
        ]),
        '%' => Some([
            0b10001, 0b10010, 0b00100, 0b01000, 0b10010, 0b10001, 0b00000,
        ]),
        '.' => Some([0, 0, 0, 0, 0, 0b00110, 0b00110]),
        ' ' => Some([0, 0, 0, 0, 0, 0, 0]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Rect;

    fn solid_frame(width: u32, height: u32, bgra: [u8; 4]) -> Frame {
        let mut data = Vec::with_capacity((width * height) as usize * 4);
        for _ in 0..width * height {
            data.extend_from_slice(&bgra);
        }
        Frame::new(data, width, height)
    }

    fn det(rect: Rect, class_id: usize) -> Detection {
        Detection {
            rect,
            confidence: 0.9,
            class_id,
            class_name: "person".into(),
        }
    }

    #[test]
    fn empty_detections_render_is_pixel_identical() {
        let frame = solid_frame(32, 24, [10, 20, 30, 255]);
        let rendered = render(&frame, &[]);
        assert_eq!(rendered.width(), frame.width());
        assert_eq!(rendered.height(), frame.height());
        assert_eq!(rendered.data(), frame.data());
    }

    #[test]
    fn render_does_not_mutate_input() {
        let frame = solid_frame(64, 64, [10, 20, 30, 255]);
        let before = frame.pixels_cloned();
        let _ = render(&frame, &[det(Rect::new(8.0, 20.0, 40.0, 50.0), 0)]);
        assert_eq!(frame.data(), &before[..]);
    }

    #[test]
    fn box_edge_uses_class_palette_color() {
        let frame = solid_frame(64, 64, [0, 0, 0, 255]);
        let rendered = render(&frame, &[det(Rect::new(10.0, 20.0, 50.0, 60.0), 0)]);
        // Class 0 is red in BGRA.
        assert_eq!(rendered.pixel(10, 20), Some([0, 0, 255, 255]));
        assert_eq!(rendered.pixel(30, 20), Some([0, 0, 255, 255]));

        let rendered = render(&frame, &[det(Rect::new(10.0, 20.0, 50.0, 60.0), 1)]);
        assert_eq!(rendered.pixel(10, 20), Some([255, 0, 0, 255]));

        // Modulo wrap: class 4 maps back to red.
        let rendered = render(&frame, &[det(Rect::new(10.0, 20.0, 50.0, 60.0), 4)]);
        assert_eq!(rendered.pixel(10, 20), Some([0, 0, 255, 255]));
    }

    #[test]
    fn boxes_partially_outside_frame_are_clipped() {
        let frame = solid_frame(32, 32, [0, 0, 0, 255]);
        let rendered = render(&frame, &[det(Rect::new(-10.0, -10.0, 40.0, 40.0), 0)]);
        assert_eq!(rendered.width(), 32);
        assert_eq!(rendered.height(), 32);
    }
}
