use color_lock_common::color::ColorSample;
use color_lock_common::frame::Frame;
use image::{Rgb, RgbImage};

/// Green, as drawn over the live feed.
pub const HIGHLIGHT: Rgb<u8> = Rgb([0, 255, 0]);

const OUTLINE_STROKE: i64 = 2;
/// Baseline-left anchor of the label.
const LABEL_ANCHOR: (i64, i64) = (10, 30);
/// Pixel size of one glyph cell at font scale 1.0.
const CELL_PX: i64 = 3;
const GLYPH_W: i64 = 5;
const GLYPH_H: i64 = 7;
/// Line width of label glyphs.
const TEXT_STROKE: i64 = 2;

/// Draws the sample-region outline and the color label onto a copy of a frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameAnnotator {
    radius: u32,
    font_scale: f32,
}

impl FrameAnnotator {
    pub fn new(radius: u32) -> Self {
        Self {
            radius,
            font_scale: 1.0,
        }
    }

    /// Returns a new frame; `frame` itself is left untouched.
    pub fn annotate(&self, frame: &Frame, sample: &ColorSample) -> Frame {
        let mut img = frame.image().clone();
        let (cx, cy) = frame.center();
        draw_ring(&mut img, cx, cy, i64::from(self.radius), HIGHLIGHT);

        let label = format!("{} RGB{}", sample.hex(), sample.rgb_label());
        let cell = ((CELL_PX as f32 * self.font_scale).round() as i64).max(1);
        draw_text(&mut img, &label, LABEL_ANCHOR, cell, HIGHLIGHT);

        frame.with_image(img)
    }
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && x < i64::from(img.width()) && y < i64::from(img.height()) {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Circle outline `OUTLINE_STROKE` pixels wide, centered on `radius`.
fn draw_ring(img: &mut RgbImage, cx: i64, cy: i64, radius: i64, color: Rgb<u8>) {
    let half = OUTLINE_STROKE / 2;
    let inner = (radius - half).max(0);
    let outer = radius + half;
    let (inner2, outer2) = (inner * inner, outer * outer);
    for y in (cy - outer)..=(cy + outer) {
        for x in (cx - outer)..=(cx + outer) {
            let d2 = (x - cx).pow(2) + (y - cy).pow(2);
            if d2 >= inner2 && d2 < outer2 {
                put(img, x, y, color);
            }
        }
    }
}

fn fill(img: &mut RgbImage, x: (i64, i64), y: (i64, i64), color: Rgb<u8>) {
    for py in y.0..y.1 {
        for px in x.0..x.1 {
            put(img, px, py, color);
        }
    }
}

/// Render `text` with its baseline at `anchor.1`, starting at `anchor.0`.
/// Characters without a glyph advance the cursor without drawing.
///
/// Each lit glyph cell is a `TEXT_STROKE` square at the cell origin, joined
/// to lit right and lower neighbours, so strokes stay `TEXT_STROKE` wide at
/// any cell size.
fn draw_text(img: &mut RgbImage, text: &str, anchor: (i64, i64), cell: i64, color: Rgb<u8>) {
    let stroke = TEXT_STROKE.min(cell);
    let top = anchor.1 - GLYPH_H * cell;
    let mut left = anchor.0;
    for ch in text.chars() {
        if let Some(rows) = glyph(ch) {
            let lit = |row: usize, col: i64| {
                col < GLYPH_W
                    && rows
                        .get(row)
                        .is_some_and(|bits| bits & (1 << (GLYPH_W - 1 - col)) != 0)
            };
            for row in 0..rows.len() {
                for col in 0..GLYPH_W {
                    if !lit(row, col) {
                        continue;
                    }
                    let x0 = left + col * cell;
                    let y0 = top + row as i64 * cell;
                    fill(img, (x0, x0 + stroke), (y0, y0 + stroke), color);
                    if lit(row, col + 1) {
                        fill(img, (x0 + stroke, x0 + cell), (y0, y0 + stroke), color);
                    }
                    if lit(row + 1, col) {
                        fill(img, (x0, x0 + stroke), (y0 + stroke, y0 + cell), color);
                    }
                }
            }
        }
        left += (GLYPH_W + 1) * cell;
    }
}

/// 5x7 bitmaps for the characters a label can contain.
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'a' => [0x00, 0x00, 0x0E, 0x01, 0x0F, 0x11, 0x0F],
        'b' => [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x1E],
        'c' => [0x00, 0x00, 0x0E, 0x10, 0x10, 0x11, 0x0E],
        'd' => [0x01, 0x01, 0x0D, 0x13, 0x11, 0x11, 0x0F],
        'e' => [0x00, 0x00, 0x0E, 0x11, 0x1F, 0x10, 0x0E],
        'f' => [0x06, 0x09, 0x08, 0x1C, 0x08, 0x08, 0x08],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        '#' => [0x0A, 0x0A, 0x1F, 0x0A, 0x1F, 0x0A, 0x0A],
        '(' => [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02],
        ')' => [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08],
        ',' => [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        _ => return None,
    };
    Some(rows)
}
