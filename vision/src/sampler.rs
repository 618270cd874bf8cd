use color_lock_common::color::ColorSample;
use color_lock_common::frame::Frame;

/// Averages the pixels of a fixed-radius disc at the frame center.
#[derive(Debug, Clone, Copy)]
pub struct ColorSampler {
    radius: u32,
}

impl ColorSampler {
    pub const DEFAULT_RADIUS: u32 = 50;

    pub fn new(radius: u32) -> Self {
        Self { radius }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Mean of each channel over every in-bounds pixel whose distance from
    /// the center is at most `radius`, truncated to an integer.
    pub fn sample(&self, frame: &Frame) -> ColorSample {
        let img = frame.image();
        let (cx, cy) = frame.center();
        let r = i64::from(self.radius);
        let r2 = r * r;

        // Clamp the disc's bounding box to the image.
        let x0 = (cx - r).max(0);
        let x1 = (cx + r).min(i64::from(img.width()) - 1);
        let y0 = (cy - r).max(0);
        let y1 = (cy + r).min(i64::from(img.height()) - 1);

        let mut sums = [0u64; 3];
        let mut count = 0u64;
        for y in y0..=y1 {
            let dy = y - cy;
            for x in x0..=x1 {
                let dx = x - cx;
                if dx * dx + dy * dy > r2 {
                    continue;
                }
                let px = img.get_pixel(x as u32, y as u32).0;
                for (sum, &c) in sums.iter_mut().zip(px.iter()) {
                    *sum += u64::from(c);
                }
                count += 1;
            }
        }

        // The center pixel of a non-empty frame is always inside the disc.
        if count == 0 {
            return ColorSample::SENTINEL;
        }
        let [r, g, b] = sums.map(|s| (s / count) as u8);
        ColorSample::from_rgb(r, g, b)
    }
}

impl Default for ColorSampler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RADIUS)
    }
}
