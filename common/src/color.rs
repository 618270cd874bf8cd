use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::sync::{Mutex, PoisonError, RwLock};

const SENTINEL_HEX: &str = "#------";
const SENTINEL_RGB: &str = "(---,---,---)";

/// A representative color derived from one frame.
///
/// `rgb` is `None` only for the sentinel reported before any frame has been
/// sampled. Samples are immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorSample {
    rgb: Option<[u8; 3]>,
}

impl ColorSample {
    pub const SENTINEL: ColorSample = ColorSample { rgb: None };

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            rgb: Some([r, g, b]),
        }
    }

    pub fn rgb(&self) -> Option<[u8; 3]> {
        self.rgb
    }

    pub fn is_sentinel(&self) -> bool {
        self.rgb.is_none()
    }

    /// Lowercase `#rrggbb`, or `#------` for the sentinel.
    pub fn hex(&self) -> String {
        match self.rgb {
            Some([r, g, b]) => rgb_to_hex(r, g, b),
            None => SENTINEL_HEX.to_string(),
        }
    }

    /// `(r,g,b)`, or `(---,---,---)` for the sentinel.
    pub fn rgb_label(&self) -> String {
        match self.rgb {
            Some([r, g, b]) => format!("({r},{g},{b})"),
            None => SENTINEL_RGB.to_string(),
        }
    }
}

impl Default for ColorSample {
    fn default() -> Self {
        Self::SENTINEL
    }
}

/// Serializes as `{"hex": "#rrggbb", "rgb": "(r,g,b)"}`.
impl Serialize for ColorSample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ColorSample", 2)?;
        s.serialize_field("hex", &self.hex())?;
        s.serialize_field("rgb", &self.rgb_label())?;
        s.end()
    }
}

pub fn rgb_to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Last color produced by the capture loop. Written by the loop, read by any
/// number of pollers.
#[derive(Debug, Default)]
pub struct SharedColorState {
    current: RwLock<ColorSample>,
}

impl SharedColorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_current(&self) -> ColorSample {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_current(&self, sample: ColorSample) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = sample;
    }
}

/// Append-only log of saved samples, in insertion order.
#[derive(Debug, Default)]
pub struct ColorHistory {
    entries: Mutex<Vec<ColorSample>>,
}

impl ColorHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy whatever `state` holds right now onto the end of the log,
    /// including the sentinel if nothing has been sampled yet.
    pub fn append_history(&self, state: &SharedColorState) -> ColorSample {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let sample = state.get_current();
        entries.push(sample);
        sample
    }

    pub fn list_history(&self) -> Vec<ColorSample> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
