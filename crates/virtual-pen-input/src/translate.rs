//! Raw sample to host unit translation.
//!
//! Both translators are pure: the same raw input always maps to the same host
//! value, and every input (including out-of-range values) maps to something
//! inside the device's declared axis ranges.

use virtual_pen_types::{DisplayMapping, FitMode, MappingError, PressureMapping};

/// Maps raw coordinates onto `[0, width-1] x [0, height-1]`.
#[derive(Debug, Clone)]
pub struct CoordinateTranslator {
    mapping: DisplayMapping,
    x_max: f64,
    y_max: f64,
}

impl CoordinateTranslator {
    /// Fails when the mapping has no usable display size.
    pub fn new(mapping: DisplayMapping) -> Result<Self, MappingError> {
        mapping.validate()?;
        Ok(Self {
            mapping,
            x_max: f64::from(mapping.width - 1),
            y_max: f64::from(mapping.height - 1),
        })
    }

    pub fn mapping(&self) -> &DisplayMapping {
        &self.mapping
    }

    /// Inclusive axis maxima, `(width-1, height-1)`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn bounds(&self) -> (i32, i32) {
        (self.x_max as i32, self.y_max as i32)
    }

    pub fn translate(&self, raw_x: f64, raw_y: f64) -> (i32, i32) {
        match self.mapping.fit {
            FitMode::Stretched => {
                let source = self.mapping.source;
                let x = normalize(raw_x, source.map(|s| s.width));
                let y = normalize(raw_y, source.map(|s| s.height));
                (scale(x, self.x_max), scale(y, self.y_max))
            }
            FitMode::Fixed => (clamp(raw_x, self.x_max), clamp(raw_y, self.y_max)),
        }
    }
}

/// Bring a raw coordinate into `0.0..=1.0` (unclamped).
fn normalize(raw: f64, extent: Option<f64>) -> f64 {
    match extent {
        // The last client pixel maps onto the last host pixel.
        Some(extent) => raw / (extent - 1.0).max(1.0),
        None => raw,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn scale(normalized: f64, max: f64) -> i32 {
    (normalized.clamp(0.0, 1.0) * max).round() as i32
}

#[allow(clippy::cast_possible_truncation)]
fn clamp(raw: f64, max: f64) -> i32 {
    raw.round().clamp(0.0, max) as i32
}

/// Maps raw pressure onto `[0, host_max]` with a dead-zone and a gain.
#[derive(Debug, Clone)]
pub struct PressureTranslator {
    floor: f64,
    /// Raw pressure at which the host maximum is reached.
    reach: f64,
    host_max: i32,
}

impl PressureTranslator {
    pub fn new(mapping: PressureMapping, host_max: i32) -> Result<Self, MappingError> {
        mapping.validate()?;
        let sensitivity = f64::from(mapping.sensitivity) / 100.0;
        Ok(Self {
            floor: f64::from(mapping.min_pressure) / 100.0,
            reach: 1.0 - 0.9 * sensitivity,
            host_max: host_max.max(0),
        })
    }

    pub fn host_max(&self) -> i32 {
        self.host_max
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn translate(&self, raw: f64) -> i32 {
        let raw = if raw.is_finite() {
            raw.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if raw < self.floor {
            return 0;
        }
        let scaled = (raw / self.reach).min(1.0);
        (scaled * f64::from(self.host_max)).round() as i32
    }
}
