//! Display and pressure mapping configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest display dimension accepted, in pixels.
pub const MAX_DISPLAY_SIZE: u32 = 16384;

/// Upper bound of the percentage-valued pressure settings.
pub const MAX_PERCENT: u8 = 100;

/// A mapping that may not be used to start a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("display {axis} size {value} outside 1..={}", MAX_DISPLAY_SIZE)]
    DisplaySize { axis: Axis, value: u32 },

    #[error("source {axis} extent must be positive")]
    SourceExtent { axis: Axis },

    #[error("{setting} {value} outside 0..={}", MAX_PERCENT)]
    Percent { setting: &'static str, value: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::X => write!(f, "x"),
            Self::Y => write!(f, "y"),
        }
    }
}

/// How raw coordinates are fitted onto the host display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Rescale the full input range onto the display, per axis.
    #[default]
    Stretched,
    /// Use raw coordinates as host pixels, clamped to the display.
    Fixed,
}

/// Extent of the companion client's drawing surface in its own pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceExtent {
    pub width: f64,
    pub height: f64,
}

/// Host display area the stylus is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayMapping {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub fit: FitMode,
    /// When set, raw coordinates are client pixels within this extent;
    /// otherwise they are normalized to `0.0..=1.0`.
    #[serde(default)]
    pub source: Option<SourceExtent>,
}

impl DisplayMapping {
    #[must_use]
    pub fn new(width: u32, height: u32, fit: FitMode) -> Self {
        Self {
            width,
            height,
            fit,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, width: f64, height: f64) -> Self {
        self.source = Some(SourceExtent { width, height });
        self
    }

    /// Check the mapping can back a virtual device.
    pub fn validate(&self) -> Result<(), MappingError> {
        for (axis, value) in [(Axis::X, self.width), (Axis::Y, self.height)] {
            if value == 0 || value > MAX_DISPLAY_SIZE {
                return Err(MappingError::DisplaySize { axis, value });
            }
        }
        if let Some(source) = self.source {
            for (axis, extent) in [(Axis::X, source.width), (Axis::Y, source.height)] {
                if !(extent.is_finite() && extent > 0.0) {
                    return Err(MappingError::SourceExtent { axis });
                }
            }
        }
        Ok(())
    }
}

/// Raw pressure to host pressure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureMapping {
    /// Dead-zone floor, in percent of full pressure.
    #[serde(default = "default_min_pressure")]
    pub min_pressure: u8,
    /// Gain, in percent. Higher values reach full host pressure sooner.
    #[serde(default = "default_sensitivity")]
    pub sensitivity: u8,
}

impl Default for PressureMapping {
    fn default() -> Self {
        Self {
            min_pressure: default_min_pressure(),
            sensitivity: default_sensitivity(),
        }
    }
}

impl PressureMapping {
    pub fn validate(&self) -> Result<(), MappingError> {
        if self.min_pressure > MAX_PERCENT {
            return Err(MappingError::Percent {
                setting: "min_pressure",
                value: self.min_pressure,
            });
        }
        if self.sensitivity > MAX_PERCENT {
            return Err(MappingError::Percent {
                setting: "sensitivity",
                value: self.sensitivity,
            });
        }
        Ok(())
    }
}

fn default_min_pressure() -> u8 {
    10
}

fn default_sensitivity() -> u8 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_width_is_rejected() {
        let mapping = DisplayMapping::new(0, 1080, FitMode::Stretched);
        assert_eq!(
            mapping.validate(),
            Err(MappingError::DisplaySize {
                axis: Axis::X,
                value: 0
            })
        );
    }

    #[test]
    fn oversized_height_is_rejected() {
        let mapping = DisplayMapping::new(1920, MAX_DISPLAY_SIZE + 1, FitMode::Fixed);
        assert!(matches!(
            mapping.validate(),
            Err(MappingError::DisplaySize { axis: Axis::Y, .. })
        ));
    }

    #[test]
    fn ceiling_is_inclusive() {
        let mapping = DisplayMapping::new(MAX_DISPLAY_SIZE, MAX_DISPLAY_SIZE, FitMode::Fixed);
        assert!(mapping.validate().is_ok());
    }

    #[test]
    fn degenerate_source_is_rejected() {
        let mapping = DisplayMapping::new(1920, 1080, FitMode::Stretched).with_source(1080.0, 0.0);
        assert_eq!(
            mapping.validate(),
            Err(MappingError::SourceExtent { axis: Axis::Y })
        );
    }

    #[test]
    fn pressure_percent_bounds() {
        let ok = PressureMapping {
            min_pressure: 100,
            sensitivity: 0,
        };
        assert!(ok.validate().is_ok());

        let bad = PressureMapping {
            min_pressure: 10,
            sensitivity: 101,
        };
        assert!(matches!(
            bad.validate(),
            Err(MappingError::Percent {
                setting: "sensitivity",
                value: 101
            })
        ));
    }

    #[test]
    fn mapping_parses_from_toml() {
        let mapping: DisplayMapping = toml::from_str(
            r#"
width = 2560
height = 1600
fit = "fixed"
"#,
        )
        .unwrap();
        assert_eq!(mapping.fit, FitMode::Fixed);
        assert!(mapping.source.is_none());

        let pressure: PressureMapping = toml::from_str("sensitivity = 80").unwrap();
        assert_eq!(pressure.min_pressure, 10);
        assert_eq!(pressure.sensitivity, 80);
    }
}
