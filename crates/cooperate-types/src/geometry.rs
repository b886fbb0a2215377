//! Display geometry and cursor coordinates.

use serde::{Deserialize, Serialize};

/// Upper bound of a normalized coordinate (percent of the display).
pub const NORMALIZED_MAX: i32 = 100;

/// A point, either in display pixels or normalized to `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    #[must_use]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Geometry of the local display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayGeometry {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl DisplayGeometry {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Convert a pixel position into percent of the display.
    ///
    /// Positions outside the display are clamped first; a degenerate
    /// display maps everything to the origin.
    #[must_use]
    pub fn normalize(&self, pos: Coordinate) -> Coordinate {
        Coordinate {
            x: to_percent(pos.x, self.width),
            y: to_percent(pos.y, self.height),
        }
    }

    /// Convert a normalized position back into display pixels.
    #[must_use]
    pub fn denormalize(&self, pos: Coordinate) -> Coordinate {
        Coordinate {
            x: from_percent(pos.x, self.width),
            y: from_percent(pos.y, self.height),
        }
    }

    /// Center of the display in pixels.
    #[must_use]
    pub fn center(&self) -> Coordinate {
        Coordinate {
            x: i32::try_from(self.width / 2).unwrap_or(i32::MAX),
            y: i32::try_from(self.height / 2).unwrap_or(i32::MAX),
        }
    }
}

impl Default for DisplayGeometry {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

/// Border region of the local display the cursor is in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HotArea {
    #[default]
    None,
    Left,
    Right,
    Top,
    Bottom,
}

impl std::fmt::Display for HotArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
            Self::Top => write!(f, "top"),
            Self::Bottom => write!(f, "bottom"),
        }
    }
}

/// Cursor position of one device together with its display size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseLocation {
    /// Position in display pixels.
    pub position: Coordinate,
    pub display: DisplayGeometry,
}

fn to_percent(value: i32, extent: u32) -> i32 {
    let extent = i64::from(extent);
    if extent <= 1 {
        return 0;
    }
    let clamped = i64::from(value).clamp(0, extent - 1);
    let percent = clamped * i64::from(NORMALIZED_MAX) / (extent - 1);
    i32::try_from(percent).unwrap_or(NORMALIZED_MAX)
}

fn from_percent(percent: i32, extent: u32) -> i32 {
    let extent = i64::from(extent);
    if extent <= 1 {
        return 0;
    }
    let clamped = i64::from(percent).clamp(0, i64::from(NORMALIZED_MAX));
    let pixels = clamped * (extent - 1) / i64::from(NORMALIZED_MAX);
    i32::try_from(pixels).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_corners() {
        let display = DisplayGeometry::new(1920, 1080);
        assert_eq!(display.normalize(Coordinate::new(0, 0)), Coordinate::new(0, 0));
        assert_eq!(
            display.normalize(Coordinate::new(1919, 1079)),
            Coordinate::new(100, 100)
        );
    }

    #[test]
    fn normalize_clamps_out_of_range() {
        let display = DisplayGeometry::new(1920, 1080);
        assert_eq!(
            display.normalize(Coordinate::new(-50, 5000)),
            Coordinate::new(0, 100)
        );
    }

    #[test]
    fn denormalize_midpoint() {
        let display = DisplayGeometry::new(1001, 501);
        assert_eq!(
            display.denormalize(Coordinate::new(50, 50)),
            Coordinate::new(500, 250)
        );
    }

    #[test]
    fn degenerate_display_maps_to_origin() {
        let display = DisplayGeometry::new(0, 1);
        assert_eq!(display.normalize(Coordinate::new(10, 10)), Coordinate::new(0, 0));
        assert_eq!(display.denormalize(Coordinate::new(100, 100)), Coordinate::new(0, 0));
    }

    #[test]
    fn center_of_default_display() {
        assert_eq!(DisplayGeometry::default().center(), Coordinate::new(960, 540));
    }
}
