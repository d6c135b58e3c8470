// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Label templates — physical dimensions plus layout flags.

use serde::{Deserialize, Serialize};

/// Labels with both sides at or under this size use the compact layout.
pub const COMPACT_THRESHOLD_MM: f64 = 45.0;

/// Physical label description plus layout flags.
///
/// A template either selects one of the two built-in layouts (by physical
/// size) or carries a raw custom ZPL string with `{{token}}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub width_mm: f64,
    pub height_mm: f64,
    pub margin_mm: f64,
    /// Print head resolution. 203 is the common 8 dots/mm head.
    pub dpi: u32,
    /// Raw custom ZPL with `{{token}}` placeholders; overrides the built-in
    /// layouts entirely when present.
    pub custom_zpl: Option<String>,
    /// Render the title field in the emphasized (wider) font.
    pub bold_title: bool,
    /// Draw a box around the printable area.
    pub show_border: bool,
}

impl Template {
    /// A label of the given size with the common fleet settings: 1.5 mm
    /// margin, 203 DPI head, built-in layout.
    pub fn new(width_mm: f64, height_mm: f64) -> Self {
        Self {
            width_mm,
            height_mm,
            margin_mm: 1.5,
            dpi: 203,
            custom_zpl: None,
            bold_title: true,
            show_border: false,
        }
    }

    /// Dots per millimetre for this template's resolution.
    ///
    /// 203 DPI works out to 8 dots/mm (7.99, rounded per dimension); other
    /// resolutions scale proportionally.
    pub fn dots_per_mm(&self) -> f64 {
        f64::from(self.dpi) / 25.4
    }

    /// Convert a physical dimension to device dots, rounded to the nearest
    /// whole dot.
    pub fn dots(&self, mm: f64) -> u32 {
        (mm * self.dots_per_mm()).round() as u32
    }

    /// Printable width in dots (label width minus both margins).
    pub fn printable_width_dots(&self) -> u32 {
        self.dots((self.width_mm - 2.0 * self.margin_mm).max(0.0))
    }

    /// Whether the built-in compact layout applies to this label size.
    pub fn is_compact(&self) -> bool {
        self.width_mm <= COMPACT_THRESHOLD_MM && self.height_mm <= COMPACT_THRESHOLD_MM
    }
}

impl Default for Template {
    /// The fleet's most common stock: a 2" x 1" label.
    fn default() -> Self {
        Self::new(50.8, 25.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dots_at_203_dpi_is_8_per_mm() {
        let template = Template::new(50.0, 30.0);
        assert_eq!(template.dots(1.0), 8);
        assert_eq!(template.dots(10.0), 80);
        assert_eq!(template.dots(50.0), 400);
    }

    #[test]
    fn dots_scale_with_dpi() {
        let mut template = Template::new(50.0, 30.0);
        template.dpi = 300;
        // 300 / 25.4 = 11.81 dots/mm
        assert_eq!(template.dots(10.0), 118);
    }

    #[test]
    fn compact_threshold_includes_45mm_square() {
        assert!(Template::new(45.0, 45.0).is_compact());
        assert!(Template::new(40.0, 40.0).is_compact());
        assert!(!Template::new(45.1, 45.0).is_compact());
        assert!(!Template::new(100.0, 30.0).is_compact());
    }
}
