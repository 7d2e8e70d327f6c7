//! Spatial gate: literal placements against the visible frame.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::SpatialConfig;
use crate::gate::{SpatialCheck, SpatialReport};
use crate::inspect::{self, PlacementKind};

/// Flags literal coordinates that fall outside the default camera frame.
///
/// Only placements [`inspect::extract_placements`] recognizes are checked,
/// so computed positions are never reported.
#[derive(Debug, Clone)]
pub struct SpatialValidator {
    config: SpatialConfig,
}

impl SpatialValidator {
    pub fn new(config: SpatialConfig) -> Self {
        Self { config }
    }

    fn outside(&self, x: f64, y: f64) -> bool {
        x.abs() > self.config.frame_half_width || y.abs() > self.config.frame_half_height
    }

    pub fn validate(&self, code: &str) -> SpatialReport {
        let mut out_of_bounds = Vec::new();
        let mut by_position: BTreeMap<(i64, i64), Vec<usize>> = BTreeMap::new();

        for p in inspect::extract_placements(code) {
            if self.outside(p.x, p.y) {
                let message = match p.kind {
                    PlacementKind::Absolute => format!(
                        "line {}: {} places object at ({}, {}), outside the visible frame (±{}, ±{})",
                        p.line,
                        p.construct,
                        p.x,
                        p.y,
                        self.config.frame_half_width,
                        self.config.frame_half_height
                    ),
                    PlacementKind::Relative => format!(
                        "line {}: {} moves object by ({}, {}), more than the visible frame allows (±{}, ±{})",
                        p.line,
                        p.construct,
                        p.x,
                        p.y,
                        self.config.frame_half_width,
                        self.config.frame_half_height
                    ),
                };
                out_of_bounds.push(message);
            }

            if p.kind == PlacementKind::Absolute && !(p.x == 0.0 && p.y == 0.0) {
                // hundredths are enough to call two placements the same spot
                let key = ((p.x * 100.0).round() as i64, (p.y * 100.0).round() as i64);
                by_position.entry(key).or_default().push(p.line);
            }
        }

        let overlaps: Vec<String> = by_position
            .into_iter()
            .filter(|(_, lines)| lines.len() > 1)
            .map(|((x, y), lines)| {
                let lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
                format!(
                    "lines {}: several objects placed at ({}, {}) may overlap",
                    lines.join(", "),
                    x as f64 / 100.0,
                    y as f64 / 100.0
                )
            })
            .collect();

        let needs_regeneration =
            !out_of_bounds.is_empty() || (self.config.fail_on_overlap && !overlaps.is_empty());

        debug!(
            out_of_bounds = out_of_bounds.len(),
            overlaps = overlaps.len(),
            "spatial validation finished"
        );

        SpatialReport {
            out_of_bounds,
            overlaps,
            needs_regeneration,
        }
    }
}

impl Default for SpatialValidator {
    fn default() -> Self {
        Self::new(SpatialConfig::default())
    }
}

impl SpatialCheck for SpatialValidator {
    fn check(&self, code: &str) -> SpatialReport {
        self.validate(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_frame_code_passes() {
        let code = "a.move_to(LEFT * 3 + UP * 2)\nb.shift(RIGHT * 7)\nc.move_to(np.array([7.1, -4, 0]))\n";
        let report = SpatialValidator::default().validate(code);
        assert!(!report.blocks());
        assert!(report.out_of_bounds.is_empty());
    }

    #[test]
    fn test_out_of_bounds_absolute_is_flagged_with_line() {
        let code = "title = Text('x')\nbox.move_to(RIGHT * 8)\n";
        let report = SpatialValidator::default().validate(code);
        assert!(report.needs_regeneration);
        assert_eq!(report.out_of_bounds.len(), 1);
        assert!(report.out_of_bounds[0].starts_with("line 2: move_to(RIGHT * 8) places object at (8, 0)"));
    }

    #[test]
    fn test_frame_is_asymmetric() {
        // 5 is fine horizontally but not vertically.
        let report = SpatialValidator::default().validate("a.move_to([5, 0, 0])\nb.move_to([0, 5, 0])\n");
        assert_eq!(report.out_of_bounds.len(), 1);
        assert!(report.out_of_bounds[0].starts_with("line 2"));
    }

    #[test]
    fn test_large_shift_is_flagged() {
        let report = SpatialValidator::default().validate("dot.shift(DOWN * 4.5)\n");
        assert!(report.needs_regeneration);
        assert!(report.out_of_bounds[0].contains("moves object by"));
    }

    #[test]
    fn test_overlap_is_a_warning_unless_configured() {
        let code = "a.move_to(RIGHT * 2)\nb.move_to(np.array([2, 0, 0]))\n";
        let report = SpatialValidator::default().validate(code);
        assert_eq!(report.overlaps.len(), 1);
        assert!(report.overlaps[0].starts_with("lines 1, 2"));
        assert!(!report.needs_regeneration);

        let strict = SpatialValidator::new(SpatialConfig {
            fail_on_overlap: true,
            ..SpatialConfig::default()
        });
        assert!(strict.validate(code).needs_regeneration);
    }

    #[test]
    fn test_computed_positions_are_ignored() {
        let code = "a.move_to(b.get_center() + RIGHT * 20)\nc.next_to(d, RIGHT * 30)\n";
        let report = SpatialValidator::default().validate(code);
        assert!(report.out_of_bounds.is_empty());
    }

    #[test]
    fn test_data_arrays_are_not_positions() {
        let code = "\
logits = np.array([12, 5, 3])
w = weight_array([20, 30])
chart = BarChart(values=np.array([40, 50]))
probs = softmax(np.array([9, 1]))
";
        let report = SpatialValidator::default().validate(code);
        assert!(report.out_of_bounds.is_empty(), "{:?}", report.out_of_bounds);
        assert!(!report.needs_regeneration);
    }

    #[test]
    fn test_arrays_passed_to_mobjects_are_checked() {
        let code = "\
start = Dot(np.array([9, 0, 0]))
edge = Line(np.array([0, 0, 0]), end=np.array([0, 6, 0]))
";
        let report = SpatialValidator::default().validate(code);
        assert_eq!(report.out_of_bounds.len(), 2);
        assert!(report.out_of_bounds[0].starts_with("line 1: np.array([9, 0, 0])"));
        assert!(report.out_of_bounds[1].starts_with("line 2: np.array([0, 6, 0])"));
    }
}
