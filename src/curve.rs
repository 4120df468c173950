//! Sunrise brightness/color-temperature curve.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::types::{Brightness, ColorTemp};

type Result<T> = std::result::Result<T, Error>;

/// Target bulb state at a point of the ramp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Fraction of the ramp, 0.0 to 1.0.
    pub progress: f64,
    pub brightness: u16,
    pub color_temp: u16,
}

impl CurvePoint {
    pub fn new(progress: f64, brightness: u16, color_temp: u16) -> Self {
        CurvePoint {
            progress,
            brightness,
            color_temp,
        }
    }

    /// Whether the output values differ from `other` by more than `epsilon`.
    ///
    /// Progress is ignored: two ticks that land on the same values are the
    /// same state for the bulb.
    ///
    /// ```
    /// use tuya_sunrise_rs::CurvePoint;
    ///
    /// let a = CurvePoint::new(0.10, 100, 40);
    /// assert!(!a.differs_from(&CurvePoint::new(0.11, 102, 40), 2));
    /// assert!(a.differs_from(&CurvePoint::new(0.11, 103, 40), 2));
    /// ```
    pub fn differs_from(&self, other: &CurvePoint, epsilon: u16) -> bool {
        self.brightness.abs_diff(other.brightness) > epsilon
            || self.color_temp.abs_diff(other.color_temp) > epsilon
    }

    pub fn same_output(&self, other: &CurvePoint) -> bool {
        self.brightness == other.brightness && self.color_temp == other.color_temp
    }
}

/// An anchor as written in configuration: percent of the ramp (0-100).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Anchor {
    percent: f64,
    brightness: u16,
    color_temp: u16,
}

/// Ordered anchor points with linear interpolation in between.
///
/// ```
/// use std::time::Duration;
/// use tuya_sunrise_rs::Curve;
///
/// let curve = Curve::sunrise();
/// let start = curve.at(0.0);
/// assert_eq!((start.brightness, start.color_temp), (10, 0));
///
/// let halfway = curve.at_elapsed(Duration::from_secs(900), Duration::from_secs(1800));
/// assert_eq!((halfway.brightness, halfway.color_temp), (400, 300));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Anchor>", into = "Vec<Anchor>")]
pub struct Curve {
    points: Vec<CurvePoint>,
}

impl Default for Curve {
    fn default() -> Self {
        Self::sunrise()
    }
}

impl Curve {
    /// Pre-dawn deep red through to full daylight.
    pub fn sunrise() -> Self {
        Curve {
            points: vec![
                CurvePoint::new(0.0, 10, 0),
                CurvePoint::new(0.15, 50, 50),
                CurvePoint::new(0.30, 150, 150),
                CurvePoint::new(0.50, 400, 300),
                CurvePoint::new(0.70, 700, 450),
                CurvePoint::new(0.85, 900, 550),
                CurvePoint::new(1.0, 1000, 650),
            ],
        }
    }

    /// Build a curve from anchors, checking that it is a valid monotonic ramp.
    pub fn new(points: Vec<CurvePoint>) -> Result<Self> {
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return Err(Error::InvalidCurve("no anchors".into()));
        };
        if points.len() < 2 {
            return Err(Error::InvalidCurve("need at least two anchors".into()));
        }
        if first.progress != 0.0 || last.progress != 1.0 {
            return Err(Error::InvalidCurve(
                "anchors must start at progress 0 and end at 1".into(),
            ));
        }

        for point in &points {
            if !Brightness::is_valid(point.brightness) || !ColorTemp::is_valid(point.color_temp)
            {
                return Err(Error::InvalidCurve(format!(
                    "anchor at {} is outside the device range",
                    point.progress
                )));
            }
        }

        for pair in points.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if b.progress <= a.progress {
                return Err(Error::InvalidCurve(format!(
                    "progress must strictly increase ({} then {})",
                    a.progress, b.progress
                )));
            }
            if b.brightness < a.brightness || b.color_temp < a.color_temp {
                return Err(Error::InvalidCurve(format!(
                    "values decrease between {} and {}",
                    a.progress, b.progress
                )));
            }
        }

        Ok(Curve { points })
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn start(&self) -> CurvePoint {
        self.points[0]
    }

    pub fn end(&self) -> CurvePoint {
        self.points[self.points.len() - 1]
    }

    /// Target state after `elapsed` of a ramp lasting `duration`.
    pub fn at_elapsed(&self, elapsed: Duration, duration: Duration) -> CurvePoint {
        if duration.is_zero() {
            return self.end();
        }
        self.at(elapsed.as_secs_f64() / duration.as_secs_f64())
    }

    /// Target state at `progress` (clamped to 0..=1).
    pub fn at(&self, progress: f64) -> CurvePoint {
        let progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };

        // First anchor at or beyond progress, and the one before it
        let next = self
            .points
            .iter()
            .position(|p| p.progress >= progress)
            .unwrap_or(self.points.len() - 1);
        let upper = self.points[next];
        if upper.progress == progress || next == 0 {
            return CurvePoint { progress, ..upper };
        }

        let lower = self.points[next - 1];
        let local = (progress - lower.progress) / (upper.progress - lower.progress);
        CurvePoint {
            progress,
            brightness: lerp(lower.brightness, upper.brightness, local),
            color_temp: lerp(lower.color_temp, upper.color_temp, local),
        }
    }
}

fn lerp(from: u16, to: u16, t: f64) -> u16 {
    let value = f64::from(from) + (f64::from(to) - f64::from(from)) * t;
    value.round() as u16
}

impl TryFrom<Vec<Anchor>> for Curve {
    type Error = Error;

    fn try_from(anchors: Vec<Anchor>) -> Result<Self> {
        Curve::new(
            anchors
                .into_iter()
                .map(|a| CurvePoint::new(a.percent / 100.0, a.brightness, a.color_temp))
                .collect(),
        )
    }
}

impl From<Curve> for Vec<Anchor> {
    fn from(curve: Curve) -> Self {
        curve
            .points
            .into_iter()
            .map(|p| Anchor {
                percent: p.progress * 100.0,
                brightness: p.brightness,
                color_temp: p.color_temp,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_are_exact() {
        let curve = Curve::sunrise();
        let start = curve.at(0.0);
        assert_eq!((start.brightness, start.color_temp), (10, 0));
        let end = curve.at(1.0);
        assert_eq!((end.brightness, end.color_temp), (1000, 650));
    }

    #[test]
    fn test_out_of_range_progress_is_clamped() {
        let curve = Curve::sunrise();
        assert!(curve.at(-0.5).same_output(&curve.start()));
        assert!(curve.at(7.0).same_output(&curve.end()));
        assert!(curve.at(f64::NAN).same_output(&curve.start()));
    }

    #[test]
    fn test_every_anchor_is_hit_exactly() {
        let curve = Curve::sunrise();
        for anchor in curve.points() {
            assert!(curve.at(anchor.progress).same_output(anchor));
        }
    }

    #[test]
    fn test_interpolation_rounds_to_nearest() {
        let curve = Curve::sunrise();
        // Halfway between (0.85, 900, 550) and (1.0, 1000, 650)
        let p = curve.at(0.925);
        assert_eq!((p.brightness, p.color_temp), (950, 600));
        // A third of the way from (0, 10, 0) to (0.15, 50, 50): 23.33.., 16.66..
        let p = curve.at(0.05);
        assert_eq!((p.brightness, p.color_temp), (23, 17));
    }

    #[test]
    fn test_monotonic_over_a_fine_grid() {
        let curve = Curve::sunrise();
        let duration = Duration::from_secs(1800);
        let mut previous = curve.at_elapsed(Duration::ZERO, duration);
        for ms in (0..=1_800_000u64).step_by(250) {
            let point = curve.at_elapsed(Duration::from_millis(ms), duration);
            assert!(point.brightness >= previous.brightness, "brightness at {ms}ms");
            assert!(point.color_temp >= previous.color_temp, "color temp at {ms}ms");
            previous = point;
        }
        assert!(previous.same_output(&curve.end()));
    }

    #[test]
    fn test_zero_duration_jumps_to_end() {
        let curve = Curve::sunrise();
        assert!(curve
            .at_elapsed(Duration::ZERO, Duration::ZERO)
            .same_output(&curve.end()));
    }

    #[test]
    fn test_rejects_invalid_curves() {
        let p = CurvePoint::new;
        assert!(Curve::new(vec![]).is_err());
        assert!(Curve::new(vec![p(0.0, 10, 0)]).is_err());
        assert!(Curve::new(vec![p(0.1, 10, 0), p(1.0, 20, 0)]).is_err());
        assert!(Curve::new(vec![p(0.0, 10, 0), p(0.9, 20, 0)]).is_err());
        assert!(Curve::new(vec![p(0.0, 10, 0), p(0.5, 30, 0), p(0.5, 40, 0), p(1.0, 50, 0)]).is_err());
        assert!(Curve::new(vec![p(0.0, 10, 10), p(1.0, 20, 5)]).is_err());
        assert!(Curve::new(vec![p(0.0, 5, 0), p(1.0, 20, 0)]).is_err());
        assert!(Curve::new(vec![p(0.0, 10, 0), p(1.0, 1000, 1001)]).is_err());
        assert!(Curve::new(vec![p(0.0, 10, 0), p(1.0, 1000, 1000)]).is_ok());
    }

    #[test]
    fn test_deserialize_from_percent_anchors() {
        let json = r#"[
            {"percent": 0, "brightness": 10, "color_temp": 0},
            {"percent": 50, "brightness": 500, "color_temp": 200},
            {"percent": 100, "brightness": 1000, "color_temp": 650}
        ]"#;
        let curve: Curve = serde_json::from_str(json).unwrap();
        assert_eq!(curve.points().len(), 3);
        assert_eq!(curve.points()[1].progress, 0.5);

        let bad = r#"[{"percent": 0, "brightness": 500, "color_temp": 0},
                      {"percent": 100, "brightness": 10, "color_temp": 0}]"#;
        assert!(serde_json::from_str::<Curve>(bad).is_err());
    }
}
