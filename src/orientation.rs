//! # Orientation Module
//!
//! Ricava l'orientamento logico di una traccia video dalla sua matrice di trasformazione.
//!
//! ## Responsabilità:
//! - Rappresenta la trasformazione affine 2x3 associata alla traccia (`AffineTransform`)
//! - Classifica l'orientamento (portrait, landscape, ...) con confronti esatti
//! - Ricava la posizione della camera (front/back) dai segni della matrice
//! - Calcola i gradi di rotazione e la dimensione "a schermo" per il media info
//!
//! ## Tabella di classificazione (prima corrispondenza vince):
//! | a | b | d | orientamento | camera |
//! |---|---|---|---|---|
//! | 0 | 1 | 0 | portrait | c==1 front, c==-1 back |
//! | 0 | -1 | 0 | portrait upside down | c==-1 front, c==1 back |
//! | 1 | 0 (c==0) | - | landscape right | d==-1 front, d==1 back |
//! | -1 | 0 (c==0) | - | landscape left | d==1 front, d==-1 back |
//!
//! Nessuna tolleranza: le matrici per rotazioni allineate agli assi sono esatte.

use serde::{Deserialize, Serialize};

/// 2D affine transform `[a b; c d; tx ty]` attached to a video track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    #[serde(default)]
    pub tx: f64,
    #[serde(default)]
    pub ty: f64,
}

impl AffineTransform {
    pub const IDENTITY: Self = Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, tx: 0.0, ty: 0.0 };

    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d, tx: 0.0, ty: 0.0 }
    }

    /// Build the exact matrix for a clockwise display rotation.
    ///
    /// Only multiples of 90 degrees produce a rotation; anything else yields
    /// the identity. The components are exact integers so the orientation
    /// table can match them.
    pub fn from_clockwise_degrees(degrees: i64) -> Self {
        match degrees.rem_euclid(360) {
            90 => Self::new(0.0, 1.0, -1.0, 0.0),
            180 => Self::new(-1.0, 0.0, 0.0, -1.0),
            270 => Self::new(0.0, -1.0, 1.0, 0.0),
            _ => Self::IDENTITY,
        }
    }

    /// Rotation encoded by the matrix, normalised to `0..360`
    pub fn rotation_degrees(&self) -> u32 {
        let degrees = self.b.atan2(self.a).to_degrees().round() as i64;
        degrees.rem_euclid(360) as u32
    }

    /// Size of a `width x height` frame after the transform, as absolute values
    pub fn apply_to_size(&self, width: f64, height: f64) -> (f64, f64) {
        let w = self.a * width + self.c * height;
        let h = self.b * width + self.d * height;
        (w.abs(), h.abs())
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Logical orientation of the recorded picture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    Unknown,
}

impl Orientation {
    pub fn is_landscape(&self) -> bool {
        matches!(self, Self::LandscapeLeft | Self::LandscapeRight)
    }
}

/// Capture device hint derived from the transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePosition {
    Front,
    Back,
    Unspecified,
}

/// Classify a track transform; `None` stands for a missing track
pub fn resolve(transform: Option<&AffineTransform>) -> (Orientation, DevicePosition) {
    let Some(t) = transform else {
        return (Orientation::Unknown, DevicePosition::Unspecified);
    };

    if t.a == 0.0 && t.b == 1.0 && t.d == 0.0 {
        (Orientation::Portrait, device_from(t.c, 1.0, -1.0))
    } else if t.a == 0.0 && t.b == -1.0 && t.d == 0.0 {
        (Orientation::PortraitUpsideDown, device_from(t.c, -1.0, 1.0))
    } else if t.a == 1.0 && t.b == 0.0 && t.c == 0.0 {
        (Orientation::LandscapeRight, device_from(t.d, -1.0, 1.0))
    } else if t.a == -1.0 && t.b == 0.0 && t.c == 0.0 {
        (Orientation::LandscapeLeft, device_from(t.d, 1.0, -1.0))
    } else {
        (Orientation::Unknown, DevicePosition::Unspecified)
    }
}

fn device_from(component: f64, front: f64, back: f64) -> DevicePosition {
    if component == front {
        DevicePosition::Front
    } else if component == back {
        DevicePosition::Back
    } else {
        DevicePosition::Unspecified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_table() {
        assert_eq!(
            resolve(Some(&AffineTransform::new(0.0, 1.0, 1.0, 0.0))),
            (Orientation::Portrait, DevicePosition::Front)
        );
        assert_eq!(
            resolve(Some(&AffineTransform::new(0.0, 1.0, -1.0, 0.0))),
            (Orientation::Portrait, DevicePosition::Back)
        );
        assert_eq!(
            resolve(Some(&AffineTransform::new(0.0, -1.0, -1.0, 0.0))),
            (Orientation::PortraitUpsideDown, DevicePosition::Front)
        );
        assert_eq!(
            resolve(Some(&AffineTransform::new(1.0, 0.0, 0.0, 1.0))),
            (Orientation::LandscapeRight, DevicePosition::Back)
        );
        assert_eq!(
            resolve(Some(&AffineTransform::new(1.0, 0.0, 0.0, -1.0))),
            (Orientation::LandscapeRight, DevicePosition::Front)
        );
        assert_eq!(
            resolve(Some(&AffineTransform::new(-1.0, 0.0, 0.0, 1.0))),
            (Orientation::LandscapeLeft, DevicePosition::Front)
        );
        assert_eq!(
            resolve(Some(&AffineTransform::new(0.0, 0.0, 0.0, 0.0))),
            (Orientation::Unknown, DevicePosition::Unspecified)
        );
        assert_eq!(resolve(None), (Orientation::Unknown, DevicePosition::Unspecified));
    }

    #[test]
    fn test_no_tolerance_on_near_values() {
        let almost = AffineTransform::new(1e-9, 1.0, 1.0, 0.0);
        assert_eq!(resolve(Some(&almost)).0, Orientation::Unknown);
    }

    #[test]
    fn test_portrait_with_nonzero_c_and_no_device_cue() {
        let t = AffineTransform::new(0.0, 1.0, 0.5, 0.0);
        assert_eq!(resolve(Some(&t)), (Orientation::Portrait, DevicePosition::Unspecified));
    }

    #[test]
    fn test_rotation_from_degrees_matches_table() {
        assert_eq!(resolve(Some(&AffineTransform::from_clockwise_degrees(0))).0, Orientation::LandscapeRight);
        assert_eq!(resolve(Some(&AffineTransform::from_clockwise_degrees(90))).0, Orientation::Portrait);
        assert_eq!(resolve(Some(&AffineTransform::from_clockwise_degrees(-90))).0, Orientation::PortraitUpsideDown);
        assert_eq!(resolve(Some(&AffineTransform::from_clockwise_degrees(180))).0, Orientation::LandscapeLeft);
    }

    #[test]
    fn test_rotation_degrees_and_display_size() {
        let portrait = AffineTransform::from_clockwise_degrees(90);
        assert_eq!(portrait.rotation_degrees(), 90);
        assert_eq!(portrait.apply_to_size(1920.0, 1080.0), (1080.0, 1920.0));

        assert_eq!(AffineTransform::from_clockwise_degrees(270).rotation_degrees(), 270);
        assert_eq!(AffineTransform::from_clockwise_degrees(180).rotation_degrees(), 180);
        assert_eq!(AffineTransform::IDENTITY.rotation_degrees(), 0);
        assert_eq!(AffineTransform::IDENTITY.apply_to_size(640.0, 360.0), (640.0, 360.0));
    }

    #[test]
    fn test_landscape_predicates() {
        assert!(Orientation::LandscapeLeft.is_landscape());
        assert!(!Orientation::Unknown.is_landscape());
        assert!(!Orientation::PortraitUpsideDown.is_landscape());
    }
}
