#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Colour-based classification of camera samples.
//!
//! Pixels are converted to CIE Lab and compared against reference colours
//! with the CIEDE2000 formula. The floor camera decides the hazard level of a
//! cell and the front camera decides whether a survivor marker is present.

use maze_rescue_core::{device::ImageSample, device::Obstructions, Damage, Rgb};
use tracing::trace;

const D65_WHITE: (f64, f64, f64) = (0.95047, 1.0, 1.08883);
const LAB_EPSILON: f64 = 6.0 / 29.0;
const DEFAULT_THRESHOLD: f64 = 20.0;
const CHROMA_WEIGHT_BASE: f64 = 6_103_515_625.0; // 25^7

/// Point in the CIE Lab colour space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lab {
    /// Lightness.
    pub l: f64,
    /// Green-red axis.
    pub a: f64,
    /// Blue-yellow axis.
    pub b: f64,
}

impl Lab {
    /// Converts an sRGB colour to Lab under the D65 illuminant.
    #[must_use]
    pub fn from_rgb(rgb: Rgb) -> Self {
        let red = linearize(rgb.red());
        let green = linearize(rgb.green());
        let blue = linearize(rgb.blue());

        let x = red * 0.412_456_4 + green * 0.357_576_1 + blue * 0.180_437_5;
        let y = red * 0.212_672_9 + green * 0.715_152_2 + blue * 0.072_175_0;
        let z = red * 0.019_333_9 + green * 0.119_192_0 + blue * 0.950_304_1;

        let fx = lab_curve(x / D65_WHITE.0);
        let fy = lab_curve(y / D65_WHITE.1);
        let fz = lab_curve(z / D65_WHITE.2);

        Self {
            l: 116.0 * fy - 16.0,
            a: 500.0 * (fx - fy),
            b: 200.0 * (fy - fz),
        }
    }
}

fn linearize(channel: u8) -> f64 {
    let c = f64::from(channel) / 255.0;
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_curve(t: f64) -> f64 {
    if t > LAB_EPSILON.powi(3) {
        t.cbrt()
    } else {
        t / (3.0 * LAB_EPSILON.powi(2)) + 4.0 / 29.0
    }
}

/// CIEDE2000 colour difference between two Lab colours.
///
/// The result is non-negative and symmetric in its arguments.
#[must_use]
pub fn ciede2000(first: Lab, second: Lab) -> f64 {
    let chroma_first = first.a.hypot(first.b);
    let chroma_second = second.a.hypot(second.b);
    let chroma_mean = (chroma_first + chroma_second) / 2.0;

    let g = 0.5 * (1.0 - chroma_weight(chroma_mean));
    let a_first = (1.0 + g) * first.a;
    let a_second = (1.0 + g) * second.a;

    let c_first = a_first.hypot(first.b);
    let c_second = a_second.hypot(second.b);
    let h_first = hue_degrees(first.b, a_first);
    let h_second = hue_degrees(second.b, a_second);

    let delta_l = second.l - first.l;
    let delta_c = c_second - c_first;

    let chroma_product = c_first * c_second;
    let (delta_h, h_mean) = if chroma_product == 0.0 {
        (0.0, h_first + h_second)
    } else {
        let mut delta = h_second - h_first;
        if delta > 180.0 {
            delta -= 360.0;
        } else if delta < -180.0 {
            delta += 360.0;
        }

        let sum = h_first + h_second;
        let mean = if (h_first - h_second).abs() > 180.0 {
            if sum < 360.0 {
                (sum + 360.0) / 2.0
            } else {
                (sum - 360.0) / 2.0
            }
        } else {
            sum / 2.0
        };
        (delta, mean)
    };
    let delta_big_h = 2.0 * chroma_product.sqrt() * (delta_h.to_radians() / 2.0).sin();

    let l_mean = (first.l + second.l) / 2.0;
    let c_mean = (c_first + c_second) / 2.0;

    let t = 1.0 - 0.17 * (h_mean - 30.0).to_radians().cos()
        + 0.24 * (2.0 * h_mean).to_radians().cos()
        + 0.32 * (3.0 * h_mean + 6.0).to_radians().cos()
        - 0.20 * (4.0 * h_mean - 63.0).to_radians().cos();

    let l_offset = (l_mean - 50.0).powi(2);
    let s_l = 1.0 + (0.015 * l_offset) / (20.0 + l_offset).sqrt();
    let s_c = 1.0 + 0.045 * c_mean;
    let s_h = 1.0 + 0.015 * c_mean * t;

    let delta_theta = 30.0 * (-((h_mean - 275.0) / 25.0).powi(2)).exp();
    let r_c = 2.0 * chroma_weight(c_mean);
    let r_t = -r_c * (2.0 * delta_theta).to_radians().sin();

    let lightness = delta_l / s_l;
    let chroma = delta_c / s_c;
    let hue = delta_big_h / s_h;

    (lightness.powi(2) + chroma.powi(2) + hue.powi(2) + r_t * chroma * hue)
        .max(0.0)
        .sqrt()
}

fn chroma_weight(chroma: f64) -> f64 {
    let seventh = chroma.powi(7);
    (seventh / (seventh + CHROMA_WEIGHT_BASE)).sqrt()
}

fn hue_degrees(b: f64, a_prime: f64) -> f64 {
    if b == 0.0 && a_prime == 0.0 {
        return 0.0;
    }
    b.atan2(a_prime).to_degrees().rem_euclid(360.0)
}

/// Smallest distance to `target` among pixels strictly under `threshold`.
#[must_use]
pub fn min_distance_to_target(image: &ImageSample, target: Rgb, threshold: f64) -> Option<f64> {
    let target = Lab::from_rgb(target);
    image
        .pixels()
        .iter()
        .map(|pixel| ciede2000(target, Lab::from_rgb(*pixel)))
        .filter(|distance| *distance < threshold)
        .min_by(f64::total_cmp)
}

/// Reports whether any pixel lies strictly under `threshold` from `target`.
#[must_use]
pub fn exists_color(image: &ImageSample, target: Rgb, threshold: f64) -> bool {
    let target = Lab::from_rgb(target);
    image
        .pixels()
        .iter()
        .any(|pixel| ciede2000(target, Lab::from_rgb(*pixel)) < threshold)
}

/// Reference colours and thresholds used by [`Perception`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerceptionTuning {
    /// Floor colour marking severe damage.
    pub severe_color: Rgb,
    /// Floor colour marking light damage.
    pub light_color: Rgb,
    /// Floor colour marking a clear cell.
    pub clear_color: Rgb,
    /// Front colour marking a survivor.
    pub survivor_color: Rgb,
    /// Maximum CIEDE2000 distance accepted for floor colours.
    pub hazard_threshold: f64,
    /// Maximum CIEDE2000 distance accepted for the survivor colour.
    pub survivor_threshold: f64,
}

impl Default for PerceptionTuning {
    fn default() -> Self {
        Self {
            severe_color: Rgb::new(255, 0, 0),
            light_color: Rgb::new(255, 165, 0),
            clear_color: Rgb::new(255, 255, 0),
            survivor_color: Rgb::new(0, 255, 0),
            hazard_threshold: DEFAULT_THRESHOLD,
            survivor_threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Classifies camera samples into hazard and survivor readings.
#[derive(Clone, Debug, Default)]
pub struct Perception {
    tuning: PerceptionTuning,
}

impl Perception {
    /// Creates a classifier with the provided tuning.
    #[must_use]
    pub const fn new(tuning: PerceptionTuning) -> Self {
        Self { tuning }
    }

    /// Tuning in effect for this classifier.
    #[must_use]
    pub const fn tuning(&self) -> &PerceptionTuning {
        &self.tuning
    }

    /// Classifies the floor sample; the globally closest reference colour wins.
    #[must_use]
    pub fn classify_floor(&self, floor: &ImageSample) -> Damage {
        let threshold = self.tuning.hazard_threshold;
        let candidates = [
            (Damage::Severe, self.tuning.severe_color),
            (Damage::Light, self.tuning.light_color),
            (Damage::Clear, self.tuning.clear_color),
        ];

        let mut best: Option<(Damage, f64)> = None;
        for (damage, color) in candidates {
            let Some(distance) = min_distance_to_target(floor, color, threshold) else {
                continue;
            };
            if best.map_or(true, |(_, closest)| distance < closest) {
                best = Some((damage, distance));
            }
        }

        let damage = best.map_or(Damage::Unknown, |(damage, _)| damage);
        trace!(?damage, "floor classified");
        damage
    }

    /// Survivor markers only count when something is directly ahead.
    #[must_use]
    pub fn detect_survivor(&self, front: &ImageSample, obstructions: Obstructions) -> bool {
        obstructions.front
            && exists_color(
                front,
                self.tuning.survivor_color,
                self.tuning.survivor_threshold,
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIMARIES: [Rgb; 6] = [
        Rgb::new(255, 0, 0),
        Rgb::new(0, 255, 0),
        Rgb::new(0, 0, 255),
        Rgb::new(255, 255, 255),
        Rgb::new(0, 0, 0),
        Rgb::new(128, 128, 128),
    ];

    #[test]
    fn colors_have_zero_distance_to_themselves() {
        for color in PRIMARIES {
            let lab = Lab::from_rgb(color);
            assert!(ciede2000(lab, lab).abs() < 1e-9, "{color:?} should match itself");
        }
    }

    fn lab(l: f64, a: f64, b: f64) -> Lab {
        Lab { l, a, b }
    }

    #[test]
    fn matches_published_reference_pairs() {
        // Sharma, Wu and Dalal test data; the first four straddle the 0/360 hue seam.
        let pairs = [
            (lab(50.0, 2.49, -0.001), lab(50.0, -2.49, 0.0009), 7.1792),
            (lab(50.0, 2.49, -0.001), lab(50.0, -2.49, 0.0011), 7.2195),
            (lab(50.0, -0.001, 2.49), lab(50.0, 0.0009, -2.49), 4.8045),
            (lab(50.0, 2.6772, -79.7751), lab(50.0, 0.0, -82.7485), 2.0425),
            (lab(50.0, 0.0, 0.0), lab(50.0, -1.0, 2.0), 2.3669),
            (lab(50.0, 2.5, 0.0), lab(73.0, 25.0, -18.0), 27.1492),
            (lab(50.0, 2.5, 0.0), lab(56.0, -27.0, -3.0), 31.9030),
            (
                lab(60.2574, -34.0099, 36.2677),
                lab(60.4626, -34.1751, 39.4387),
                1.2644,
            ),
        ];

        for (first, second, expected) in pairs {
            let forward = ciede2000(first, second);
            let backward = ciede2000(second, first);
            assert!(
                (forward - expected).abs() < 1e-4,
                "{first:?} vs {second:?}: expected {expected}, got {forward}"
            );
            assert!(
                (backward - expected).abs() < 1e-4,
                "{second:?} vs {first:?}: expected {expected}, got {backward}"
            );
        }
    }

    #[test]
    fn white_maps_to_full_lightness() {
        let white = Lab::from_rgb(Rgb::new(255, 255, 255));
        assert!((white.l - 100.0).abs() < 0.01);
        assert!(white.a.abs() < 0.01);
        assert!(white.b.abs() < 0.01);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (Rgb::new(255, 0, 0), Rgb::new(255, 165, 0)),
            (Rgb::new(0, 255, 0), Rgb::new(40, 200, 60)),
            (Rgb::new(10, 10, 10), Rgb::new(0, 0, 255)),
            (Rgb::new(128, 128, 128), Rgb::new(255, 255, 0)),
        ];
        for (left, right) in pairs {
            let forward = ciede2000(Lab::from_rgb(left), Lab::from_rgb(right));
            let backward = ciede2000(Lab::from_rgb(right), Lab::from_rgb(left));
            assert!(forward >= 0.0);
            assert!(
                (forward - backward).abs() < 1e-9,
                "{left:?} and {right:?} differ: {forward} vs {backward}"
            );
        }
    }

    #[test]
    fn reference_colors_are_far_apart() {
        let tuning = PerceptionTuning::default();
        let red = Lab::from_rgb(tuning.severe_color);
        let orange = Lab::from_rgb(tuning.light_color);
        let yellow = Lab::from_rgb(tuning.clear_color);
        assert!(ciede2000(red, orange) > tuning.hazard_threshold);
        assert!(ciede2000(orange, yellow) > tuning.hazard_threshold);
    }

    #[test]
    fn grey_inputs_take_zero_chroma_branch() {
        let distance = ciede2000(
            Lab::from_rgb(Rgb::new(0, 0, 0)),
            Lab::from_rgb(Rgb::new(255, 255, 255)),
        );
        assert!(distance.is_finite());
        assert!(distance > 50.0);
    }

    #[test]
    fn min_distance_ignores_pixels_over_threshold() {
        let mut image = ImageSample::filled(4, 4, Rgb::new(0, 0, 255));
        assert_eq!(
            min_distance_to_target(&image, Rgb::new(255, 0, 0), 20.0),
            None
        );

        if let Some(pixel) = image.pixel_mut(2, 1) {
            *pixel = Rgb::new(250, 5, 5);
        }
        if let Some(pixel) = image.pixel_mut(3, 3) {
            *pixel = Rgb::new(255, 0, 0);
        }
        let distance =
            min_distance_to_target(&image, Rgb::new(255, 0, 0), 20.0).expect("red pixel present");
        assert!(distance.abs() < 1e-9);
    }

    #[test]
    fn floor_classification_picks_closest_reference() {
        let perception = Perception::default();
        let cases = [
            (Rgb::new(255, 0, 0), Damage::Severe),
            (Rgb::new(255, 165, 0), Damage::Light),
            (Rgb::new(255, 255, 0), Damage::Clear),
            (Rgb::new(200, 200, 200), Damage::Unknown),
        ];
        for (color, expected) in cases {
            let floor = ImageSample::filled(8, 8, color);
            assert_eq!(perception.classify_floor(&floor), expected, "{color:?}");
        }
    }

    #[test]
    fn survivor_requires_front_obstruction() {
        let perception = Perception::default();
        let mut front = ImageSample::filled(8, 8, Rgb::new(90, 90, 90));
        if let Some(pixel) = front.pixel_mut(4, 4) {
            *pixel = Rgb::new(0, 255, 0);
        }

        let blocked = Obstructions {
            front: true,
            ..Obstructions::default()
        };
        assert!(perception.detect_survivor(&front, blocked));
        assert!(!perception.detect_survivor(&front, Obstructions::default()));

        let empty = ImageSample::filled(8, 8, Rgb::new(90, 90, 90));
        assert!(!perception.detect_survivor(&empty, blocked));
    }
}
