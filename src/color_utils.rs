//! Color helpers shared by the sampler and the AFK loop.
//!
//! Colors are carried around as `palette::Srgb<u8>`. Matching is a plain
//! per-channel comparison: a sampled color matches the expected one when every
//! channel is within `tolerance` of it.

use image::Rgba;
use palette::Srgb;

/// Alias used throughout the crate for an 8-bit sRGB triple.
pub type Color = Srgb<u8>;

/// Per-channel tolerance used for every pixel check.
pub const COLOR_TOLERANCE: u8 = 10;

/// Build a `Color` from an `(r, g, b)` triple.
pub fn rgb(r: u8, g: u8, b: u8) -> Color {
    Srgb::new(r, g, b)
}

/// Drop the alpha channel of a captured pixel.
pub fn rgba_to_color(pixel: Rgba<u8>) -> Color {
    let [r, g, b, _] = pixel.0;
    Srgb::new(r, g, b)
}

/// Returns `true` if all three channels of `sampled` are within `tolerance`
/// of `expected`.
///
/// # Arguments
///
/// * `sampled` - The color read from the screen.
/// * `expected` - The color configured in the profile.
/// * `tolerance` - Largest allowed difference per channel.
pub fn colors_match(sampled: Color, expected: Color, tolerance: u8) -> bool {
    sampled.red.abs_diff(expected.red) <= tolerance
        && sampled.green.abs_diff(expected.green) <= tolerance
        && sampled.blue.abs_diff(expected.blue) <= tolerance
}

/// Format a color as `(r, g, b) #rrggbb` for log lines and the probe output.
pub fn describe(color: Color) -> String {
    format!(
        "({}, {}, {}) #{:02x}{:02x}{:02x}",
        color.red, color.green, color.blue, color.red, color.green, color.blue
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_colors() {
        assert!(colors_match(rgb(58, 59, 61), rgb(68, 69, 71), 10));
        assert!(!colors_match(rgb(58, 59, 61), rgb(69, 59, 61), 10));
    }

    #[test]
    fn every_channel_must_be_within_tolerance() {
        let expected = rgb(100, 100, 100);
        assert!(!colors_match(rgb(100, 100, 111), expected, 10));
        assert!(!colors_match(rgb(100, 89, 100), expected, 10));
        assert!(colors_match(rgb(90, 110, 100), expected, 10));
    }

    #[test]
    fn matching_is_symmetric() {
        let samples = [
            rgb(0, 0, 0),
            rgb(255, 255, 255),
            rgb(58, 59, 61),
            rgb(69, 59, 61),
            rgb(250, 5, 128),
        ];
        for &a in &samples {
            for &b in &samples {
                for t in [0, 1, 10, 255] {
                    assert_eq!(colors_match(a, b, t), colors_match(b, a, t));
                }
            }
        }
    }

    #[test]
    fn a_color_matches_itself() {
        for c in [rgb(0, 0, 0), rgb(255, 255, 255), rgb(12, 200, 77)] {
            assert!(colors_match(c, c, 0));
            assert!(colors_match(c, c, COLOR_TOLERANCE));
        }
    }

    #[test]
    fn extreme_channels_do_not_overflow() {
        assert!(colors_match(rgb(0, 0, 0), rgb(255, 255, 255), 255));
        assert!(!colors_match(rgb(0, 0, 0), rgb(255, 255, 255), 254));
    }

    #[test]
    fn alpha_is_dropped() {
        assert_eq!(rgba_to_color(Rgba([1, 2, 3, 0])), rgb(1, 2, 3));
    }

    #[test]
    fn describe_includes_hex() {
        assert_eq!(describe(rgb(58, 59, 61)), "(58, 59, 61) #3a3b3d");
    }
}
