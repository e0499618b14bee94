//! Color utility functions shared across the crate.
//!
//! Pixel classification for frame calibration and color validation for
//! element overrides both live here.

/// Relative luminance (Rec. 709 weights) of an RGB triple in 0.0-1.0.
pub fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.2126 * r + 0.7152 * g + 0.0722 * b
}

/// HSV saturation of an RGB triple in 0.0-1.0.
///
/// Black has no defined hue, so its saturation is reported as 0.
pub fn saturation(r: f32, g: f32, b: f32) -> f32 {
    let max_c = r.max(g).max(b);
    let min_c = r.min(g).min(b);
    if max_c <= 0.0 {
        0.0
    } else {
        (max_c - min_c) / max_c
    }
}

/// Convert an 8-bit RGBA pixel to normalized floats.
pub fn normalize_rgba(pixel: [u8; 4]) -> [f32; 4] {
    [
        f32::from(pixel[0]) / 255.0,
        f32::from(pixel[1]) / 255.0,
        f32::from(pixel[2]) / 255.0,
        f32::from(pixel[3]) / 255.0,
    ]
}

/// Check whether a string is a `#rgb` or `#rrggbb` hex color.
pub fn is_hex_color(color: &str) -> bool {
    let Some(digits) = color.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// Parse a `#rgb` or `#rrggbb` hex color into RGB bytes.
pub fn parse_hex_color(color: &str) -> Option<[u8; 3]> {
    if !is_hex_color(color) {
        return None;
    }
    let digits = &color[1..];
    if digits.len() == 3 {
        let mut rgb = [0u8; 3];
        for (i, c) in digits.chars().enumerate() {
            let v = c.to_digit(16)? as u8;
            rgb[i] = v * 17;
        }
        Some(rgb)
    } else {
        let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
        let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
        let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
        Some([r, g, b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luminance_white_and_black() {
        assert!((luminance(1.0, 1.0, 1.0) - 1.0).abs() < 0.001);
        assert!(luminance(0.0, 0.0, 0.0).abs() < 0.001);
    }

    #[test]
    fn test_saturation_gray_is_zero() {
        assert!(saturation(0.5, 0.5, 0.5).abs() < 0.001);
        assert!(saturation(0.0, 0.0, 0.0).abs() < 0.001);
    }

    #[test]
    fn test_saturation_pure_red() {
        assert!((saturation(1.0, 0.0, 0.0) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_hex_color_validation() {
        assert!(is_hex_color("#fff"));
        assert!(is_hex_color("#A0b1C2"));
        assert!(!is_hex_color("fff"));
        assert!(!is_hex_color("#ffff"));
        assert!(!is_hex_color("#ggg"));
        assert!(!is_hex_color(""));
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#fff"), Some([255, 255, 255]));
        assert_eq!(parse_hex_color("#102030"), Some([16, 32, 48]));
        assert_eq!(parse_hex_color("red"), None);
    }
}
