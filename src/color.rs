// Color tokens: single-letter palette codes, #RGB / #RRGGBB hex and rgba(...) strings
use crate::numeric::parse_float_lenient;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref RGBA_FUNC: Regex = Regex::new(r"rgba?\(([^)]+)\)").unwrap();
}

/// A resolved color with channels in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::opaque(1.0, 1.0, 1.0);
    pub const BLACK: Rgba = Rgba::opaque(0.0, 0.0, 0.0);
    pub const OUTLINE_GRAY: Rgba = Rgba {
        r: 0.5,
        g: 0.5,
        b: 0.5,
        a: 0.8,
    };

    pub const fn opaque(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn with_alpha(self, a: f64) -> Self {
        Self { a, ..self }
    }

    /// 8-bit channels for raster backends, alpha left as a fraction.
    pub fn to_u8_channels(self) -> (u8, u8, u8, f64) {
        let scale = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        (
            scale(self.r),
            scale(self.g),
            scale(self.b),
            self.a.clamp(0.0, 1.0),
        )
    }
}

fn palette(code: &str) -> Option<Rgba> {
    let color = match code {
        "r" => Rgba::opaque(1.0, 0.0, 0.0),
        "o" => Rgba::opaque(1.0, 0.5, 0.0),
        "y" => Rgba::opaque(1.0, 1.0, 0.0),
        "g" => Rgba::opaque(0.0, 0.8, 0.0),
        "b" => Rgba::opaque(0.0, 0.0, 1.0),
        "v" => Rgba::opaque(0.5, 0.0, 1.0),
        "p" => Rgba::opaque(1.0, 0.0, 0.5),
        "w" => Rgba::WHITE,
        "k" => Rgba::BLACK,
        _ => return None,
    };
    Some(color)
}

fn hex_byte(pair: &str) -> Option<f64> {
    u8::from_str_radix(pair, 16).ok().map(|v| v as f64 / 255.0)
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.is_ascii() {
        return None;
    }
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    Some(Rgba::opaque(
        hex_byte(&expanded[0..2])?,
        hex_byte(&expanded[2..4])?,
        hex_byte(&expanded[4..6])?,
    ))
}

fn parse_rgba_func(token: &str) -> Option<Rgba> {
    let inner = RGBA_FUNC.captures(token)?.get(1)?.as_str();
    let values: Vec<f64> = inner.split(',').map(parse_float_lenient).collect();
    if values.len() < 3 || values[..3].iter().any(|v| !v.is_finite()) {
        return None;
    }
    let a = values
        .get(3)
        .copied()
        .filter(|a| a.is_finite())
        .unwrap_or(1.0);
    Some(Rgba {
        r: values[0] / 255.0,
        g: values[1] / 255.0,
        b: values[2] / 255.0,
        a,
    })
}

/// Resolve a color token. Never fails: anything unrecognized is opaque white.
pub fn resolve(token: &str) -> Rgba {
    if let Some(color) = palette(token) {
        return color;
    }
    if let Some(hex) = token.strip_prefix('#') {
        return parse_hex(hex).unwrap_or(Rgba::WHITE);
    }
    parse_rgba_func(token).unwrap_or(Rgba::WHITE)
}
