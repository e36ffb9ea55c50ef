//! Colormaps for survey display
//!
//! Provides the palettes offered for magnetic data display:
//! - Sequential: viridis, plasma, magma, inferno, Greys, bone, pink
//! - Diverging: RdBu
//! - Cyclic / spectral: jet, rainbow, hsv, nipy_spectral
//!
//! Any name takes an `_r` suffix for the reversed palette (`RdBu_r`,
//! `Greys_r`, `gray_r`).

use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};

/// A color in RGBA format (0.0 to 1.0)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Parse `#RRGGBB` (the `#` is optional)
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }

        let r = u8::from_str_radix(&hex[0..2], 16).ok()? as f32 / 255.0;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()? as f32 / 255.0;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()? as f32 / 255.0;

        Some(Self::rgb(r, g, b))
    }

    pub fn to_hex(&self) -> String {
        let [r, g, b, _] = self.to_rgba8();
        format!("#{:02X}{:02X}{:02X}", r, g, b)
    }

    /// Linear interpolation between two colors
    pub fn lerp(a: &Color, b: &Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        Color {
            r: a.r + (b.r - a.r) * t,
            g: a.g + (b.g - a.g) * t,
            b: a.b + (b.b - a.b) * t,
            a: a.a + (b.a - a.a) * t,
        }
    }

    /// Paint this color with opacity `alpha` over an opaque `background`
    pub fn over(&self, background: &Color, alpha: f32) -> Color {
        let alpha = (alpha * self.a).clamp(0.0, 1.0);
        Color::rgb(
            self.r * alpha + background.r * (1.0 - alpha),
            self.g * alpha + background.g * (1.0 - alpha),
            self.b * alpha + background.b * (1.0 - alpha),
        )
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Quantize to 8-bit channels
    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::rgb(0.5, 0.5, 0.5)
    }
}

/// A piecewise-linear map from `[0, 1]` to colors
#[derive(Clone, Debug, PartialEq)]
pub struct Colormap {
    pub name: String,
    /// Color stops, positions ascending in `[0, 1]`
    stops: Vec<(f32, Color)>,
    reversed: bool,
}

impl Colormap {
    /// Evenly spaced colors
    pub fn from_colors(name: impl Into<String>, colors: Vec<Color>) -> Self {
        let n = colors.len();
        let stops: Vec<(f32, Color)> = colors
            .into_iter()
            .enumerate()
            .map(|(i, c)| (i as f32 / (n - 1).max(1) as f32, c))
            .collect();

        Self::from_stops(name, stops)
    }

    /// Explicit `(position, color)` stops; sorted by position
    pub fn from_stops(name: impl Into<String>, mut stops: Vec<(f32, Color)>) -> Self {
        stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            name: name.into(),
            stops,
            reversed: false,
        }
    }

    /// Per-channel breakpoints, in the style of matplotlib segment data
    fn from_channels(
        name: &str,
        red: &[(f32, f32)],
        green: &[(f32, f32)],
        blue: &[(f32, f32)],
    ) -> Self {
        let mut positions: Vec<f32> = red
            .iter()
            .chain(green)
            .chain(blue)
            .map(|&(x, _)| x)
            .collect();
        positions.sort_by(|a, b| a.total_cmp(b));
        positions.dedup();

        let stops = positions
            .into_iter()
            .map(|x| {
                let color = Color::rgb(piecewise(red, x), piecewise(green, x), piecewise(blue, x));
                (x, color)
            })
            .collect();
        Self::from_stops(name, stops)
    }

    /// Colors sampled from a function at `n` even positions
    fn from_fn(name: &str, n: usize, f: impl Fn(f32) -> Color) -> Self {
        let colors = (0..n)
            .map(|i| f(i as f32 / (n - 1).max(1) as f32))
            .collect();
        Self::from_colors(name, colors)
    }

    /// Flip the direction of the map
    pub fn reversed(mut self) -> Self {
        self.reversed = !self.reversed;
        self
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Color at position `t` (clamped to `[0, 1]`)
    pub fn sample(&self, t: f32) -> Color {
        let mut t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        if self.reversed {
            t = 1.0 - t;
        }

        match self.stops.len() {
            0 => return Color::default(),
            1 => return self.stops[0].1,
            _ => {}
        }

        let upper = self.stops.partition_point(|(p, _)| *p < t);
        if upper == 0 {
            return self.stops[0].1;
        }
        if upper == self.stops.len() {
            return self.stops[upper - 1].1;
        }
        let (t0, c0) = &self.stops[upper - 1];
        let (t1, c1) = &self.stops[upper];
        if t1 <= t0 {
            return *c1;
        }
        Color::lerp(c0, c1, (t - t0) / (t1 - t0))
    }

    /// `size` colors sampled evenly across the map
    pub fn generate_lut(&self, size: usize) -> Vec<Color> {
        (0..size)
            .map(|i| self.sample(i as f32 / (size - 1).max(1) as f32))
            .collect()
    }
}

fn piecewise(points: &[(f32, f32)], x: f32) -> f32 {
    let upper = points.partition_point(|&(p, _)| p < x);
    if upper == 0 {
        return points.first().map_or(0.0, |p| p.1);
    }
    if upper == points.len() {
        return points[upper - 1].1;
    }
    let (x0, y0) = points[upper - 1];
    let (x1, y1) = points[upper];
    if x1 <= x0 {
        return y1;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

// MARK: - Built-in Colormaps

/// Perceptually uniform, colorblind-safe
pub fn viridis() -> Colormap {
    Colormap::from_colors(
        "viridis",
        vec![
            Color::rgb(0.267, 0.005, 0.329),
            Color::rgb(0.282, 0.141, 0.458),
            Color::rgb(0.254, 0.265, 0.530),
            Color::rgb(0.207, 0.372, 0.553),
            Color::rgb(0.164, 0.471, 0.558),
            Color::rgb(0.128, 0.567, 0.551),
            Color::rgb(0.135, 0.659, 0.518),
            Color::rgb(0.267, 0.749, 0.441),
            Color::rgb(0.478, 0.821, 0.318),
            Color::rgb(0.741, 0.873, 0.150),
            Color::rgb(0.993, 0.906, 0.144),
        ],
    )
}

pub fn plasma() -> Colormap {
    Colormap::from_colors(
        "plasma",
        vec![
            Color::rgb(0.050, 0.030, 0.528),
            Color::rgb(0.294, 0.012, 0.615),
            Color::rgb(0.494, 0.012, 0.658),
            Color::rgb(0.665, 0.138, 0.614),
            Color::rgb(0.798, 0.280, 0.470),
            Color::rgb(0.898, 0.396, 0.304),
            Color::rgb(0.973, 0.558, 0.154),
            Color::rgb(0.992, 0.748, 0.159),
            Color::rgb(0.940, 0.975, 0.131),
        ],
    )
}

pub fn inferno() -> Colormap {
    Colormap::from_colors(
        "inferno",
        vec![
            Color::rgb(0.001, 0.000, 0.014),
            Color::rgb(0.133, 0.047, 0.263),
            Color::rgb(0.341, 0.063, 0.429),
            Color::rgb(0.550, 0.161, 0.506),
            Color::rgb(0.735, 0.216, 0.330),
            Color::rgb(0.878, 0.392, 0.102),
            Color::rgb(0.978, 0.557, 0.035),
            Color::rgb(0.992, 0.772, 0.247),
            Color::rgb(0.988, 0.998, 0.645),
        ],
    )
}

pub fn magma() -> Colormap {
    Colormap::from_colors(
        "magma",
        vec![
            Color::rgb(0.001, 0.000, 0.014),
            Color::rgb(0.116, 0.042, 0.232),
            Color::rgb(0.271, 0.051, 0.404),
            Color::rgb(0.461, 0.098, 0.495),
            Color::rgb(0.665, 0.176, 0.515),
            Color::rgb(0.844, 0.295, 0.461),
            Color::rgb(0.962, 0.507, 0.454),
            Color::rgb(0.992, 0.738, 0.600),
            Color::rgb(0.987, 0.991, 0.750),
        ],
    )
}

/// Red to blue diverging (ColorBrewer)
pub fn rdbu() -> Colormap {
    let colors = [
        "#67001F", "#B2182B", "#D6604D", "#F4A582", "#FDDBC7", "#F7F7F7", "#D1E5F0", "#92C5DE",
        "#4393C3", "#2166AC", "#053061",
    ]
    .iter()
    .filter_map(|h| Color::from_hex(h))
    .collect();
    Colormap::from_colors("RdBu", colors)
}

/// White to black
pub fn greys() -> Colormap {
    Colormap::from_colors("Greys", vec![Color::WHITE, Color::BLACK])
}

/// Black to white
pub fn gray() -> Colormap {
    Colormap::from_colors("gray", vec![Color::BLACK, Color::WHITE])
}

pub fn jet() -> Colormap {
    Colormap::from_channels(
        "jet",
        &[(0.0, 0.0), (0.35, 0.0), (0.66, 1.0), (0.89, 1.0), (1.0, 0.5)],
        &[
            (0.0, 0.0),
            (0.125, 0.0),
            (0.375, 1.0),
            (0.64, 1.0),
            (0.91, 0.0),
            (1.0, 0.0),
        ],
        &[(0.0, 0.5), (0.11, 1.0), (0.34, 1.0), (0.65, 0.0), (1.0, 0.0)],
    )
}

pub fn rainbow() -> Colormap {
    Colormap::from_fn("rainbow", 33, |x| {
        let pi = std::f32::consts::PI;
        Color::rgb(
            (2.0 * x - 0.5).abs().min(1.0),
            (pi * x).sin(),
            (pi * x / 2.0).cos(),
        )
    })
}

/// Channels of the "hot" black-red-yellow-white ramp
fn hot(x: f32) -> [f32; 3] {
    let ramp = |lo: f32, hi: f32| ((x - lo) / (hi - lo)).clamp(0.0, 1.0);
    [
        ramp(0.0, 0.365_079),
        ramp(0.365_079, 0.746_032),
        ramp(0.746_032, 1.0),
    ]
}

pub fn pink() -> Colormap {
    Colormap::from_fn("pink", 33, |x| {
        let [r, g, b] = hot(x);
        let channel = |h: f32| ((2.0 * x + h) / 3.0).sqrt();
        Color::rgb(channel(r), channel(g), channel(b))
    })
}

pub fn bone() -> Colormap {
    Colormap::from_channels(
        "bone",
        &[(0.0, 0.0), (0.746_032, 0.652_778), (1.0, 1.0)],
        &[
            (0.0, 0.0),
            (0.365_079, 0.319_444),
            (0.746_032, 0.777_778),
            (1.0, 1.0),
        ],
        &[(0.0, 0.0), (0.365_079, 0.444_444), (1.0, 1.0)],
    )
}

pub fn hsv() -> Colormap {
    Colormap::from_channels(
        "hsv",
        &[
            (0.0, 1.0),
            (0.158_730, 1.0),
            (0.174_603, 0.968_750),
            (0.333_333, 0.031_250),
            (0.349_206, 0.0),
            (0.666_667, 0.0),
            (0.682_540, 0.031_250),
            (0.841_270, 0.968_750),
            (0.857_143, 1.0),
            (1.0, 1.0),
        ],
        &[
            (0.0, 0.0),
            (0.158_730, 0.937_500),
            (0.174_603, 1.0),
            (0.507_937, 1.0),
            (0.666_667, 0.062_500),
            (0.682_540, 0.0),
            (1.0, 0.0),
        ],
        &[
            (0.0, 0.0),
            (0.333_333, 0.0),
            (0.349_206, 0.062_500),
            (0.507_937, 1.0),
            (0.841_270, 1.0),
            (0.857_143, 0.937_500),
            (1.0, 0.093_750),
        ],
    )
}

pub fn nipy_spectral() -> Colormap {
    Colormap::from_colors(
        "nipy_spectral",
        vec![
            Color::rgb(0.0, 0.0, 0.0),
            Color::rgb(0.533, 0.0, 0.600),
            Color::rgb(0.0, 0.0, 0.867),
            Color::rgb(0.0, 0.600, 0.867),
            Color::rgb(0.0, 0.667, 0.533),
            Color::rgb(0.0, 0.733, 0.0),
            Color::rgb(0.0, 1.0, 0.0),
            Color::rgb(0.800, 0.933, 0.0),
            Color::rgb(1.0, 0.600, 0.0),
            Color::rgb(0.867, 0.0, 0.0),
            Color::rgb(0.800, 0.800, 0.800),
        ],
    )
}

/// Palettes offered for survey display
pub fn builtin_colormap_names() -> Vec<&'static str> {
    vec![
        "viridis",
        "plasma",
        "magma",
        "inferno",
        "RdBu_r",
        "Greys_r",
        "jet",
        "rainbow",
        "pink",
        "bone",
        "hsv",
        "nipy_spectral",
    ]
}

/// Look up a built-in colormap by name
///
/// Matching is case-insensitive; a trailing `_r` reverses the map.
pub fn get_colormap(name: &str) -> GridResult<Colormap> {
    let lower = name.to_lowercase();
    let (base, reverse) = match lower.strip_suffix("_r") {
        Some(base) => (base, true),
        None => (lower.as_str(), false),
    };

    let cmap = match base {
        "viridis" => viridis(),
        "plasma" => plasma(),
        "magma" => magma(),
        "inferno" => inferno(),
        "rdbu" => rdbu(),
        "greys" => greys(),
        "gray" | "grey" => gray(),
        "jet" => jet(),
        "rainbow" => rainbow(),
        "pink" => pink(),
        "bone" => bone(),
        "hsv" => hsv(),
        "nipy_spectral" => nipy_spectral(),
        _ => return Err(GridError::unsupported(name)),
    };

    let mut cmap = if reverse { cmap.reversed() } else { cmap };
    cmap.name = name.to_string();
    Ok(cmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Color, b: Color) -> bool {
        (a.r - b.r).abs() < 0.01 && (a.g - b.g).abs() < 0.01 && (a.b - b.b).abs() < 0.01
    }

    #[test]
    fn test_color_from_hex() {
        let color = Color::from_hex("#FF5733").unwrap();
        assert!((color.r - 1.0).abs() < 0.01);
        assert!((color.g - 0.341).abs() < 0.01);
        assert!((color.b - 0.2).abs() < 0.01);
        assert_eq!(color.to_hex(), "#FF5733");
        assert!(Color::from_hex("FF57").is_none());
    }

    #[test]
    fn test_color_over_white() {
        let red = Color::rgb(1.0, 0.0, 0.0);
        let mixed = red.over(&Color::WHITE, 0.5);
        assert!(close(mixed, Color::rgb(1.0, 0.5, 0.5)));
        assert!(close(red.over(&Color::WHITE, 0.0), Color::WHITE));
    }

    #[test]
    fn test_colormap_sample() {
        let cmap = viridis();

        // Viridis starts dark purple, ends yellow
        assert!(cmap.sample(0.0).r < 0.3);
        assert!(cmap.sample(1.0).r > 0.9);
        assert!(cmap.sample(0.5).g > 0.4);
        assert_eq!(cmap.sample(-3.0), cmap.sample(0.0));
        assert_eq!(cmap.sample(7.0), cmap.sample(1.0));
    }

    #[test]
    fn test_colormap_reversed() {
        let cmap = viridis();
        let rev = viridis().reversed();
        assert!(close(cmap.sample(0.0), rev.sample(1.0)));
        assert!(close(cmap.sample(0.25), rev.sample(0.75)));
    }

    #[test]
    fn test_all_builtins_resolve() {
        for name in builtin_colormap_names() {
            let cmap = get_colormap(name).unwrap();
            assert_eq!(cmap.name, name);
            assert_eq!(cmap.generate_lut(256).len(), 256);
        }
    }

    #[test]
    fn test_reversed_suffix() {
        let rdbu_r = get_colormap("RdBu_r").unwrap();
        // Low values blue, high values red
        assert!(rdbu_r.sample(0.0).b > rdbu_r.sample(0.0).r);
        assert!(rdbu_r.sample(1.0).r > rdbu_r.sample(1.0).b);

        let greys_r = get_colormap("Greys_r").unwrap();
        assert!(close(greys_r.sample(0.0), Color::BLACK));
        assert!(close(get_colormap("gray_r").unwrap().sample(0.0), Color::WHITE));
    }

    #[test]
    fn test_unknown_colormap() {
        let err = get_colormap("sunset").unwrap_err();
        assert!(matches!(err, GridError::UnsupportedMethod { name } if name == "sunset"));
    }

    #[test]
    fn test_segment_maps() {
        let jet = jet();
        assert!(close(jet.sample(0.0), Color::rgb(0.0, 0.0, 0.5)));
        assert!(close(jet.sample(1.0), Color::rgb(0.5, 0.0, 0.0)));
        assert!(jet.sample(0.5).g > 0.9);

        let hsv = hsv();
        assert!(close(hsv.sample(0.0), Color::rgb(1.0, 0.0, 0.0)));

        let bone = bone();
        assert!(close(bone.sample(1.0), Color::WHITE));
    }

    #[test]
    fn test_from_stops_sorts() {
        let cmap = Colormap::from_stops(
            "two",
            vec![(1.0, Color::WHITE), (0.0, Color::BLACK)],
        );
        assert!(close(cmap.sample(0.5), Color::rgb(0.5, 0.5, 0.5)));
    }
}
