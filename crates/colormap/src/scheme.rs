//! Color schemes for rendering analysis fields.
//!
//! Continuous ramps map a normalized scalar (typically an inscribed-ball
//! diameter) to a color. The categorical palette in [`cluster_color`]
//! assigns each pore body a stable hue by stepping around the color
//! wheel with the golden-ratio conjugate, which keeps consecutive ids
//! visually far apart.

// ─── basic color types ───────────────────────────────────────────────────────

/// An RGB color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A stop on a color ramp: position `t` in [0, 1] and its color.
#[derive(Debug, Clone, Copy)]
pub struct ColorStop {
    pub t: f64,
    pub color: Rgb,
}

impl ColorStop {
    pub const fn new(t: f64, color: Rgb) -> Self {
        Self { t, color }
    }
}

// ─── color schemes ───────────────────────────────────────────────────────────

/// Continuous color ramps for scalar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorScheme {
    /// Cold blue for narrow throats through green to red for large bodies.
    #[default]
    BlueRed,
    /// Black-body ramp from black through red and orange to near white.
    Thermal,
    /// Linear gray ramp.
    Grayscale,
}

impl ColorScheme {
    /// All available schemes, for CLI listings.
    pub const ALL: &'static [ColorScheme] = &[
        ColorScheme::BlueRed,
        ColorScheme::Thermal,
        ColorScheme::Grayscale,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ColorScheme::BlueRed => "blue-red",
            ColorScheme::Thermal => "thermal",
            ColorScheme::Grayscale => "grayscale",
        }
    }
}

// ─── stop tables ─────────────────────────────────────────────────────────────

const BLUE_RED: &[ColorStop] = &[
    ColorStop::new(0.00, Rgb::new(13, 71, 161)),
    ColorStop::new(0.25, Rgb::new(66, 165, 245)),
    ColorStop::new(0.50, Rgb::new(102, 187, 106)),
    ColorStop::new(0.75, Rgb::new(255, 167, 38)),
    ColorStop::new(1.00, Rgb::new(198, 40, 40)),
];

const THERMAL: &[ColorStop] = &[
    ColorStop::new(0.00, Rgb::new(0, 0, 0)),
    ColorStop::new(0.25, Rgb::new(120, 20, 8)),
    ColorStop::new(0.50, Rgb::new(220, 80, 10)),
    ColorStop::new(0.75, Rgb::new(255, 180, 40)),
    ColorStop::new(1.00, Rgb::new(255, 255, 240)),
];

const GRAYSCALE: &[ColorStop] = &[
    ColorStop::new(0.00, Rgb::new(0, 0, 0)),
    ColorStop::new(0.50, Rgb::new(128, 128, 128)),
    ColorStop::new(1.00, Rgb::new(255, 255, 255)),
];

// ─── interpolation ───────────────────────────────────────────────────────────

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_color(a: Rgb, b: Rgb, t: f64) -> Rgb {
    Rgb::new(
        lerp(f64::from(a.r), f64::from(b.r), t).round() as u8,
        lerp(f64::from(a.g), f64::from(b.g), t).round() as u8,
        lerp(f64::from(a.b), f64::from(b.b), t).round() as u8,
    )
}

fn multi_stop(stops: &[ColorStop], t: f64) -> Rgb {
    if t <= stops[0].t {
        return stops[0].color;
    }
    let last = stops[stops.len() - 1];
    if t >= last.t {
        return last.color;
    }
    for pair in stops.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if t <= hi.t {
            let local = (t - lo.t) / (hi.t - lo.t);
            return lerp_color(lo.color, hi.color, local);
        }
    }
    last.color
}

/// Evaluates a scheme at normalized position `t`, clamping to [0, 1].
pub fn evaluate(scheme: ColorScheme, t: f64) -> Rgb {
    let stops = match scheme {
        ColorScheme::BlueRed => BLUE_RED,
        ColorScheme::Thermal => THERMAL,
        ColorScheme::Grayscale => GRAYSCALE,
    };
    multi_stop(stops, t)
}

// ─── categorical cluster palette ─────────────────────────────────────────────

/// Hue step between consecutive cluster ids, the golden-ratio conjugate.
const GOLDEN_RATIO_CONJUGATE: f64 = 0.618_033_988_749_895;

/// Color for voxels whose cluster is still unresolved.
const UNRESOLVED: Rgb = Rgb::new(64, 64, 64);

/// A stable categorical color for a cluster id.
///
/// Ids are arbitrary voxel indices, so the palette derives the hue from
/// the id directly rather than from an enumeration order. The same id
/// always renders the same color, across slices and across runs.
pub fn cluster_color(id: i32) -> Rgb {
    if id < 0 {
        return UNRESOLVED;
    }
    let hue = (f64::from(id) * GOLDEN_RATIO_CONJUGATE).fract();
    hsv_to_rgb(hue, 0.62, 0.92)
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Rgb {
    let h6 = h * 6.0;
    let sector = (h6.floor() as i32).rem_euclid(6);
    let f = h6 - h6.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match sector {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, v, q),
        _ => (v, p, q),
    };
    Rgb::new(
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    )
}

// ─── tests ───────────────────────────────────────────────────────────────────
