//! Small shared helpers: path display, interpolation and easing.

use std::path::Path;

/// Display a path with the home directory replaced by `~`.
pub fn private_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        return format!("~/{}", stripped.display());
    }
    path.display().to_string()
}

/// Linear interpolation between two values.
pub fn lerp(start: f32, end: f32, fraction: f32) -> f32 {
    start + (end - start) * fraction
}

/// Evaluate a CSS-style cubic Bézier easing curve through (0,0), (x1,y1),
/// (x2,y2), (1,1) at horizontal position `x`.
///
/// The curve is parameterized by t, so x(t) is inverted with Newton's method
/// and falls back to bisection when the derivative gets too flat.
pub fn cubic_bezier(x1: f32, y1: f32, x2: f32, y2: f32, x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);

    let coord = |p1: f32, p2: f32, t: f32| {
        let u = 1.0 - t;
        3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t
    };
    let slope = |p1: f32, p2: f32, t: f32| {
        let u = 1.0 - t;
        3.0 * u * u * p1 + 6.0 * u * t * (p2 - p1) + 3.0 * t * t * (1.0 - p2)
    };

    let mut t = x;
    for _ in 0..8 {
        let error = coord(x1, x2, t) - x;
        if error.abs() < 1e-5 {
            return coord(y1, y2, t);
        }
        let d = slope(x1, x2, t);
        if d.abs() < 1e-6 {
            break;
        }
        t = (t - error / d).clamp(0.0, 1.0);
    }

    let (mut low, mut high) = (0.0_f32, 1.0_f32);
    t = x;
    for _ in 0..32 {
        let value = coord(x1, x2, t);
        if (value - x).abs() < 1e-5 {
            break;
        }
        if value < x {
            low = t;
        } else {
            high = t;
        }
        t = (low + high) / 2.0;
    }
    coord(y1, y2, t)
}

/// Material "fast out, slow in" easing used for tint transitions.
pub fn fast_out_slow_in(fraction: f32) -> f32 {
    cubic_bezier(0.4, 0.0, 0.2, 1.0, fraction)
}
