//! Night tint: the color matrix and its animated application.
//!
//! The night matrix is a 4×4 identity whose red, green and blue diagonal
//! entries come from a quadratic in the configured color temperature. Turning
//! night display on or off animates element-wise from whatever matrix is on
//! screen to the target, with fast-out-slow-in easing. A new request cancels
//! the running animation and starts from the last frame it drew, so rapid
//! toggles never jump.

use std::time::{Duration, Instant};

use crate::backend::TintBackend;
use crate::common::utils::{fast_out_slow_in, lerp};

/// A 4×4 color transform in column-major order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatrix(pub [f32; 16]);

impl ColorMatrix {
    pub const IDENTITY: ColorMatrix = ColorMatrix([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Night matrix for a color temperature in Kelvin.
    ///
    /// `coefficients` holds (a, b, c) for red, green and blue in that order;
    /// each channel is a·T² + b·T + c.
    pub fn for_temperature(kelvin: u32, coefficients: &[f32; 9]) -> Self {
        let t = kelvin as f32;
        let square = t * t;
        let channel = |row: usize| {
            square * coefficients[row * 3] + t * coefficients[row * 3 + 1] + coefficients[row * 3 + 2]
        };

        let mut matrix = Self::IDENTITY;
        matrix.0[0] = channel(0);
        matrix.0[5] = channel(1);
        matrix.0[10] = channel(2);
        matrix
    }

    pub fn lerp(&self, other: &ColorMatrix, fraction: f32) -> ColorMatrix {
        let mut result = [0.0; 16];
        for (i, value) in result.iter_mut().enumerate() {
            *value = lerp(self.0[i], other.0[i], fraction);
        }
        ColorMatrix(result)
    }

    /// Red, green and blue scale factors.
    pub fn diagonal(&self) -> (f32, f32, f32) {
        (self.0[0], self.0[5], self.0[10])
    }
}

#[derive(Debug, Clone, Copy)]
struct Animation {
    from: ColorMatrix,
    to: ColorMatrix,
    started: Instant,
}

/// Owns the tint backend and the animation state.
pub struct Tint {
    backend: Box<dyn TintBackend + Send>,
    coefficients: [f32; 9],
    night: ColorMatrix,
    duration: Duration,
    current: ColorMatrix,
    target: ColorMatrix,
    animation: Option<Animation>,
}

impl Tint {
    pub fn new(
        backend: Box<dyn TintBackend + Send>,
        coefficients: [f32; 9],
        temperature: u32,
        duration: Duration,
    ) -> Self {
        Self {
            backend,
            coefficients,
            night: ColorMatrix::for_temperature(temperature, &coefficients),
            duration,
            current: ColorMatrix::IDENTITY,
            target: ColorMatrix::IDENTITY,
            animation: None,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    pub fn night_matrix(&self) -> ColorMatrix {
        self.night
    }

    /// Matrix most recently written to the backend.
    pub fn current_matrix(&self) -> ColorMatrix {
        self.current
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn set_temperature(&mut self, kelvin: u32) {
        self.night = ColorMatrix::for_temperature(kelvin, &self.coefficients);
    }

    pub fn set_coefficients(&mut self, coefficients: [f32; 9], kelvin: u32) {
        self.coefficients = coefficients;
        self.set_temperature(kelvin);
    }

    /// Swap the output backend. The old one is cleared and cleaned up; the
    /// caller re-applies the current state to the new one.
    pub fn replace_backend(&mut self, backend: Box<dyn TintBackend + Send>) {
        self.animation = None;
        let mut previous = std::mem::replace(&mut self.backend, backend);
        let _ = previous.apply_matrix(&ColorMatrix::IDENTITY);
        previous.cleanup();
        self.current = ColorMatrix::IDENTITY;
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    /// Apply the night matrix (or identity when deactivated).
    ///
    /// `immediate` skips the animation, used for temperature edits where the
    /// user expects to see the new value right away.
    pub fn apply(&mut self, activated: bool, immediate: bool, now: Instant) {
        // A cancelled animation leaves `current` at its last frame
        self.animation = None;
        self.target = if activated {
            self.night
        } else {
            ColorMatrix::IDENTITY
        };

        if immediate || self.duration.is_zero() {
            self.write(self.target);
        } else {
            self.animation = Some(Animation {
                from: self.current,
                to: self.target,
                started: now,
            });
            self.tick(now);
        }
    }

    /// Advance a running animation. Returns true while more frames follow.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(animation) = self.animation else {
            return false;
        };

        let elapsed = now.saturating_duration_since(animation.started);
        if elapsed >= self.duration {
            self.animation = None;
            self.write(animation.to);
            return false;
        }

        // Backends that cannot keep up with frames only see the endpoints
        if self.backend.is_continuous() {
            let fraction = elapsed.as_secs_f32() / self.duration.as_secs_f32();
            let eased = fast_out_slow_in(fraction);
            self.write(animation.from.lerp(&animation.to, eased));
        }
        true
    }

    /// Jump to the end of a running animation.
    pub fn finish(&mut self) {
        if let Some(animation) = self.animation.take() {
            self.write(animation.to);
        }
    }

    /// Put the identity matrix back, skipping any animation.
    pub fn reset(&mut self) {
        self.animation = None;
        self.target = ColorMatrix::IDENTITY;
        self.write(ColorMatrix::IDENTITY);
        self.backend.cleanup();
    }

    fn write(&mut self, matrix: ColorMatrix) {
        self.current = matrix;
        if let Err(e) = self.backend.apply_matrix(&matrix) {
            log_pipe!();
            log_warning!("Failed to apply tint via {}: {e}", self.backend.backend_name());
        }
    }
}
