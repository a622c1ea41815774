//! Backend that only reports the tint in the log.

use anyhow::Result;

use super::TintBackend;
use crate::core::ColorMatrix;

pub struct LogBackend {
    debug_enabled: bool,
    last: Option<ColorMatrix>,
}

impl LogBackend {
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            last: None,
        }
    }
}

impl TintBackend for LogBackend {
    fn apply_matrix(&mut self, matrix: &ColorMatrix) -> Result<()> {
        if self.last.as_ref() == Some(matrix) {
            return Ok(());
        }
        self.last = Some(*matrix);

        let (red, green, blue) = matrix.diagonal();
        if *matrix == ColorMatrix::IDENTITY {
            log_decorated!("Tint cleared");
        } else {
            log_decorated!("Tint applied: r={red:.3} g={green:.3} b={blue:.3}");
        }
        if self.debug_enabled {
            log_indented!("Matrix: {:?}", matrix.0);
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "Log"
    }

    fn is_continuous(&self) -> bool {
        false
    }
}
