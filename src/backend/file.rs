//! Backend that publishes the matrix as a JSON file.
//!
//! ```json
//! {
//!   "activated": true,
//!   "red": 1.0,
//!   "green": 0.8119,
//!   "blue": 0.6097,
//!   "matrix": [1.0, 0.0, ...]
//! }
//! ```
//!
//! The file is replaced atomically so readers never see a partial write.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::TintBackend;
use crate::common::utils::private_path;
use crate::core::ColorMatrix;

#[derive(Serialize)]
struct MatrixDocument<'a> {
    activated: bool,
    red: f32,
    green: f32,
    blue: f32,
    matrix: &'a [f32; 16],
}

pub struct FileBackend {
    path: PathBuf,
    debug_enabled: bool,
}

impl FileBackend {
    pub fn new(path: PathBuf, debug_enabled: bool) -> Self {
        Self {
            path,
            debug_enabled,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TintBackend for FileBackend {
    fn apply_matrix(&mut self, matrix: &ColorMatrix) -> Result<()> {
        let dir = self
            .path
            .parent()
            .context("output_path has no parent directory")?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", private_path(dir)))?;

        let (red, green, blue) = matrix.diagonal();
        let document = MatrixDocument {
            activated: *matrix != ColorMatrix::IDENTITY,
            red,
            green,
            blue,
            matrix: &matrix.0,
        };
        let json = serde_json::to_string_pretty(&document)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(json.as_bytes())?;
        temp.write_all(b"\n")?;
        temp.persist(&self.path)
            .with_context(|| format!("Failed to write {}", private_path(&self.path)))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "File"
    }

    fn cleanup(&mut self) {
        if self.debug_enabled {
            log_pipe!();
            log_debug!("Left identity matrix in {}", private_path(&self.path));
        }
    }
}
