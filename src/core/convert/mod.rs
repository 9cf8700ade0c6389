//! # Convert Module
//!
//! Normalizes image formats before import. Currently HEIC/HEIF to JPEG.
//!
//! Output is written to a fresh temporary directory that lives as long as
//! the returned [`ConvertedImage`].

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::debug;

/// Check if a file needs converting before import
pub fn is_heic(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "heic" | "heif"))
        .unwrap_or(false)
}

/// A converted file and the temporary directory holding it
#[derive(Debug)]
pub struct ConvertedImage {
    path: PathBuf,
    _dir: TempDir,
}

impl ConvertedImage {
    /// Take ownership of a file already written inside `dir`
    pub fn new(path: PathBuf, dir: TempDir) -> Self {
        Self { path, _dir: dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Trait for image format converters
pub trait ImageConverter: Send + Sync {
    fn convert(&self, path: &Path) -> Result<ConvertedImage, ConvertError>;
}

/// External tool used for conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConverterTool {
    /// macOS built-in `sips`
    Sips,
    /// ImageMagick 7 `magick`
    ImageMagick,
}

impl ConverterTool {
    /// `sips` on macOS, ImageMagick elsewhere
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            ConverterTool::Sips
        } else {
            ConverterTool::ImageMagick
        }
    }

    fn program(&self) -> &'static str {
        match self {
            ConverterTool::Sips => "sips",
            ConverterTool::ImageMagick => "magick",
        }
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut command = Command::new(self.program());
        match self {
            ConverterTool::Sips => {
                command
                    .args(["-s", "format", "jpeg"])
                    .arg(input)
                    .arg("--out")
                    .arg(output);
            }
            ConverterTool::ImageMagick => {
                command.arg(input).arg(output);
            }
        }
        command
    }
}

impl Default for ConverterTool {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Converts HEIC to JPEG by shelling out to an external tool
#[derive(Debug, Clone, Default)]
pub struct CommandConverter {
    tool: ConverterTool,
}

impl CommandConverter {
    pub fn new(tool: ConverterTool) -> Self {
        Self { tool }
    }
}

impl ImageConverter for CommandConverter {
    fn convert(&self, path: &Path) -> Result<ConvertedImage, ConvertError> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "converted".to_string());

        let dir = TempDir::new().map_err(ConvertError::TempDir)?;
        let output_path = dir.path().join(format!("{}.jpg", stem));

        debug!(
            "Running {} on {}",
            self.tool.program(),
            path.display()
        );

        let output = self
            .tool
            .command(path, &output_path)
            .output()
            .map_err(|e| ConvertError::Spawn {
                program: self.tool.program().to_string(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(ConvertError::Failed {
                path: path.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if !output_path.is_file() {
            return Err(ConvertError::Failed {
                path: path.to_path_buf(),
                reason: format!("{} produced no output", self.tool.program()),
            });
        }

        Ok(ConvertedImage::new(output_path, dir))
    }
}
