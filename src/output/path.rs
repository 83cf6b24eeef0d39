//! Output file layout
//!
//! Two layouts are supported:
//!
//! - flat: `{root}/{label}-{device}.csv`
//! - tagged: `{root}/{tag}/{label}-{device}.csv`
//!
//! # Usage Example
//!
//! ```rust
//! use tb_exporter::output::{OutputLayout, OutputPathBuilder};
//! use std::path::PathBuf;
//!
//! let builder = OutputPathBuilder::new(OutputLayout::tagged("data", "field-a"), "soil");
//! let path = builder.device_path("dev-1");
//! assert_eq!(path, PathBuf::from("data/field-a/soil-dev-1.csv"));
//! ```

use super::OutputError;
use std::path::{Path, PathBuf};

/// Directory layout for exported files
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLayout {
    /// All files directly under the root directory
    Flat {
        /// Root output directory
        root: PathBuf,
    },
    /// Files under a tag subdirectory of the root
    Tagged {
        /// Root output directory
        root: PathBuf,
        /// Subdirectory name
        tag: String,
    },
}

impl OutputLayout {
    /// Flat layout rooted at `root`
    pub fn flat(root: impl Into<PathBuf>) -> Self {
        Self::Flat { root: root.into() }
    }

    /// Tagged layout rooted at `root`
    pub fn tagged(root: impl Into<PathBuf>, tag: impl Into<String>) -> Self {
        Self::Tagged {
            root: root.into(),
            tag: tag.into(),
        }
    }

    /// Directory that receives the device files
    pub fn directory(&self) -> PathBuf {
        match self {
            Self::Flat { root } => root.clone(),
            Self::Tagged { root, tag } => root.join(sanitize_component(tag)),
        }
    }
}

/// Builds per-device output paths for one export run
#[derive(Debug, Clone)]
pub struct OutputPathBuilder {
    directory: PathBuf,
    label: String,
}

impl OutputPathBuilder {
    /// Create a path builder
    ///
    /// # Security
    ///
    /// Tag, label and device are sanitized to prevent path traversal.
    /// Characters `/`, `\`, `:` are replaced with `_` and `..` with `__`.
    pub fn new(layout: OutputLayout, label: &str) -> Self {
        Self {
            directory: layout.directory(),
            label: sanitize_component(label),
        }
    }

    /// Output directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File path for a device
    pub fn device_path(&self, device: &str) -> PathBuf {
        self.directory
            .join(format!("{}-{}.csv", self.label, sanitize_component(device)))
    }

    /// Ensure the output directory exists
    pub fn ensure_directories(&self) -> Result<(), OutputError> {
        std::fs::create_dir_all(&self.directory).map_err(|e| {
            OutputError::IoError(format!(
                "Failed to create directory {}: {}",
                self.directory.display(),
                e
            ))
        })
    }
}

/// Make a user-supplied name safe to use as a single path component
fn sanitize_component(name: &str) -> String {
    name.replace("..", "__").replace(['/', '\\', ':'], "_")
}
