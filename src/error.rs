//! Error taxonomy for image assembly.
//!
//! Every failure is terminal for the build that raised it:
//! - [`ConfigError`] is detected before any hashing or I/O.
//! - [`InputError`] is raised by the payload loader, before an output exists.
//! - [`EmissionError`] is raised while writing; the output target is removed.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::image::Step;
use crate::payload::PayloadRole;

/// Invalid configuration or payload set, detected before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnsupportedPageSize(u32),
    BoardNameTooLong { len: usize, max: usize },
    CommandLineTooLong { len: usize, max: usize },
    /// A header string field contains a NUL byte before its end.
    InteriorNul { field: &'static str, position: usize },
    MissingKernel,
    PayloadTooLarge { role: PayloadRole, len: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedPageSize(size) => write!(f, "unsupported page size {}", size),
            Self::BoardNameTooLong { len, max } => {
                write!(f, "board name too large ({} bytes, max {})", len, max)
            }
            Self::CommandLineTooLong { len, max } => {
                write!(f, "kernel commandline too large ({} bytes, max {})", len, max)
            }
            Self::InteriorNul { field, position } => {
                write!(f, "{} contains a NUL byte at offset {}", field, position)
            }
            Self::MissingKernel => write!(f, "no kernel image specified"),
            Self::PayloadTooLarge { role, len } => write!(
                f,
                "{} is too large for the header size field ({} bytes)",
                role, len
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// A named payload file could not be loaded.
#[derive(Debug)]
pub struct InputError {
    pub role: PayloadRole,
    pub path: PathBuf,
    pub source: io::Error,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not load {} '{}'", self.role, self.path.display())
    }
}

impl std::error::Error for InputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// A write failed while emitting the image.
///
/// `path` is `None` for in-memory builds.
#[derive(Debug)]
pub struct EmissionError {
    pub path: Option<PathBuf>,
    pub step: Step,
    pub source: io::Error,
}

impl EmissionError {
    pub(crate) fn new(step: Step, source: io::Error) -> Self {
        Self {
            path: None,
            step,
            source,
        }
    }

    pub(crate) fn at(mut self, path: &Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }
}

impl fmt::Display for EmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(
                f,
                "failed writing '{}' at {}: {}",
                path.display(),
                self.step,
                self.source
            ),
            None => write!(f, "failed writing image at {}: {}", self.step, self.source),
        }
    }
}

impl std::error::Error for EmissionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Failure of a builder entry point.
#[derive(Debug)]
pub enum BuildError {
    Config(ConfigError),
    Emission(EmissionError),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid configuration: {}", e),
            Self::Emission(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Emission(e) => Some(e),
        }
    }
}

impl From<ConfigError> for BuildError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<EmissionError> for BuildError {
    fn from(e: EmissionError) -> Self {
        Self::Emission(e)
    }
}
