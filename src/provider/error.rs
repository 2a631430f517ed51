use std::io;
use std::path::{Path, PathBuf};

use snafu::Snafu;

use crate::ext::BestEffortPathExt;

/// Faults raised by a provider. "Not found" and "unsupported" mutations are not
/// errors: queries return `None` and mutations return `Ok(false)` for those.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("{} is not a directory", path.best_effort_path_display()))]
    NotADirectory { path: PathBuf },
    #[snafu(display("Access denied to {}", path.best_effort_path_display()))]
    AccessDenied { path: PathBuf, source: io::Error },
    #[snafu(display("I/O failure on {}", path.best_effort_path_display()))]
    Io { path: PathBuf, source: io::Error },
    #[snafu(display("{} is already open for {}", path.best_effort_path_display(), mode))]
    Busy { path: PathBuf, mode: &'static str },
    #[snafu(display("Provider '{}' does not support {}", provider, operation))]
    Unsupported {
        provider: String,
        operation: &'static str,
    },
    #[snafu(display("Invalid item name '{}'", name))]
    InvalidName { name: String },
    #[snafu(display("Invalid pattern '{}'", pattern))]
    InvalidPattern {
        pattern: String,
        source: globset::Error,
    },
}

impl ProviderError {
    /// Classifies an I/O error so that permission problems stay distinguishable
    /// from other faults.
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        let path = path.to_path_buf();
        match source.kind() {
            io::ErrorKind::PermissionDenied => ProviderError::AccessDenied { path, source },
            io::ErrorKind::NotADirectory => ProviderError::NotADirectory { path },
            _ => ProviderError::Io { path, source },
        }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, ProviderError::AccessDenied { .. })
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, ProviderError::Busy { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, ProviderError::Unsupported { .. })
    }
}

pub(crate) trait FaultExt<T> {
    fn fault(self, path: &Path) -> Result<T, ProviderError>;
}

impl<T> FaultExt<T> for io::Result<T> {
    fn fault(self, path: &Path) -> Result<T, ProviderError> {
        self.map_err(|source| ProviderError::from_io(path, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(io::ErrorKind::PermissionDenied, true)]
    #[case(io::ErrorKind::NotFound, false)]
    #[case(io::ErrorKind::Other, false)]
    fn permission_denied_is_classified_separately(
        #[case] kind: io::ErrorKind,
        #[case] access_denied: bool,
    ) {
        let error = ProviderError::from_io(Path::new("/nope"), io::Error::from(kind));
        assert_eq!(error.is_access_denied(), access_denied);
    }

    #[test]
    fn error_display_carries_the_path() {
        let error = ProviderError::from_io(
            Path::new("/virtual/missing.txt"),
            io::Error::other("disk on fire"),
        );
        assert!(error.to_string().contains("/virtual/missing.txt"));
    }
}
