//! Output location helpers

use std::fs;
use std::path::{Path, PathBuf};

use super::AssemblyError;

/// Create the output directory if needed
pub fn create_output_directory(dir: &Path) -> Result<PathBuf, AssemblyError> {
    fs::create_dir_all(dir).map_err(|source| AssemblyError::Destination {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(dir.to_path_buf())
}

/// `name.ext`, or `name_1.ext`, `name_2.ext`, ... if taken
pub fn unique_filename(dir: &Path, base: &str, extension: &str) -> PathBuf {
    let candidate = dir.join(format!("{}.{}", base, extension));
    if !candidate.exists() {
        return candidate;
    }

    let mut counter = 1u32;
    loop {
        let candidate = dir.join(format!("{}_{}.{}", base, counter, extension));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Resolve a user-supplied output path.
///
/// A directory gets a unique default file name; a path without an
/// extension gets the sink's.
pub fn resolve_output_path(requested: &Path, base: &str, extension: &str) -> PathBuf {
    if requested.is_dir() {
        return unique_filename(requested, base, extension);
    }
    if requested.extension().is_none() {
        return requested.with_extension(extension);
    }
    requested.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unique_filename_counts_up() {
        let dir = TempDir::new().unwrap();
        let first = unique_filename(dir.path(), "report", "md");
        assert_eq!(first, dir.path().join("report.md"));

        fs::write(&first, "x").unwrap();
        let second = unique_filename(dir.path(), "report", "md");
        assert_eq!(second, dir.path().join("report_1.md"));

        fs::write(&second, "x").unwrap();
        assert_eq!(unique_filename(dir.path(), "report", "md"), dir.path().join("report_2.md"));
    }

    #[test]
    fn test_create_output_directory_nested() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        create_output_directory(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_resolve_output_path() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_output_path(dir.path(), "r", "md"), dir.path().join("r.md"));
        assert_eq!(
            resolve_output_path(&dir.path().join("custom"), "r", "md"),
            dir.path().join("custom.md")
        );
        assert_eq!(
            resolve_output_path(&dir.path().join("custom.txt"), "r", "md"),
            dir.path().join("custom.txt")
        );
    }
}
