//! Atomic publication of output files

use crate::error::Result;
use std::fs::{self, File};
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `path` through a temporary sibling file and rename it into place.
///
/// Readers observe either the previous file or the complete new one. If
/// `write` fails (including cancellation) the temporary file is removed and
/// the destination is left untouched.
pub fn publish_atomically<P, F>(path: P, write: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut File) -> Result<()>,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    tracing::debug!(path = %path.display(), "published");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    #[test]
    fn publishes_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("out.txt");

        publish_atomically(&target, |f| {
            f.write_all(b"hello")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
    }

    #[test]
    fn failed_write_leaves_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        fs::write(&target, "old").unwrap();

        let result = publish_atomically(&target, |f| {
            f.write_all(b"partial")?;
            Err(Error::Cancelled)
        });

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(fs::read_to_string(&target).unwrap(), "old");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1, "temp file must be cleaned up");
    }
}
