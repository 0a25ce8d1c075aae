//! Lock-guarded access to the small private files in the data directory
//!
//! Reads take a shared lock and writes an exclusive one, so two `tp`
//! processes never observe a half-written file. On Unix new files are
//! created with mode 0600.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use fs2::FileExt;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use crate::domain::result::Result;

/// Read the whole file, or `None` when it does not exist
pub(crate) fn read_shared(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut file = File::open(path)?;
    FileExt::lock_shared(&file)?;
    let mut content = String::new();
    let read = file.read_to_string(&mut content);
    FileExt::unlock(&file)?;
    read?;
    Ok(Some(content))
}

/// Replace the file contents
pub(crate) fn write_exclusive(path: &Path, contents: &str) -> Result<()> {
    let mut options = OpenOptions::new();
    options.create(true).read(true).write(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path)?;
    FileExt::lock_exclusive(&file)?;
    let written = (|| -> Result<()> {
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        Ok(())
    })();
    FileExt::unlock(&file)?;
    written
}
