use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Read a script to string.
///
/// # Errors
/// Returns an error if the file cannot be read or is not valid UTF-8
/// (`io::ErrorKind::InvalidData`). Scripts are never decoded lossily.
pub fn read_script(path: &Path) -> io::Result<String> {
    fs::read_to_string(path)
}

/// Write bytes to `path` through a temp file in the same directory, then rename.
///
/// Missing parent directories are created first. A reader sees either the old
/// contents or the new contents, never a partial write.
///
/// # Errors
/// Returns an error if a directory cannot be created or the write or rename fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("bundle"),
        std::process::id()
    ));

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    match fs::rename(&temp_path, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            // Windows refuses to rename over an existing file.
            if cfg!(windows) {
                fs::copy(&temp_path, path)?;
                let _ = fs::remove_file(&temp_path);
                Ok(())
            } else {
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }
}

/// Number of line breaks in `text`, counting `\r\n` once.
pub fn count_lines(text: &str) -> u32 {
    let mut count = 0;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' => count += 1,
            '\r' => {
                chars.next_if_eq(&'\n');
                count += 1;
            }
            _ => {}
        }
    }
    count
}
