//! In-memory archive fixtures for tests in this and dependent crates.

use std::io::{Cursor, Write as _};

use zip::result::ZipError;

/// Builds a zip archive from `(name, content)` pairs. Names ending in `/`
/// become directory entries.
///
/// # Panics
///
/// * If the archive cannot be written
#[must_use]
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    write_zip(entries).unwrap_or_else(|e| panic!("failed to build test archive: {e}"))
}

fn write_zip(entries: &[(&str, &str)]) -> Result<Vec<u8>, ZipError> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options)?;
        } else {
            writer.start_file(*name, options)?;
            writer.write_all(content.as_bytes())?;
        }
    }

    Ok(writer.finish()?.into_inner())
}
