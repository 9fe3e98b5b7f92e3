//! In-memory zip archive assembly.

use std::io::{Cursor, Write};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::VfsResult;

/// Builds a zip archive into a memory buffer, one entry at a time.
pub(crate) struct ZipBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    entries: usize,
}

impl ZipBuilder {
    pub(crate) fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            entries: 0,
        }
    }

    /// Begin a new entry; subsequent writes go into it.
    pub(crate) fn start_entry(&mut self, name: &str) -> VfsResult<()> {
        self.writer.start_file(name, SimpleFileOptions::default())?;
        self.entries += 1;
        Ok(())
    }

    /// Append a chunk to the current entry.
    pub(crate) fn write_chunk(&mut self, chunk: &[u8]) -> VfsResult<()> {
        self.writer.write_all(chunk)?;
        Ok(())
    }

    pub(crate) fn entries(&self) -> usize {
        self.entries
    }

    /// Write the central directory and hand back the archive bytes.
    pub(crate) fn finish(self) -> VfsResult<Vec<u8>> {
        Ok(self.writer.finish()?.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn test_build_and_read_back() {
        let mut zip = ZipBuilder::new();
        zip.start_entry("a.txt").unwrap();
        zip.write_chunk(b"hel").unwrap();
        zip.write_chunk(b"lo").unwrap();
        zip.start_entry("sub/b.txt").unwrap();
        zip.write_chunk(b"world").unwrap();
        assert_eq!(zip.entries(), 2);

        let bytes = zip.finish().unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut contents = String::new();
        archive
            .by_name("a.txt")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "hello");
    }

    #[test]
    fn test_empty_archive() {
        let bytes = ZipBuilder::new().finish().unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
