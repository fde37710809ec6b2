//! On-disk arena backing the spillover queue.
//!
//! Records are serialized as JSON lines into an anonymous temp file with
//! independent read/write cursors. Reads are strictly sequential; once the
//! arena empties the file is truncated and both cursors reset, so one file
//! serves the whole crawl cycle.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::SpoolError;

pub(super) struct DiskSpool<T> {
    file: File,
    read_pos: u64,
    write_pos: u64,
    len: usize,
    _record: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> DiskSpool<T> {
    pub(super) fn create(dir: Option<&Path>) -> Result<Self, SpoolError> {
        let file = match dir {
            Some(dir) => tempfile::tempfile_in(dir),
            None => tempfile::tempfile(),
        }
        .map_err(SpoolError::Create)?;

        Ok(Self {
            file,
            read_pos: 0,
            write_pos: 0,
            len: 0,
            _record: PhantomData,
        })
    }

    pub(super) fn len(&self) -> usize {
        self.len
    }

    pub(super) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(super) fn append(&mut self, record: &T) -> Result<(), SpoolError> {
        // serde_json escapes newlines inside strings, so one line per record
        // is unambiguous.
        let mut line = serde_json::to_vec(record).map_err(SpoolError::Encode)?;
        line.push(b'\n');

        self.file
            .seek(SeekFrom::Start(self.write_pos))
            .map_err(SpoolError::Io)?;
        self.file.write_all(&line).map_err(SpoolError::Io)?;
        self.write_pos += line.len() as u64;
        self.len += 1;
        Ok(())
    }

    pub(super) fn pop_front(&mut self) -> Result<Option<T>, SpoolError> {
        if self.len == 0 {
            return Ok(None);
        }
        let line = self.read_line()?;
        let record = serde_json::from_slice(&line).map_err(SpoolError::Decode)?;
        self.len -= 1;
        if self.len == 0 {
            self.reset()?;
        }
        Ok(Some(record))
    }

    fn read_line(&mut self) -> Result<Vec<u8>, SpoolError> {
        self.file
            .seek(SeekFrom::Start(self.read_pos))
            .map_err(SpoolError::Io)?;

        let mut line = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = self.file.read(&mut chunk).map_err(SpoolError::Io)?;
            if n == 0 {
                return Err(SpoolError::Truncated);
            }
            if let Some(end) = chunk[..n].iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&chunk[..end]);
                self.read_pos += line.len() as u64 + 1;
                return Ok(line);
            }
            line.extend_from_slice(&chunk[..n]);
        }
    }

    fn reset(&mut self) -> Result<(), SpoolError> {
        self.file.set_len(0).map_err(SpoolError::Io)?;
        self.read_pos = 0;
        self.write_pos = 0;
        Ok(())
    }
}
