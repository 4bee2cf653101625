//! Buffered line-level access to the record file.
//!
//! Records arrive one per line and leave one median per line, so the scanner
//! pairs an input file with an optional buffered sink on the output path and
//! hands each trimmed line to the caller in order.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bstr::ByteSlice;

const BUFSIZE: usize = 64 * 1024;

/// Streams the lines of a single file, trimmed of trailing whitespace
/// (which also strips carriage returns from CRLF input).
pub struct Scanner {
    path: PathBuf,
}

impl Scanner {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Visit every line in file order.
    pub fn for_each_line<F>(&self, mut apply: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        let file =
            File::open(&self.path).with_context(|| format!("open {}", self.path.display()))?;
        let reader = BufReader::with_capacity(BUFSIZE, file);
        for line in reader.split(b'\n') {
            let line = line.with_context(|| format!("read {}", self.path.display()))?;
            apply(line.trim_end())?;
        }
        Ok(())
    }

    /// Visit every line with a buffered writer on `output`; the writer is
    /// flushed once the input is exhausted.
    pub fn for_each_sink<F>(&self, output: &Path, mut apply: F) -> Result<()>
    where
        F: FnMut(&[u8], &mut BufWriter<File>) -> Result<()>,
    {
        let file = File::create(output).with_context(|| format!("create {}", output.display()))?;
        let mut writer = BufWriter::with_capacity(BUFSIZE, file);
        self.for_each_line(|line| apply(line, &mut writer))?;
        writer.flush().context("flush output")?;
        Ok(())
    }
}
