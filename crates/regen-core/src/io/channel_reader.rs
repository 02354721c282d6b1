//! Forward-only reader for columnar channel files.
//!
//! A channel file holds one header row (`pixel_index, frame_0, ..., frame_{N-1}`)
//! followed by one row per pixel position in row-major order. Each data row
//! carries one sample per frame. The reader hands out fixed-size batches of
//! pixel rows as `[row][frame]` u8 matrices so that only one chunk is ever
//! resident.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayViewMut1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{DEFAULT_DELIMITER, PARALLEL_ROW_THRESHOLD};
use crate::error::{RegenError, Result};

/// How samples outside `[0, 255]` are narrowed to u8.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplePolicy {
    /// Keep the low 8 bits, like an unchecked `as u8` cast.
    Wrap,
    /// Saturate to `[0, 255]` and count the sample.
    #[default]
    Clamp,
    /// Fail the job on the first out-of-range sample.
    Reject,
}

impl SamplePolicy {
    /// Narrow `value` to a byte. Returns `None` only under `Reject` when the
    /// value is out of range; the flag is `true` for in-range values.
    pub fn narrow(self, value: i64) -> Option<(u8, bool)> {
        let in_range = (0..=255).contains(&value);
        match self {
            Self::Wrap => Some((value as u8, in_range)),
            Self::Clamp => Some((value.clamp(0, 255) as u8, in_range)),
            Self::Reject => in_range.then_some((value as u8, true)),
        }
    }
}

impl fmt::Display for SamplePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wrap => write!(f, "Wrap"),
            Self::Clamp => write!(f, "Clamp"),
            Self::Reject => write!(f, "Reject"),
        }
    }
}

/// Parsed header row of a channel file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelHeader {
    /// Name of the leading index column (ignored on read).
    pub index_column: String,
    /// Frame identifiers in column order.
    pub frame_ids: Vec<String>,
}

impl ChannelHeader {
    pub fn frame_count(&self) -> usize {
        self.frame_ids.len()
    }
}

/// A contiguous range of pixel rows, `data` shaped `(rows, frames)`.
#[derive(Clone, Debug)]
pub struct ChannelBatch {
    /// Pixel row index of `data`'s first row.
    pub first_row: usize,
    pub data: Array2<u8>,
    /// Samples in this batch that fell outside `[0, 255]`.
    pub out_of_range: usize,
}

impl ChannelBatch {
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }
}

/// Summary of a channel file gathered by a single sequential scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelFileInfo {
    pub path: PathBuf,
    pub frames: usize,
    pub rows: usize,
    pub bytes: u64,
}

/// Sequential batch reader over one channel file.
pub struct ChannelStreamReader {
    path: PathBuf,
    lines: BufReader<File>,
    header: ChannelHeader,
    delimiter: char,
    policy: SamplePolicy,
    /// 1-based number of the last physical line consumed.
    line_number: usize,
    rows_read: usize,
    out_of_range: u64,
    exhausted: bool,
}

impl ChannelStreamReader {
    /// Open a comma-delimited channel file with the default sample policy.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, DEFAULT_DELIMITER, SamplePolicy::default())
    }

    /// Open a channel file and parse its header row.
    pub fn open_with(path: &Path, delimiter: char, policy: SamplePolicy) -> Result<Self> {
        let mut lines = open_buffered(path)?;
        let header = read_header(&mut lines, path, delimiter)?;
        debug!(
            path = %path.display(),
            frames = header.frame_count(),
            "Opened channel file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            lines,
            header,
            delimiter,
            policy,
            line_number: 1,
            rows_read: 0,
            out_of_range: 0,
            exhausted: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &ChannelHeader {
        &self.header
    }

    pub fn frame_count(&self) -> usize {
        self.header.frame_count()
    }

    /// Data rows handed out so far.
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Out-of-range samples seen so far.
    pub fn samples_out_of_range(&self) -> u64 {
        self.out_of_range
    }

    /// Read the next batch of at most `chunk_size` pixel rows.
    ///
    /// Returns `Ok(None)` once the file is exhausted. Blank lines are skipped.
    pub fn next_batch(&mut self, chunk_size: usize) -> Result<Option<ChannelBatch>> {
        if chunk_size == 0 {
            return Err(RegenError::InvalidConfig("chunk size must be > 0".into()));
        }
        if self.exhausted {
            return Ok(None);
        }

        let mut pending: Vec<(usize, String)> = Vec::with_capacity(chunk_size.min(1 << 16));
        let mut buf = Vec::new();
        while pending.len() < chunk_size {
            buf.clear();
            if self.lines.read_until(b'\n', &mut buf)? == 0 {
                self.exhausted = true;
                break;
            }
            self.line_number += 1;
            let text = std::str::from_utf8(&buf).map_err(|e| RegenError::MalformedRow {
                path: self.path.clone(),
                line: self.line_number,
                reason: format!("invalid UTF-8 at byte {}", e.valid_up_to()),
            })?;
            let text = text.trim_end_matches(['\n', '\r']);
            if text.trim().is_empty() {
                continue;
            }
            pending.push((self.line_number, text.to_string()));
        }

        if pending.is_empty() {
            return Ok(None);
        }

        let rows = pending.len();
        let mut data = Array2::<u8>::zeros((rows, self.frame_count()));
        let row_parser = RowParser {
            path: &self.path,
            delimiter: self.delimiter,
            policy: self.policy,
        };

        let counts: Vec<usize> = if rows >= PARALLEL_ROW_THRESHOLD {
            data.axis_iter_mut(Axis(0))
                .into_par_iter()
                .zip(pending.par_iter())
                .map(|(out, (line, text))| row_parser.parse_into(text, *line, out))
                .collect::<Result<_>>()?
        } else {
            data.axis_iter_mut(Axis(0))
                .zip(pending.iter())
                .map(|(out, (line, text))| row_parser.parse_into(text, *line, out))
                .collect::<Result<_>>()?
        };
        let out_of_range: usize = counts.into_iter().sum();

        let batch = ChannelBatch {
            first_row: self.rows_read,
            data,
            out_of_range,
        };
        self.rows_read += rows;
        self.out_of_range += out_of_range as u64;
        Ok(Some(batch))
    }
}

struct RowParser<'a> {
    path: &'a Path,
    delimiter: char,
    policy: SamplePolicy,
}

impl RowParser<'_> {
    /// Parse one data row into `out`, returning the number of out-of-range samples.
    fn parse_into(&self, text: &str, line: usize, mut out: ArrayViewMut1<u8>) -> Result<usize> {
        let expected = out.len();
        let mut fields = text.split(self.delimiter);
        // Leading pixel index column.
        fields.next();

        let mut written = 0;
        let mut out_of_range = 0;
        for field in fields {
            if written == expected {
                return Err(self.malformed(
                    line,
                    format!("expected {expected} frame values, found more"),
                ));
            }
            let value = parse_sample(field).ok_or_else(|| {
                self.malformed(
                    line,
                    format!("unparseable value {:?} in frame column {written}", field.trim()),
                )
            })?;
            let (byte, in_range) =
                self.policy
                    .narrow(value)
                    .ok_or_else(|| RegenError::SampleOutOfRange {
                        path: self.path.to_path_buf(),
                        line,
                        value,
                    })?;
            if !in_range {
                out_of_range += 1;
            }
            out[written] = byte;
            written += 1;
        }

        if written != expected {
            return Err(self.malformed(
                line,
                format!("expected {expected} frame values, found {written}"),
            ));
        }
        Ok(out_of_range)
    }

    fn malformed(&self, line: usize, reason: String) -> RegenError {
        RegenError::MalformedRow {
            path: self.path.to_path_buf(),
            line,
            reason,
        }
    }
}

/// Scan a channel file without materialising it: frame count from the
/// header, data rows by counting non-blank lines.
pub fn inspect_channel_file(path: &Path, delimiter: char) -> Result<ChannelFileInfo> {
    let mut lines = open_buffered(path)?;
    let header = read_header(&mut lines, path, delimiter)?;
    let bytes = std::fs::metadata(path)?.len();

    let mut rows = 0;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if lines.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        if !buf.iter().all(u8::is_ascii_whitespace) {
            rows += 1;
        }
    }

    Ok(ChannelFileInfo {
        path: path.to_path_buf(),
        frames: header.frame_count(),
        rows,
        bytes,
    })
}

fn open_buffered(path: &Path) -> Result<BufReader<File>> {
    match File::open(path) {
        Ok(file) => Ok(BufReader::new(file)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(RegenError::MissingInputFile {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

fn read_header(lines: &mut BufReader<File>, path: &Path, delimiter: char) -> Result<ChannelHeader> {
    let invalid = |reason: &str| RegenError::InvalidHeader {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let mut buf = Vec::new();
    if lines.read_until(b'\n', &mut buf)? == 0 {
        return Err(invalid("file is empty"));
    }
    let text = std::str::from_utf8(&buf)
        .map_err(|_| invalid("header is not valid UTF-8"))?
        .trim_start_matches('\u{feff}')
        .trim_end_matches(['\n', '\r']);

    let mut fields = text.split(delimiter).map(|f| unquote(f.trim()).to_string());
    let index_column = fields.next().unwrap_or_default();
    let frame_ids: Vec<String> = fields.collect();
    if frame_ids.is_empty() {
        return Err(invalid("no frame columns after the index column"));
    }

    Ok(ChannelHeader {
        index_column,
        frame_ids,
    })
}

/// Parse a textual sample. Integers are taken as-is, finite decimals are
/// truncated toward zero.
fn parse_sample(field: &str) -> Option<i64> {
    let text = unquote(field.trim());
    if let Ok(value) = text.parse::<i64>() {
        return Some(value);
    }
    let value: f64 = text.parse().ok()?;
    value.is_finite().then(|| value.trunc() as i64)
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}
