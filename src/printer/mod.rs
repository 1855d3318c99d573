// tally: Counts format conversion for population genetic data.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//

//! Writers for the supported output formats.
//!
//! [CfWriter] produces counts format text; the [fasta] submodule turns
//! count rows back into FASTA sequences.
//!
//! The first line of a counts format file declares the number of sites,
//! which is only known after every row has been written. [CfWriter]
//! therefore streams the body to the output path and prepends the
//! first line at [finish](CfWriter::finish) by rewriting through a
//! temporary file in the same directory, replacing the body with an
//! atomic rename.

// Format specific implementations
pub mod fasta;

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::errors::CfError;

/// Format one counts format data line, without the trailing newline.
///
/// ## Usage
///
/// ```rust
/// use tally::printer::format_cf_line;
///
/// let line = format_cf_line("chr1", 8373, &[[0, 0, 1, 0], [2, 0, 3, 0]]);
/// assert_eq!(line, "chr1 8373 0,0,1,0 2,0,3,0");
/// ```
pub fn format_cf_line(chrom: &str, pos: u64, counts: &[[u32; 4]]) -> String {
    let mut line = format!("{} {}", chrom, pos);
    for tuple in counts {
        line.push_str(&format!(
            " {},{},{},{}",
            tuple[0], tuple[1], tuple[2], tuple[3]
        ));
    }
    line
}

/// Streaming writer for counts format files.
///
/// Rows are streamed to disk as they arrive; call
/// [finish](CfWriter::finish) to prepend the `COUNTSFILE` line once the
/// site count is known. A writer that is dropped without `finish`
/// leaves the headerless body behind.
pub struct CfWriter {
    path: PathBuf,
    out: Box<dyn Write>,
    names: Vec<String>,
    offset: i64,
    n_sites: u64,
    header_written: bool,
}

impl CfWriter {
    /// Open `path` for writing; gzip output if the path ends in `.gz`.
    pub fn create(path: &Path, names: &[String]) -> Result<Self, CfError> {
        Ok(CfWriter {
            path: path.to_path_buf(),
            out: crate::open_write(path)?,
            names: names.to_vec(),
            offset: 0,
            n_sites: 0,
            header_written: false,
        })
    }

    /// Shift every written position by `offset`.
    pub fn set_offset(&mut self, offset: i64) {
        self.offset = offset;
    }

    /// Number of data rows written so far.
    pub fn n_sites(&self) -> u64 {
        self.n_sites
    }

    /// Write a `#` comment line. Only valid before the first data row.
    pub fn write_comment(&mut self, text: &str) -> Result<(), CfError> {
        writeln!(self.out, "# {}", text)?;
        Ok(())
    }

    fn write_header(&mut self) -> Result<(), CfError> {
        write!(self.out, "CHROM POS")?;
        for name in &self.names {
            write!(self.out, " {}", name)?;
        }
        writeln!(self.out)?;
        self.header_written = true;
        Ok(())
    }

    /// Write one data row. The column header is emitted before the
    /// first row.
    pub fn write_row(
        &mut self,
        chrom: &str,
        pos: u64,
        counts: &[[u32; 4]],
    ) -> Result<(), CfError> {
        if counts.len() != self.names.len() {
            return Err(CfError::InvalidNameList {
                got: counts.len(),
                expected: self.names.len(),
            });
        }
        let shifted = pos
            .checked_add_signed(self.offset)
            .filter(|shifted| *shifted > 0)
            .ok_or(CfError::InvalidOffset {
                offset: self.offset,
                pos,
            })?;
        if !self.header_written {
            self.write_header()?;
        }
        writeln!(self.out, "{}", format_cf_line(chrom, shifted, counts))?;
        self.n_sites += 1;
        Ok(())
    }

    /// Prepend the `COUNTSFILE` line and atomically replace the body.
    ///
    /// Returns the final output path.
    pub fn finish(mut self) -> Result<PathBuf, CfError> {
        if !self.header_written {
            self.write_header()?;
        }
        self.out.flush()?;
        let CfWriter {
            path,
            out,
            names,
            n_sites,
            ..
        } = self;
        // Close the body so the gzip trailer is written before the
        // copy-back starts.
        drop(out);

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let temp = path.with_file_name(format!("temp_{}", file_name));

        let mut rewritten = crate::open_write(&temp)?;
        writeln!(rewritten, "COUNTSFILE NPOP {} NSITES {}", names.len(), n_sites)?;
        let mut body = crate::open_read(&path)?;
        std::io::copy(&mut body, &mut rewritten)?;
        rewritten.flush()?;
        drop(rewritten);

        std::fs::rename(&temp, &path)?;
        Ok(path)
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn format_cf_line_output() {
        use super::format_cf_line;

        let line = format_cf_line("1", 5, &[[2, 0, 0, 0], [0, 0, 1, 1]]);
        assert_eq!(line, "1 5 2,0,0,0 0,0,1,1");
    }

    #[test]
    fn finished_file_roundtrips_through_the_reader() {
        use crate::parser::CfReader;
        use super::CfWriter;

        let path = std::env::temp_dir().join("tally_cfwriter_finish_test.cf");
        let names = vec!["sheep".to_string(), "wolf".to_string()];

        let mut writer = CfWriter::create(&path, &names).unwrap();
        writer.write_comment("written by a test").unwrap();
        writer.write_row("1", 1, &[[2, 0, 0, 0], [0, 0, 2, 0]]).unwrap();
        writer.write_row("1", 2, &[[0, 2, 0, 0], [0, 1, 1, 0]]).unwrap();
        assert_eq!(writer.n_sites(), 2);
        writer.finish().unwrap();

        let mut reader = CfReader::from_path(&path).unwrap();
        assert_eq!(reader.populations(), names.as_slice());
        assert_eq!(reader.n_sites(), 2);
        let rows: Vec<_> = reader.by_ref().map(|row| row.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].counts, vec![[0, 2, 0, 0], [0, 1, 1, 0]]);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn offset_shifts_written_positions() {
        use crate::parser::CfReader;
        use super::CfWriter;

        let path = std::env::temp_dir().join("tally_cfwriter_offset_test.cf");
        let names = vec!["sheep".to_string()];

        let mut writer = CfWriter::create(&path, &names).unwrap();
        writer.set_offset(100);
        writer.write_row("1", 1, &[[2, 0, 0, 0]]).unwrap();
        writer.finish().unwrap();

        let mut reader = CfReader::from_path(&path).unwrap();
        let row = reader.next().unwrap().unwrap();
        assert_eq!(row.pos, 101);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn offset_below_the_first_position_is_an_error() {
        use crate::errors::CfError;
        use super::CfWriter;

        let path = std::env::temp_dir().join("tally_cfwriter_negative_offset_test.cf");
        let names = vec!["sheep".to_string()];

        let mut writer = CfWriter::create(&path, &names).unwrap();
        writer.set_offset(-10);
        let got = writer.write_row("1", 5, &[[2, 0, 0, 0]]);
        assert!(matches!(got, Err(CfError::InvalidOffset { offset: -10, pos: 5 })));

        // Shifting down to position 1 is still fine.
        writer.write_row("1", 11, &[[2, 0, 0, 0]]).unwrap();

        drop(writer);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn row_width_is_validated() {
        use crate::errors::CfError;
        use super::CfWriter;

        let path = std::env::temp_dir().join("tally_cfwriter_width_test.cf");
        let names = vec!["sheep".to_string(), "wolf".to_string()];

        let mut writer = CfWriter::create(&path, &names).unwrap();
        let got = writer.write_row("1", 1, &[[2, 0, 0, 0]]);
        assert!(matches!(got, Err(CfError::InvalidNameList { got: 1, expected: 2 })));

        std::fs::remove_file(&path).unwrap();
    }
}
