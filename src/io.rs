//! Point-file parsing and pipeline file formats.
//!
//! Three on-disk formats appear in a run:
//!
//! * input point files: whitespace-separated text, at least three numeric
//!   tokens per line interpreted as `x y z`, extra tokens ignored, short
//!   or unparsable lines skipped;
//! * scratch files: header-less little-endian `f64` triples, 24 bytes per
//!   point;
//! * sparse voxel files: one `i,j,k,count` text line per non-empty voxel.
//!
//! File reading is streaming throughout; an input file is never loaded
//! into memory as a whole.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::geometry::Vector3d;
use crate::voxel::VoxelCounts;

/// Streaming iterator over the points of a whitespace-separated text file.
///
/// Iteration ends at end of file or on a read failure.
pub struct TextPoints<R: BufRead> {
    lines: Lines<R>,
}

impl<R: BufRead> Iterator for TextPoints<R> {
    type Item = Vector3d;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(_) => return None,
            };

            let mut tokens = line.split_whitespace();
            let (Some(x), Some(y), Some(z)) = (tokens.next(), tokens.next(), tokens.next()) else {
                continue;
            };

            let (Ok(x), Ok(y), Ok(z)) = (x.parse(), y.parse(), z.parse()) else {
                continue;
            };

            return Some(Vector3d::new(x, y, z));
        }
    }
}

/// Open a text point file for streaming.
pub fn open_text_points<P: AsRef<Path>>(path: P) -> std::io::Result<TextPoints<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(TextPoints {
        lines: BufReader::new(file).lines(),
    })
}

/// Load every point of a text file into memory.
///
/// Convenience for the single-process tools; the pipeline streams instead.
pub fn load_text_points<P: AsRef<Path>>(path: P) -> std::io::Result<Vec<Vector3d>> {
    Ok(open_text_points(path)?.collect())
}

/// Streaming iterator over the points of a binary scratch file.
///
/// Iteration ends at end of file or on a read failure.
pub struct BinaryPoints<R: Read> {
    reader: R,
}

impl<R: Read> Iterator for BinaryPoints<R> {
    type Item = Vector3d;

    fn next(&mut self) -> Option<Self::Item> {
        let x = self.reader.read_f64::<LittleEndian>().ok()?;
        let y = self.reader.read_f64::<LittleEndian>().ok()?;
        let z = self.reader.read_f64::<LittleEndian>().ok()?;
        Some(Vector3d::new(x, y, z))
    }
}

/// Open a binary scratch file for streaming.
pub fn open_binary_points<P: AsRef<Path>>(path: P) -> std::io::Result<BinaryPoints<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(BinaryPoints {
        reader: BufReader::new(file),
    })
}

/// Write points to a binary scratch file, returning how many were written.
pub fn write_binary_points<P, I>(path: P, points: I) -> std::io::Result<usize>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = Vector3d>,
{
    let mut writer = BufWriter::new(File::create(path)?);

    let mut count = 0;
    for point in points {
        writer.write_f64::<LittleEndian>(point.x)?;
        writer.write_f64::<LittleEndian>(point.y)?;
        writer.write_f64::<LittleEndian>(point.z)?;
        count += 1;
    }

    writer.flush()?;
    Ok(count)
}

/// Write a sparse voxel intensity map as `i,j,k,count` text lines.
///
/// Line order is unspecified; consumers of the merged output must not
/// depend on it.
pub fn write_sparsevox<P: AsRef<Path>>(path: P, counts: &VoxelCounts) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);

    for (address, intensity) in counts.iter() {
        writeln!(
            writer,
            "{},{},{},{}",
            address.i, address.j, address.k, intensity
        )?;
    }

    writer.flush()
}

/// Concatenate sparse voxel files into `destination`, deleting each source
/// after it has been appended.
///
/// Sources are appended in the given order, line for line.
pub fn merge_sparsevox<P, Q>(sources: &[P], destination: Q) -> std::io::Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let mut writer = BufWriter::new(File::create(destination)?);

    for source in sources {
        let mut reader = File::open(source)?;
        std::io::copy(&mut reader, &mut writer)?;
        std::fs::remove_file(source)?;
    }

    writer.flush()
}
