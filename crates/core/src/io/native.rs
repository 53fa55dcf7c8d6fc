//! Native volume format reading/writing
//!
//! Binary, little-endian, versionless: one reserved byte, the dimensions,
//! the pore count, the packed voxel words, the processed-snapshot table and
//! the pore map. Loading validates the stored word count against the
//! dimensions and fails loudly on disagreement.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::progress::ProgressAdapter;
use crate::volume::{Image, PackedVolume, PoreVoxel, VolumeDims};

/// Words transferred between progress updates while streaming buffers
const WORD_CHUNK: usize = 4096;
/// Pore-map entries between progress updates
const ENTRY_CHUNK: usize = 65536;

/// Read a volume file into an [`Image`]
pub fn read_volume<P>(path: P, progress: &mut dyn ProgressAdapter) -> Result<Image>
where
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_volume(BufReader::new(file), progress)
}

/// Read a volume from an in-memory buffer into an [`Image`]
///
/// Same as `read_volume` but operates on a byte slice instead of a file
/// path, for hosts without filesystem access.
pub fn read_volume_from_buffer(
    data: &[u8],
    progress: &mut dyn ProgressAdapter,
) -> Result<Image> {
    decode_volume(Cursor::new(data), progress)
}

/// Write an [`Image`] to a volume file
pub fn write_volume<P>(image: &Image, path: P) -> Result<()>
where
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_volume(image, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write an [`Image`] to an in-memory buffer in the volume format
pub fn write_volume_to_buffer(image: &Image) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_volume(image, &mut buf)?;
    Ok(buf)
}

/// Internal: decode a volume from any `Read` source
fn decode_volume<R: Read>(mut reader: R, progress: &mut dyn ProgressAdapter) -> Result<Image> {
    let _reserved = reader.read_u8()?;
    let width = reader.read_i32::<LittleEndian>()?;
    let height = reader.read_i32::<LittleEndian>()?;
    let depth = reader.read_i32::<LittleEndian>()?;
    let dims = VolumeDims::new(width, height, depth)?;

    let black = reader.read_u32::<LittleEndian>()? as u64;

    let word_count = reader.read_u32::<LittleEndian>()? as usize;
    let expected = dims.word_count();
    if word_count != expected {
        return Err(Error::SizeMismatch {
            expected: expected as u64,
            found: word_count as u64,
        });
    }

    progress.set_range(word_count);
    let words = read_words(&mut reader, word_count, progress, "voxel buffer")?;
    let raw = PackedVolume::from_words(dims, words)?;

    let processed_count = reader.read_u32::<LittleEndian>()? as usize;
    let mut processed = std::collections::BTreeMap::new();
    if processed_count > 0 {
        progress.set_range(processed_count * word_count);
        for i in 0..processed_count {
            let diameter = reader.read_i32::<LittleEndian>()?;
            if !(1..=i8::MAX as i32).contains(&diameter) {
                return Err(Error::Other(format!(
                    "invalid processed-snapshot diameter {}",
                    diameter
                )));
            }
            let mut phase = OffsetProgress {
                inner: &mut *progress,
                offset: i * word_count,
            };
            let label = format!("snapshot d={}", diameter);
            let words = read_words(&mut reader, word_count, &mut phase, &label)?;
            processed.insert(diameter as i8, PackedVolume::from_words(dims, words)?);
        }
    }

    let entry_count = reader.read_u32::<LittleEndian>()? as usize;
    progress.set_range(entry_count);
    let mut entries = Vec::with_capacity(entry_count);
    for i in 0..entry_count {
        let index = reader.read_i32::<LittleEndian>()?;
        let dist_min = reader.read_i8()?;
        let diam_max = reader.read_i8()?;
        let cluster = reader.read_i32::<LittleEndian>()?;
        if index < 0 || index as usize >= dims.voxel_count() {
            return Err(Error::Other(format!(
                "pore-map index {} outside volume of {} voxels",
                index,
                dims.voxel_count()
            )));
        }
        entries.push((
            index as u32,
            PoreVoxel {
                cluster,
                diam_max,
                dist_min,
            },
        ));
        if i % ENTRY_CHUNK == 0 {
            progress.update(i, "pore map");
        }
    }
    progress.update(entry_count, "pore map");

    Ok(Image::from_parts(raw, Some(black), processed, entries))
}

/// Internal: encode an [`Image`] into any `Write` sink
fn encode_volume<W: Write>(image: &Image, writer: &mut W) -> Result<()> {
    let dims = image.dims();
    writer.write_u8(0)?;
    writer.write_i32::<LittleEndian>(dims.width)?;
    writer.write_i32::<LittleEndian>(dims.height)?;
    writer.write_i32::<LittleEndian>(dims.depth)?;
    // The dimension cap bounds voxel counts below 2^31, so this cast is exact
    writer.write_u32::<LittleEndian>(image.black_voxels() as u32)?;

    let words = image.raw().words();
    writer.write_u32::<LittleEndian>(words.len() as u32)?;
    write_words(writer, words)?;

    let processed = image.processed();
    writer.write_u32::<LittleEndian>(processed.len() as u32)?;
    for (&diameter, snapshot) in processed {
        writer.write_i32::<LittleEndian>(diameter as i32)?;
        write_words(writer, snapshot.words())?;
    }

    let entries = image.pore_map().sorted_entries();
    writer.write_u32::<LittleEndian>(entries.len() as u32)?;
    for (index, voxel) in entries {
        writer.write_i32::<LittleEndian>(index as i32)?;
        writer.write_i8(voxel.dist_min)?;
        writer.write_i8(voxel.diam_max)?;
        writer.write_i32::<LittleEndian>(voxel.cluster)?;
    }
    Ok(())
}

fn read_words<R: Read>(
    reader: &mut R,
    count: usize,
    progress: &mut dyn ProgressAdapter,
    label: &str,
) -> Result<Vec<u32>> {
    let mut words = vec![0u32; count];
    let mut done = 0;
    while done < count {
        let take = WORD_CHUNK.min(count - done);
        reader.read_u32_into::<LittleEndian>(&mut words[done..done + take])?;
        done += take;
        progress.update(done, label);
    }
    Ok(words)
}

fn write_words<W: Write>(writer: &mut W, words: &[u32]) -> Result<()> {
    for &word in words {
        writer.write_u32::<LittleEndian>(word)?;
    }
    Ok(())
}

/// Adds a fixed offset to reported steps so multi-buffer phases advance one
/// shared range.
struct OffsetProgress<'a> {
    inner: &'a mut dyn ProgressAdapter,
    offset: usize,
}

impl ProgressAdapter for OffsetProgress<'_> {
    fn set_range(&mut self, steps: usize) {
        self.inner.set_range(steps);
    }

    fn update(&mut self, step: usize, message: &str) {
        self.inner.update(self.offset + step, message);
    }
}
