//! The write side of the container.
//!
//! Offsets in a Ninja file are stored relative to the data base and are not
//! known until the content they point at has been laid out. [NinjaWriter]
//! therefore reserves named placeholder slots, emits the dependent content,
//! and back patches each slot once the real position is known. The
//! placeholder table lives only for one write pass; every reserved slot must
//! be filled exactly once.

use std::collections::HashMap;
use std::io::{Cursor, Seek, SeekFrom, Write};

use crate::formats::texture::TextureList;

fn round_up(value: u64, n: u64) -> u64 {
    // Find the next largest multiple of n.
    ((value + n - 1) / n) * n
}

/// A positioned writer with base relative offset patching.
pub struct NinjaWriter<W: Write + Seek> {
    inner: W,
    base: u64,
    pending: HashMap<String, u64>,
    offset_positions: Vec<u64>,
}

impl<W: Write + Seek> NinjaWriter<W> {
    /// Wraps `inner` with the offset base at position 0.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            base: 0,
            pending: HashMap::new(),
            offset_positions: Vec::new(),
        }
    }

    /// Records the current position as the base all offsets are relative to.
    pub fn set_base(&mut self) -> std::io::Result<u64> {
        let pos = self.inner.stream_position()?;
        self.base = pos;
        Ok(pos)
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn stream_position(&mut self) -> std::io::Result<u64> {
        self.inner.stream_position()
    }

    pub fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.inner.seek(pos)
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(bytes)
    }

    pub fn write_u16(&mut self, value: u16) -> std::io::Result<()> {
        self.inner.write_all(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> std::io::Result<()> {
        self.inner.write_all(&value.to_le_bytes())
    }

    /// Writes `text` followed by a null terminator.
    pub fn write_cstring(&mut self, text: &str) -> std::io::Result<()> {
        self.inner.write_all(text.as_bytes())?;
        self.inner.write_all(&[0u8])
    }

    /// The current position relative to the base, as stored on disk.
    pub fn relative_position(&mut self) -> std::io::Result<u32> {
        let pos = self.inner.stream_position()?;
        Ok((pos - self.base) as u32)
    }

    /// Reserves a named 4 byte offset slot at the current position.
    pub fn add_offset(&mut self, name: &str) -> std::io::Result<()> {
        if self.pending.contains_key(name) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("offset {:?} is already pending", name),
            ));
        }
        let pos = self.inner.stream_position()?;
        self.pending.insert(name.to_string(), pos);
        self.offset_positions.push(pos);
        self.write_u32(0)
    }

    /// Registers the next 4 bytes as an offset slot without reserving a
    /// placeholder, for offsets whose value is already known when written.
    pub fn mark_offset(&mut self) -> std::io::Result<()> {
        let pos = self.inner.stream_position()?;
        self.offset_positions.push(pos);
        Ok(())
    }

    /// Fills the named slot with the current position relative to the base
    /// and consumes it. The stream position is unchanged.
    pub fn fill_offset(&mut self, name: &str) -> std::io::Result<()> {
        let slot = self.pending.remove(name).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("no pending offset named {:?}", name),
            )
        })?;
        let pos = self.inner.stream_position()?;
        let value = (pos - self.base) as u32;
        self.inner.seek(SeekFrom::Start(slot))?;
        self.write_u32(value)?;
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Zero fills up to the next multiple of `alignment`.
    pub fn align(&mut self, alignment: u64) -> std::io::Result<()> {
        let pos = self.inner.stream_position()?;
        let aligned = round_up(pos, alignment);
        self.inner.write_all(&vec![0u8; (aligned - pos) as usize])?;
        Ok(())
    }

    /// Writes the chunk tag and a placeholder size field. Returns the
    /// position just after the size field for [NinjaWriter::end_chunk].
    pub fn begin_chunk(&mut self, tag: &[u8; 4]) -> std::io::Result<u64> {
        self.inner.write_all(tag)?;
        self.write_u32(0)?;
        self.inner.stream_position()
    }

    /// Back patches the chunk size: the byte length from just after the size
    /// field to the current position.
    pub fn end_chunk(&mut self, chunk_start: u64) -> std::io::Result<()> {
        let end = self.inner.stream_position()?;
        let size = (end - chunk_start) as u32;
        self.inner.seek(SeekFrom::Start(chunk_start - 4))?;
        self.write_u32(size)?;
        self.inner.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    /// Every offset slot reserved or marked so far, in emission order.
    pub fn offset_positions(&self) -> &[u64] {
        &self.offset_positions
    }

    /// Names reserved but not yet filled.
    pub fn pending_offsets(&self) -> impl Iterator<Item = &str> {
        self.pending.keys().map(|name| name.as_str())
    }
}

/// Writes a complete texture list file: info header, `NXTL` chunk, offset
/// table, original file name, and terminator, then back patches the info
/// header fields.
pub(crate) fn write_texture_list_file<W: Write + Seek>(
    writer: &mut W,
    texture_list: &TextureList,
    file_name: &str,
) -> std::io::Result<()> {
    let mut writer = NinjaWriter::new(writer);

    // Info chunk. The counts and sizes are patched once the rest of the
    // file is laid out.
    writer.write_all(b"NXIF")?;
    writer.write_u32(0x18)?;
    let info_fields = writer.stream_position()?;
    writer.write_u32(0)?; // chunk count
    writer.write_u32(0)?; // data offset
    writer.write_u32(0)?; // data size
    writer.write_u32(0)?; // offset table offset
    writer.write_u32(0)?; // offset table size
    writer.write_u32(1)?; // version
    let base = writer.set_base()?;

    texture_list.write(&mut writer)?;

    if let Some(name) = writer.pending_offsets().next() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("offset {:?} was reserved but never filled", name),
        ));
    }

    // Offset table chunk: the position of every offset slot, base relative,
    // so the data can be relocated without reparsing it.
    let offset_table_start = writer.stream_position()?;
    let offsets: Vec<u64> = writer.offset_positions().to_vec();
    let chunk_start = writer.begin_chunk(b"NOF0")?;
    writer.write_u32(offsets.len() as u32)?;
    writer.write_u32(0)?;
    for offset in offsets {
        writer.write_u32((offset - base) as u32)?;
    }
    writer.align(16)?;
    writer.end_chunk(chunk_start)?;
    let offset_table_end = writer.stream_position()?;

    // Original file name chunk.
    let chunk_start = writer.begin_chunk(b"NFN0")?;
    writer.write_u32(0)?;
    writer.write_u32(0)?;
    writer.write_cstring(file_name)?;
    writer.align(16)?;
    writer.end_chunk(chunk_start)?;

    // Terminator chunk.
    let chunk_start = writer.begin_chunk(b"NEND")?;
    writer.align(16)?;
    writer.end_chunk(chunk_start)?;
    let end = writer.stream_position()?;

    writer.seek(SeekFrom::Start(info_fields))?;
    writer.write_u32(1)?; // one data chunk
    writer.write_u32(base as u32)?;
    writer.write_u32((offset_table_start - base) as u32)?;
    writer.write_u32(offset_table_start as u32)?;
    writer.write_u32((offset_table_end - offset_table_start) as u32)?;
    writer.seek(SeekFrom::Start(end))?;
    Ok(())
}

/// Buffers the entire write operation into memory to avoid the flushes the
/// back patching seeks would otherwise cause.
pub(crate) fn write_buffered<W: Write + Seek, F: Fn(&mut Cursor<Vec<u8>>) -> std::io::Result<()>>(
    writer: &mut W,
    write_data: F,
) -> std::io::Result<()> {
    let mut cursor = Cursor::new(Vec::new());
    write_data(&mut cursor)?;

    writer.write_all(cursor.get_mut())?;
    Ok(())
}
