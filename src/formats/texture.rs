//! Texture lists (`NXTL` chunks).
//!
//! The chunk stores a fixed size record table and an out of line string pool
//! for the file names, both addressed by offsets relative to the file's data
//! base. Table order is significant: other chunks reference textures by
//! their index in this list.

use crate::export::NinjaWriter;
use crate::{read_at, read_cstring, Error};
use binread::{
    io::{Read, Seek},
    BinRead, BinReaderExt,
};
use std::io::Write;

#[cfg(feature = "derive_serde")]
use serde::{Deserialize, Serialize};

/// Filtering for sample footprints larger than a pixel (minification).
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[br(repr(u16))]
pub enum MinFilter {
    Nearest = 0,
    Linear = 1,
    NearestMipmapNearest = 2,
    NearestMipmapLinear = 3,
    LinearMipmapNearest = 4,
    LinearMipmapLinear = 5,
}

/// Filtering for sample footprints smaller than a pixel (magnification).
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[br(repr(u16))]
pub enum MagFilter {
    Nearest = 0,
    Linear = 1,
}

// The on disk record. The name is stored out of line at name_offset.
#[derive(BinRead, Debug)]
struct TextureEntry {
    texture_type: u32,
    name_offset: u32,
    min_filter: MinFilter,
    mag_filter: MagFilter,
    global_index: u32,
    bank: u32,
}

/// One texture reference.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub texture_type: u32,
    pub file_name: String,
    pub min_filter: MinFilter,
    pub mag_filter: MagFilter,
    pub global_index: u32,
    pub bank: u32,
}

/// The decoded texture list. Insertion order matches the on disk table.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextureList {
    pub textures: Vec<Texture>,
}

impl TextureList {
    /// Reads the texture list from a stream positioned at the chunk's offset
    /// cell, just after the chunk tag and size. Offsets inside the chunk are
    /// relative to `base`.
    ///
    /// The stream is restored to the position just after the 4 byte offset
    /// cell before returning.
    pub fn read<R: Read + Seek>(reader: &mut R, base: u64) -> Result<Self, Error> {
        let data_offset = reader.read_le::<u32>()?;
        let textures = read_at(reader, base, data_offset, |reader| {
            let count = reader.read_le::<u32>()?;
            let table_offset = reader.read_le::<u32>()?;
            read_at(reader, base, table_offset, |reader| {
                (0..count)
                    .map(|_| {
                        let entry: TextureEntry = reader.read_le()?;
                        let file_name = read_at(reader, base, entry.name_offset, read_cstring)?;
                        Ok(Texture {
                            texture_type: entry.texture_type,
                            file_name,
                            min_filter: entry.min_filter,
                            mag_filter: entry.mag_filter,
                            global_index: entry.global_index,
                            bank: entry.bank,
                        })
                    })
                    .collect()
            })
        })?;
        Ok(TextureList { textures })
    }

    /// Writes the chunk, offsets relative to the writer's base.
    ///
    /// The record table and the chunk's own size depend on positions that
    /// are only known once the variable length string pool is laid out, so
    /// the writer reserves named placeholder slots up front and patches them
    /// as the positions become known.
    pub fn write<W: Write + Seek>(&self, writer: &mut NinjaWriter<W>) -> std::io::Result<()> {
        let chunk_start = writer.begin_chunk(b"NXTL")?;
        writer.add_offset("data")?;
        writer.align(16)?;

        // Record table. Each file name slot is patched once the string pool
        // position is known.
        let table_offset = writer.relative_position()?;
        for (i, texture) in self.textures.iter().enumerate() {
            writer.write_u32(texture.texture_type)?;
            writer.add_offset(&format!("name{}", i))?;
            writer.write_u16(texture.min_filter as u16)?;
            writer.write_u16(texture.mag_filter as u16)?;
            writer.write_u32(texture.global_index)?;
            writer.write_u32(texture.bank)?;
        }

        // The cell the chunk's first offset points at.
        writer.fill_offset("data")?;
        writer.write_u32(self.textures.len() as u32)?;
        writer.mark_offset()?;
        writer.write_u32(table_offset)?;

        // String pool.
        for (i, texture) in self.textures.iter().enumerate() {
            writer.fill_offset(&format!("name{}", i))?;
            writer.write_cstring(&texture.file_name)?;
        }

        writer.align(16)?;
        writer.end_chunk(chunk_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binread::io::{Cursor, SeekFrom};

    fn linear_texture(file_name: &str) -> Texture {
        Texture {
            texture_type: 0,
            file_name: file_name.to_string(),
            min_filter: MinFilter::Linear,
            mag_filter: MagFilter::Linear,
            global_index: 0,
            bank: 0,
        }
    }

    fn write_chunk(list: &TextureList) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = NinjaWriter::new(&mut cursor);
        list.write(&mut writer).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn write_single_texture_layout() {
        let list = TextureList {
            textures: vec![linear_texture("tex00.dds")],
        };
        let bytes = write_chunk(&list);

        // tag(4) size(4) dataOffset(4) pad(4) record(20) count(4)
        // tableOffset(4) name(10) pad(10)
        assert_eq!(64, bytes.len());
        assert_eq!(b"NXTL", &bytes[0..4]);
        assert_eq!(56u32.to_le_bytes(), bytes[4..8]);
        // The data offset points at the count/table cell after the table.
        assert_eq!(36u32.to_le_bytes(), bytes[8..12]);
        assert_eq!([0u8; 4], bytes[12..16]);
        // Record: type, name offset, filters, global index, bank.
        assert_eq!(0u32.to_le_bytes(), bytes[16..20]);
        assert_eq!(44u32.to_le_bytes(), bytes[20..24]);
        assert_eq!(1u16.to_le_bytes(), bytes[24..26]);
        assert_eq!(1u16.to_le_bytes(), bytes[26..28]);
        assert_eq!(0u32.to_le_bytes(), bytes[28..32]);
        assert_eq!(0u32.to_le_bytes(), bytes[32..36]);
        // Cell: count then the table offset.
        assert_eq!(1u32.to_le_bytes(), bytes[36..40]);
        assert_eq!(16u32.to_le_bytes(), bytes[40..44]);
        assert_eq!(b"tex00.dds\0", &bytes[44..54]);
        assert_eq!([0u8; 10], bytes[54..64]);
    }

    #[test]
    fn single_texture_round_trip() {
        let list = TextureList {
            textures: vec![linear_texture("tex00.dds")],
        };
        let bytes = write_chunk(&list);

        let mut reader = Cursor::new(bytes);
        reader.seek(SeekFrom::Start(8)).unwrap();
        let decoded = TextureList::read(&mut reader, 0).unwrap();
        assert_eq!(list, decoded);

        // The reader is left just after the offset cell.
        assert_eq!(12, reader.position());
    }

    #[test]
    fn many_textures_round_trip() {
        let list = TextureList {
            textures: vec![
                linear_texture("en_kyzrS_bd01.dds"),
                Texture {
                    texture_type: 1,
                    file_name: "en_kyzrS_bd02.dds".to_string(),
                    min_filter: MinFilter::LinearMipmapLinear,
                    mag_filter: MagFilter::Nearest,
                    global_index: 7,
                    bank: 2,
                },
                linear_texture("en_kyzrS_fc01.dds"),
            ],
        };
        let bytes = write_chunk(&list);
        assert_eq!(0, bytes.len() % 16);

        let mut reader = Cursor::new(bytes);
        reader.seek(SeekFrom::Start(8)).unwrap();
        let decoded = TextureList::read(&mut reader, 0).unwrap();
        assert_eq!(list, decoded);
    }

    #[test]
    fn empty_list_round_trip() {
        let list = TextureList::default();
        let bytes = write_chunk(&list);

        // tag(4) size(4) dataOffset(4) pad(4) empty table, cell(8) pad(8)
        assert_eq!(32, bytes.len());
        assert_eq!(24u32.to_le_bytes(), bytes[4..8]);
        assert_eq!(0u32.to_le_bytes(), bytes[16..20]);

        let mut reader = Cursor::new(bytes);
        reader.seek(SeekFrom::Start(8)).unwrap();
        let decoded = TextureList::read(&mut reader, 0).unwrap();
        assert!(decoded.textures.is_empty());
    }

    #[test]
    fn read_with_nonzero_base() {
        let list = TextureList {
            textures: vec![linear_texture("tex00.dds")],
        };

        // Lay the chunk out past a 32 byte header as in a complete file.
        let mut cursor = Cursor::new(vec![0u8; 32]);
        cursor.seek(SeekFrom::Start(32)).unwrap();
        let mut writer = NinjaWriter::new(&mut cursor);
        writer.set_base().unwrap();
        list.write(&mut writer).unwrap();
        let bytes = cursor.into_inner();

        let mut reader = Cursor::new(bytes);
        reader.seek(SeekFrom::Start(40)).unwrap();
        let decoded = TextureList::read(&mut reader, 32).unwrap();
        assert_eq!(list, decoded);
        assert_eq!(44, reader.position());
    }

    #[test]
    fn read_unresolvable_offset() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x4000u32.to_le_bytes());

        let mut reader = Cursor::new(bytes);
        let result = TextureList::read(&mut reader, 0);
        assert!(matches!(result, Err(Error::UnresolvableOffset { .. })));
        // The failed jump does not leak a position change.
        assert_eq!(4, reader.position());
    }
}
