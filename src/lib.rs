//! # nn_lib
//!
//! nn_lib is a library for reading and writing the chunk based SEGA Ninja
//! ("NN") binary formats used by Sonic the Hedgehog (2006) and other SEGA
//! titles of that era.
//!
//! A Ninja file is a sequence of tagged, sized chunks. Most fields inside a
//! chunk are not stored inline but as byte offsets relative to the file's
//! data base, so decoding is a series of explicit jumps: save the current
//! position, follow the offset, read the addressed data, and restore the
//! position. The codecs in [formats] return fully materialized values with
//! no unresolved offsets left in them.
//!
//! Writing inverts the problem: an offset must be emitted before the data it
//! points at has a position. The [NinjaWriter] in this crate reserves named
//! placeholder slots and back patches them once the dependent content is
//! laid out, which is how the texture list chunk and the surrounding file
//! structure are produced.
//!
//! ## Example
/*!
```no_run
use nn_lib::NinjaNext;

# fn main() -> Result<(), nn_lib::Error> {
let file = NinjaNext::from_file("en_kyzr.xnm")?;
if let Some(motion) = &file.motion {
    println!(
        "{} sub motions over {} frames",
        motion.sub_motions.len(),
        motion.end_frame
    );
}
# Ok(())
# }
```
*/
pub mod formats;

mod export;
mod vectors;

use binread::{
    io::{Cursor, Read, Seek, SeekFrom},
    BinRead, BinReaderExt, NullString,
};
use std::fs;
use std::io::Write;
use std::path::Path;

pub use export::NinjaWriter;
pub use formats::motion::{Keyframe, KeyframeFormat, Motion, SubMotion};
pub use formats::name_list::NodeNameList;
pub use formats::node::Node;
pub use formats::texture::TextureList;
pub use vectors::{Matrix4x4, Vector3, Vector4};

#[cfg(feature = "derive_serde")]
use serde::{Deserialize, Serialize};

/// Errors while reading Ninja files.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    BinRead(#[from] binread::Error),

    /// A stored offset points outside the stream.
    #[error("jump target {offset:#x} is outside the stream of {len:#x} bytes")]
    UnresolvableOffset { offset: u64, len: u64 },

    /// No keyframe record layout matches the sub motion's flag word and
    /// declared record size. The layout of an unrecognized encoding is
    /// unknown, so decoding stops rather than misinterpreting the bytes.
    #[error(
        "unrecognized keyframe encoding: flags {flags:#010x} with record size {keyframe_size}"
    )]
    UnrecognizedKeyframeFormat { flags: u32, keyframe_size: u32 },

    /// The file decoded correctly but does not contain the requested chunk.
    #[error("the file does not contain a {tag} chunk")]
    MissingChunk { tag: &'static str },
}

/// Seeks to `target` after checking it lies within the stream.
pub(crate) fn seek_checked<R: Seek>(reader: &mut R, target: u64) -> Result<(), Error> {
    let len = reader.seek(SeekFrom::End(0))?;
    if target > len {
        return Err(Error::UnresolvableOffset {
            offset: target,
            len,
        });
    }
    reader.seek(SeekFrom::Start(target))?;
    Ok(())
}

/// Follows a stored offset: saves the current position, jumps to
/// `base + offset`, runs `read_data`, and restores the saved position.
///
/// The restore runs on every exit path, so a failed read never leaves the
/// stream desynchronized for the caller.
pub(crate) fn read_at<R, T, F>(
    reader: &mut R,
    base: u64,
    offset: u32,
    read_data: F,
) -> Result<T, Error>
where
    R: Read + Seek,
    F: FnOnce(&mut R) -> Result<T, Error>,
{
    let saved_pos = reader.stream_position()?;

    let result =
        seek_checked(reader, base + u64::from(offset)).and_then(|_| read_data(reader));

    reader.seek(SeekFrom::Start(saved_pos))?;
    result
}

/// Reads a null terminated string at the current position.
pub(crate) fn read_cstring<R: Read + Seek>(reader: &mut R) -> Result<String, Error> {
    let bytes: NullString = reader.read_le()?;
    Ok(String::from_utf8_lossy(&bytes.0).into_owned())
}

/// A chunk tag and the byte length of everything after the size field.
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub tag: [u8; 4],
    pub size: u32,
}

/// The `NXIF` info chunk at the start of every file.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, PartialEq, Eq)]
#[br(magic = b"NXIF")]
pub struct FileHeader {
    pub size: u32,
    pub chunk_count: u32,
    /// The base every stored offset in the file is relative to.
    pub data_offset: u32,
    pub data_size: u32,
    pub offset_table_offset: u32,
    pub offset_table_size: u32,
    pub version: u32,
}

/// A decoded Ninja file.
///
/// Only the chunk types this library understands are decoded. Mesh geometry
/// and effect chunks are skipped by size.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub struct NinjaNext {
    pub header: FileHeader,
    pub texture_list: Option<TextureList>,
    pub node_names: Option<NodeNameList>,
    pub motion: Option<Motion>,
}

impl NinjaNext {
    /// Tries to read a Ninja file from `path`.
    /// The entire file is buffered for performance.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let mut file = Cursor::new(fs::read(path)?);
        Self::read(&mut file)
    }

    /// Tries to read a Ninja file from `reader`.
    /// For best performance when opening from a file, use [NinjaNext::from_file] instead.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, Error> {
        let header: FileHeader = reader.read_le()?;
        let base = u64::from(header.data_offset);
        seek_checked(reader, base)?;

        let mut texture_list = None;
        let mut node_names = None;
        let mut motion = None;

        loop {
            let chunk_start = reader.stream_position()?;
            let chunk: ChunkHeader = reader.read_le()?;
            match &chunk.tag {
                b"NXTL" => texture_list = Some(TextureList::read(reader, base)?),
                b"NXNN" => node_names = Some(NodeNameList::read(reader, base)?),
                b"NXMO" => motion = Some(Motion::read(reader, base)?),
                b"NEND" => break,
                // Everything else, including mesh geometry, is skipped.
                _ => {}
            }
            seek_checked(reader, chunk_start + 8 + u64::from(chunk.size))?;
        }

        Ok(NinjaNext {
            header,
            texture_list,
            node_names,
            motion,
        })
    }
}

macro_rules! ninja_read_impl {
    ($ty:ident, $field:ident, $tag:expr) => {
        impl $ty {
            /// Tries to read the chunk from a complete Ninja file at `path`.
            /// The entire file is buffered for performance.
            pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
                let mut file = Cursor::new(fs::read(path)?);
                Self::read_file(&mut file)
            }

            /// Tries to read the chunk from a complete Ninja file in `reader`.
            /// For best performance when opening from a file, use `from_file` instead.
            pub fn read_file<R: Read + Seek>(reader: &mut R) -> Result<Self, Error> {
                let file = NinjaNext::read(reader)?;
                file.$field.ok_or(Error::MissingChunk { tag: $tag })
            }
        }
    };
}

ninja_read_impl!(TextureList, texture_list, "NXTL");
ninja_read_impl!(NodeNameList, node_names, "NXNN");
ninja_read_impl!(Motion, motion, "NXMO");

impl TextureList {
    /// Writes a complete texture list file to `writer`. `file_name` is the
    /// name recorded in the file's `NFN0` chunk.
    pub fn write_file<W: Write + Seek>(
        &self,
        writer: &mut W,
        file_name: &str,
    ) -> std::io::Result<()> {
        export::write_texture_list_file(writer, self, file_name)
    }

    /// Writes a complete texture list file to `path`.
    /// The entire file is buffered for performance.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file_name = path
            .as_ref()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut file = std::fs::File::create(path)?;
        export::write_buffered(&mut file, |cursor| {
            export::write_texture_list_file(cursor, self, &file_name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formats::texture::{MagFilter, MinFilter, Texture};

    fn hex_bytes(hex: &str) -> Vec<u8> {
        // Remove any whitespace used to make the tests more readable.
        let no_whitespace: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode(no_whitespace).unwrap()
    }

    #[test]
    fn read_at_restores_position() {
        let mut reader = Cursor::new(hex_bytes("04000000 05 07"));
        let offset = reader.read_le::<u32>().unwrap();
        let value = read_at(&mut reader, 1, offset, |reader| {
            reader.read_le::<u8>().map_err(Error::from)
        })
        .unwrap();
        assert_eq!(7u8, value);

        // Make sure the reader position is restored.
        let value = reader.read_le::<u8>().unwrap();
        assert_eq!(5u8, value);
    }

    #[test]
    fn read_at_out_of_bounds() {
        let mut reader = Cursor::new(hex_bytes("0001"));
        let result = read_at(&mut reader, 0, 64, |reader| {
            reader.read_le::<u8>().map_err(Error::from)
        });
        assert!(matches!(
            result,
            Err(Error::UnresolvableOffset { offset: 64, len: 2 })
        ));

        // The failed jump restores the position as well.
        assert_eq!(0, reader.position());
    }

    #[test]
    fn read_chunk_header() {
        let mut reader = Cursor::new(hex_bytes("4E58544C 18000000"));
        let chunk = reader.read_le::<ChunkHeader>().unwrap();
        assert_eq!(b"NXTL", &chunk.tag);
        assert_eq!(0x18, chunk.size);
    }

    #[test]
    fn read_cstring_value() {
        let mut reader = Cursor::new(b"tex00.dds\0tail".to_vec());
        assert_eq!("tex00.dds", read_cstring(&mut reader).unwrap());
    }

    fn example_texture_list() -> TextureList {
        TextureList {
            textures: vec![
                Texture {
                    texture_type: 0,
                    file_name: "en_kyzrS_bd01.dds".to_string(),
                    min_filter: MinFilter::Linear,
                    mag_filter: MagFilter::Linear,
                    global_index: 0,
                    bank: 0,
                },
                Texture {
                    texture_type: 0,
                    file_name: "en_kyzrS_bd02.dds".to_string(),
                    min_filter: MinFilter::LinearMipmapLinear,
                    mag_filter: MagFilter::Nearest,
                    global_index: 1,
                    bank: 0,
                },
            ],
        }
    }

    #[test]
    fn texture_list_file_round_trip() {
        let list = example_texture_list();

        let mut cursor = Cursor::new(Vec::new());
        list.write_file(&mut cursor, "en_kyzr.xnt").unwrap();

        cursor.set_position(0);
        let file = NinjaNext::read(&mut cursor).unwrap();

        assert_eq!(0x20, file.header.data_offset);
        assert_eq!(1, file.header.chunk_count);
        assert_eq!(1, file.header.version);
        assert_ne!(0, file.header.offset_table_offset);
        assert_ne!(0, file.header.offset_table_size);
        assert_eq!(Some(list), file.texture_list);
        assert!(file.node_names.is_none());
        assert!(file.motion.is_none());
    }

    #[test]
    fn texture_list_read_file() {
        let list = example_texture_list();

        let mut cursor = Cursor::new(Vec::new());
        list.write_file(&mut cursor, "en_kyzr.xnt").unwrap();

        cursor.set_position(0);
        assert_eq!(list, TextureList::read_file(&mut cursor).unwrap());
    }

    #[test]
    fn read_file_missing_chunk() {
        let list = TextureList::default();

        let mut cursor = Cursor::new(Vec::new());
        list.write_file(&mut cursor, "empty.xnt").unwrap();

        cursor.set_position(0);
        let result = Motion::read_file(&mut cursor);
        assert!(matches!(result, Err(Error::MissingChunk { tag: "NXMO" })));
    }

    #[test]
    fn read_skips_unknown_chunks() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"NXIF");
        for value in &[0x18u32, 2, 0x20, 0x20, 0, 0, 1] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        // An object chunk this library does not decode.
        bytes.extend_from_slice(b"NXOB");
        bytes.extend_from_slice(&8u32.to_le_bytes());
        bytes.extend_from_slice(&[0xAB; 8]);
        bytes.extend_from_slice(b"NEND");
        bytes.extend_from_slice(&0u32.to_le_bytes());

        let mut reader = Cursor::new(bytes);
        let file = NinjaNext::read(&mut reader).unwrap();
        assert!(file.texture_list.is_none());
        assert!(file.node_names.is_none());
        assert!(file.motion.is_none());
    }

    #[test]
    fn read_truncated_file_fails() {
        // The chunk walk runs off the end before finding a terminator.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"NXIF");
        for value in &[0x18u32, 1, 0x20, 0, 0, 0, 1] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        let mut reader = Cursor::new(bytes);
        assert!(NinjaNext::read(&mut reader).is_err());
    }

    #[test]
    fn read_wrong_magic_fails() {
        let mut reader = Cursor::new(b"JUNKJUNKJUNKJUNK".to_vec());
        assert!(NinjaNext::read(&mut reader).is_err());
    }
}
