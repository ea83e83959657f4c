//! Node name lists (`NXNN` chunks).
//!
//! Node records do not own their display names. This chunk stores them
//! separately as a table of (node index, name offset) pairs over a string
//! pool, in the same cell/table/pool shape as the texture list.

use crate::{read_at, read_cstring, Error};
use binread::{
    io::{Read, Seek},
    BinReaderExt,
};

#[cfg(feature = "derive_serde")]
use serde::{Deserialize, Serialize};

/// The display name for one node.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct NodeName {
    pub node_index: u32,
    pub name: String,
}

/// The decoded node name list.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct NodeNameList {
    /// Nonzero when the table is sorted by name rather than node index.
    pub sort_type: u32,
    pub names: Vec<NodeName>,
}

impl NodeNameList {
    /// Reads the name list from a stream positioned at the chunk's offset
    /// cell. Offsets inside the chunk are relative to `base`.
    pub fn read<R: Read + Seek>(reader: &mut R, base: u64) -> Result<Self, Error> {
        let data_offset = reader.read_le::<u32>()?;
        read_at(reader, base, data_offset, |reader| {
            let sort_type = reader.read_le::<u32>()?;
            let count = reader.read_le::<u32>()?;
            let table_offset = reader.read_le::<u32>()?;
            let names = read_at(reader, base, table_offset, |reader| {
                (0..count)
                    .map(|_| {
                        let node_index = reader.read_le::<u32>()?;
                        let name_offset = reader.read_le::<u32>()?;
                        let name = read_at(reader, base, name_offset, read_cstring)?;
                        Ok(NodeName { node_index, name })
                    })
                    .collect()
            })?;
            Ok(NodeNameList { sort_type, names })
        })
    }

    /// Looks up the name for a node index.
    pub fn name_of(&self, node_index: u32) -> Option<&str> {
        self.names
            .iter()
            .find(|entry| entry.node_index == node_index)
            .map(|entry| entry.name.as_str())
    }
}
