//! Object nodes and the index-linked hierarchy they form.
//!
//! Node records are stored as one flat array. Parent, child, and sibling
//! relations are signed indices into that array rather than pointers, with
//! `-1` marking the end of a chain. The first child and next sibling links
//! encode an entire forest: [child_index](Node::child_index) points at a
//! node's first child and [sibling_index](Node::sibling_index) chains the
//! remaining children of the same parent.
//!
//! Decoding performs no index validation. Use [validate_hierarchy] before
//! traversing untrusted data.

use crate::{Matrix4x4, Vector3};
use binread::{
    io::{Read, Seek},
    BinRead, BinReaderExt,
};
use thiserror::Error;

#[cfg(feature = "derive_serde")]
use serde::{Deserialize, Serialize};

/// A single node record.
///
/// The display name is not part of the record. Names come from the
/// [NodeNameList](crate::formats::name_list::NodeNameList) decoded elsewhere
/// in the file, where the i-th entry names the i-th node.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(BinRead, Debug, Clone, PartialEq)]
pub struct Node {
    /// Bitmask of NND_NODETYPE flags.
    pub node_type: u32,
    pub matrix_index: i16,
    /// The index of the parent node or `-1` if this node is a root.
    pub parent_index: i16,
    /// The index of the first child node or `-1` if there are no children.
    pub child_index: i16,
    /// The index of the next sibling under the same parent or `-1` at the end of the chain.
    pub sibling_index: i16,
    pub translation: Vector3,
    pub rotation: Vector3,
    pub scaling: Vector3,
    pub inv_init_matrix: Matrix4x4,
    pub center: Vector3,
    pub radius: f32,
    pub user_flags: u32,
    pub bounding_box: Vector3,
}

/// Reads `count` node records stored back to back at the current position.
pub fn read_nodes<R: Read + Seek>(reader: &mut R, count: usize) -> Result<Vec<Node>, crate::Error> {
    (0..count)
        .map(|_| reader.read_le::<Node>().map_err(crate::Error::from))
        .collect()
}

/// Errors from [validate_hierarchy].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("node {node}: {link} index {index} is outside the node array of length {len}")]
    IndexOutOfRange {
        node: usize,
        link: &'static str,
        index: i16,
        len: usize,
    },

    #[error("node {node} is reachable more than once (cycle or shared subtree)")]
    Cycle { node: usize },

    #[error("node {node} is not reachable from any root")]
    Unreachable { node: usize },
}

/// The indices of all root nodes, in array order.
pub fn root_indices(nodes: &[Node]) -> Vec<usize> {
    nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.parent_index < 0)
        .map(|(index, _)| index)
        .collect()
}

/// Checks that every link index is in bounds and that the child and sibling
/// links form a forest reaching each node exactly once.
pub fn validate_hierarchy(nodes: &[Node]) -> Result<(), HierarchyError> {
    let len = nodes.len();
    for (index, node) in nodes.iter().enumerate() {
        let links = [
            ("parent", node.parent_index),
            ("child", node.child_index),
            ("sibling", node.sibling_index),
        ];
        for &(link, value) in &links {
            if value < -1 || value as i64 >= len as i64 {
                return Err(HierarchyError::IndexOutOfRange {
                    node: index,
                    link,
                    index: value,
                    len,
                });
            }
        }
    }

    let mut visited = vec![false; len];
    for root in root_indices(nodes) {
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            if visited[index] {
                return Err(HierarchyError::Cycle { node: index });
            }
            visited[index] = true;

            let node = &nodes[index];
            // Root nodes are enumerated directly, so their sibling links are
            // not part of the subtree walk.
            if index != root && node.sibling_index >= 0 {
                stack.push(node.sibling_index as usize);
            }
            if node.child_index >= 0 {
                stack.push(node.child_index as usize);
            }
        }
    }

    if let Some(node) = visited.iter().position(|&v| !v) {
        return Err(HierarchyError::Unreachable { node });
    }
    Ok(())
}

/// Returns a preorder depth-first traversal over the subtree rooted at `root`.
///
/// Children are visited before siblings. Indices outside the array are
/// skipped and already visited nodes are not yielded twice, so iteration
/// terminates even for malformed link chains. [validate_hierarchy] reports
/// such chains as errors.
pub fn depth_first(nodes: &[Node], root: usize) -> DepthFirst<'_> {
    let mut stack = Vec::new();
    if root < nodes.len() {
        stack.push(root);
    }
    DepthFirst {
        nodes,
        root,
        stack,
        visited: vec![false; nodes.len()],
    }
}

/// Iterator returned by [depth_first].
pub struct DepthFirst<'a> {
    nodes: &'a [Node],
    root: usize,
    stack: Vec<usize>,
    visited: Vec<bool>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            let index = self.stack.pop()?;
            if self.visited[index] {
                continue;
            }
            self.visited[index] = true;

            let child = self.nodes[index].child_index;
            let sibling = self.nodes[index].sibling_index;
            // The sibling goes on the stack first so the child is visited
            // before it. The root's own siblings are outside the subtree.
            if index != self.root {
                self.push_link(sibling);
            }
            self.push_link(child);

            return Some(index);
        }
    }
}

impl<'a> DepthFirst<'a> {
    fn push_link(&mut self, link: i16) {
        if link >= 0 && (link as usize) < self.nodes.len() {
            self.stack.push(link as usize);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binread::io::Cursor;

    fn node_bytes(node_type: u32, indices: [i16; 4]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&node_type.to_le_bytes());
        for index in &indices {
            bytes.extend_from_slice(&index.to_le_bytes());
        }
        // translation, rotation, scaling
        for value in &[1.0f32, 2.0, 3.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        // inverse initial matrix (identity)
        for row in &Matrix4x4::identity().to_rows_array() {
            for value in row {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        // center, radius
        for value in &[0.0f32, 0.5, 0.0, 2.5] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        // user flags
        bytes.extend_from_slice(&7u32.to_le_bytes());
        // bounding box
        for value in &[4.0f32, 5.0, 6.0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    fn linked(parent: i16, child: i16, sibling: i16) -> Node {
        Node {
            node_type: 0,
            matrix_index: -1,
            parent_index: parent,
            child_index: child,
            sibling_index: sibling,
            translation: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scaling: Vector3::new(1.0, 1.0, 1.0),
            inv_init_matrix: Matrix4x4::identity(),
            center: Vector3::new(0.0, 0.0, 0.0),
            radius: 0.0,
            user_flags: 0,
            bounding_box: Vector3::new(0.0, 0.0, 0.0),
        }
    }

    #[test]
    fn read_node_record() {
        let bytes = node_bytes(3, [0, -1, 1, -1]);
        assert_eq!(144, bytes.len());

        let mut reader = Cursor::new(bytes);
        let node = reader.read_le::<Node>().unwrap();
        assert_eq!(3, node.node_type);
        assert_eq!(0, node.matrix_index);
        assert_eq!(-1, node.parent_index);
        assert_eq!(1, node.child_index);
        assert_eq!(-1, node.sibling_index);
        assert_eq!(Vector3::new(1.0, 2.0, 3.0), node.translation);
        assert_eq!(Vector3::new(1.0, 1.0, 1.0), node.scaling);
        assert_eq!(Matrix4x4::identity(), node.inv_init_matrix);
        assert_eq!(2.5, node.radius);
        assert_eq!(7, node.user_flags);
        assert_eq!(Vector3::new(4.0, 5.0, 6.0), node.bounding_box);
    }

    #[test]
    fn read_nodes_truncated() {
        let mut bytes = node_bytes(0, [-1, -1, -1, -1]);
        bytes.truncate(100);

        let mut reader = Cursor::new(bytes);
        assert!(read_nodes(&mut reader, 1).is_err());
    }

    #[test]
    fn depth_first_child_before_sibling() {
        // 0
        // ├── 1
        // └── 2
        //     └── 3
        let nodes = vec![
            linked(-1, 1, -1),
            linked(0, -1, 2),
            linked(0, 3, -1),
            linked(2, -1, -1),
        ];
        let order: Vec<_> = depth_first(&nodes, 0).collect();
        assert_eq!(vec![0, 1, 2, 3], order);
    }

    #[test]
    fn depth_first_ignores_root_sibling() {
        let nodes = vec![linked(-1, -1, 1), linked(-1, -1, -1)];
        let order: Vec<_> = depth_first(&nodes, 0).collect();
        assert_eq!(vec![0], order);
    }

    #[test]
    fn depth_first_terminates_on_sibling_cycle() {
        let nodes = vec![linked(-1, 1, -1), linked(0, -1, 1)];
        let order: Vec<_> = depth_first(&nodes, 0).collect();
        assert_eq!(vec![0, 1], order);
    }

    #[test]
    fn root_indices_multiple_roots() {
        let nodes = vec![linked(-1, -1, -1), linked(-1, -1, -1), linked(0, -1, -1)];
        assert_eq!(vec![0, 1], root_indices(&nodes));
    }

    #[test]
    fn validate_ok() {
        let nodes = vec![
            linked(-1, 1, -1),
            linked(0, -1, 2),
            linked(0, 3, -1),
            linked(2, -1, -1),
        ];
        assert_eq!(Ok(()), validate_hierarchy(&nodes));
    }

    #[test]
    fn validate_index_out_of_range() {
        let nodes = vec![linked(-1, 5, -1)];
        assert_eq!(
            Err(HierarchyError::IndexOutOfRange {
                node: 0,
                link: "child",
                index: 5,
                len: 1,
            }),
            validate_hierarchy(&nodes)
        );
    }

    #[test]
    fn validate_sibling_cycle() {
        let nodes = vec![linked(-1, 1, -1), linked(0, -1, 1)];
        assert_eq!(
            Err(HierarchyError::Cycle { node: 1 }),
            validate_hierarchy(&nodes)
        );
    }

    #[test]
    fn validate_unreachable() {
        // Node 1 claims node 0 as its parent, but node 0 has no children.
        let nodes = vec![linked(-1, -1, -1), linked(0, -1, -1)];
        assert_eq!(
            Err(HierarchyError::Unreachable { node: 1 }),
            validate_hierarchy(&nodes)
        );
    }
}
