//! Index metadata page.
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       5     PageHeader (type = Meta)
//! 5       20    relation name, NUL-terminated
//! 25      4     attribute byte offset
//! 29      1     attribute type tag
//! 30      4     root page id
//! 34      2     leaf capacity
//! 36      2     internal capacity
//! ```

use crate::common::config::{MIN_NODE_CAPACITY, RELATION_NAME_LEN};
use crate::common::{Datatype, Error, PageId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

use super::node::{read_u16, read_u32, write_u16, write_u32, InternalNode, LeafNode};

/// The metadata page always follows the superblock.
pub(crate) const META_PAGE_ID: PageId = PageId(1);

const OFFSET_NAME: usize = PageHeader::SIZE;
const OFFSET_ATTR_OFFSET: usize = OFFSET_NAME + RELATION_NAME_LEN;
const OFFSET_ATTR_TYPE: usize = OFFSET_ATTR_OFFSET + 4;
const OFFSET_ROOT: usize = OFFSET_ATTR_TYPE + 1;
const OFFSET_LEAF_CAPACITY: usize = OFFSET_ROOT + 4;
const OFFSET_INTERNAL_CAPACITY: usize = OFFSET_LEAF_CAPACITY + 2;

/// Descriptor of the indexed attribute plus the mutable root pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IndexMeta {
    pub relation_name: String,
    pub attr_byte_offset: u32,
    pub attr_type: Datatype,
    pub root_page_id: PageId,
    pub leaf_capacity: usize,
    pub internal_capacity: usize,
}

impl IndexMeta {
    pub fn new(
        relation_name: &str,
        attr_byte_offset: u32,
        attr_type: Datatype,
        leaf_capacity: usize,
        internal_capacity: usize,
    ) -> Result<Self> {
        if relation_name.is_empty()
            || relation_name.len() >= RELATION_NAME_LEN
            || relation_name.contains('\0')
        {
            return Err(Error::InvalidRelationName(relation_name.to_string()));
        }
        Ok(Self {
            relation_name: relation_name.to_string(),
            attr_byte_offset,
            attr_type,
            root_page_id: PageId::INVALID,
            leaf_capacity,
            internal_capacity,
        })
    }

    /// Whether this index was built for the given attribute.
    pub fn describes(
        &self,
        relation_name: &str,
        attr_byte_offset: u32,
        attr_type: Datatype,
    ) -> bool {
        self.relation_name == relation_name
            && self.attr_byte_offset == attr_byte_offset
            && self.attr_type == attr_type
    }

    pub fn decode(page: &Page) -> Result<Self> {
        let corrupt = |reason| Error::Corrupt {
            page: META_PAGE_ID.0,
            reason,
        };
        if page.page_type() != PageType::Meta {
            return Err(corrupt("expected the metadata page"));
        }
        let data = page.as_slice();

        let name_field = &data[OFFSET_NAME..OFFSET_NAME + RELATION_NAME_LEN];
        let name_len = name_field
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| corrupt("relation name is not terminated"))?;
        let relation_name = std::str::from_utf8(&name_field[..name_len])
            .map_err(|_| corrupt("relation name is not UTF-8"))?
            .to_string();

        let attr_type = Datatype::from_u8(data[OFFSET_ATTR_TYPE])
            .ok_or_else(|| corrupt("unknown attribute type"))?;
        let root_page_id = PageId::decode(read_u32(data, OFFSET_ROOT))
            .ok_or_else(|| corrupt("missing root page"))?;

        let leaf_capacity = read_u16(data, OFFSET_LEAF_CAPACITY) as usize;
        let internal_capacity = read_u16(data, OFFSET_INTERNAL_CAPACITY) as usize;
        if !(MIN_NODE_CAPACITY..=LeafNode::MAX_CAPACITY).contains(&leaf_capacity)
            || !(MIN_NODE_CAPACITY..=InternalNode::MAX_CAPACITY).contains(&internal_capacity)
        {
            return Err(corrupt("node capacity out of range"));
        }

        Ok(Self {
            relation_name,
            attr_byte_offset: read_u32(data, OFFSET_ATTR_OFFSET),
            attr_type,
            root_page_id,
            leaf_capacity,
            internal_capacity,
        })
    }

    pub fn encode(&self, page: &mut Page) {
        page.set_page_type(PageType::Meta);
        let data = page.as_mut_slice();

        let name_field = &mut data[OFFSET_NAME..OFFSET_NAME + RELATION_NAME_LEN];
        name_field.fill(0);
        name_field[..self.relation_name.len()].copy_from_slice(self.relation_name.as_bytes());

        write_u32(data, OFFSET_ATTR_OFFSET, self.attr_byte_offset);
        data[OFFSET_ATTR_TYPE] = self.attr_type as u8;
        write_u32(data, OFFSET_ROOT, PageId::encode(Some(self.root_page_id)));
        write_u16(data, OFFSET_LEAF_CAPACITY, self.leaf_capacity as u16);
        write_u16(data, OFFSET_INTERNAL_CAPACITY, self.internal_capacity as u16);
    }
}
