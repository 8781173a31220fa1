//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Once;

use intindex::{
    BTreeIndex, Datatype, IndexConfig, Operator, PageId, RecordId, RecordScan, Relation, Result,
};
use tempfile::TempDir;

static INIT: Once = Once::new();

/// Initialize tracing for test binaries. Safe to call multiple times.
pub fn init_tracing() {
    INIT.call_once(|| {
        use tracing_subscriber::filter::EnvFilter;
        use tracing_subscriber::fmt;
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .init();
    });
}

/// In-memory relation whose records are `i32` values padded with a
/// four-byte tag, so the key can sit at offset 0 or 4.
pub struct MemRelation {
    name: String,
    records: Vec<(RecordId, Vec<u8>)>,
}

impl MemRelation {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            records: Vec::new(),
        }
    }

    /// Relation holding `keys` at offset 0, one record per key.
    pub fn with_keys<I: IntoIterator<Item = i32>>(name: &str, keys: I) -> Self {
        let mut rel = Self::new(name);
        for key in keys {
            let mut record = key.to_le_bytes().to_vec();
            record.extend_from_slice(&(!key).to_le_bytes());
            rel.push(record);
        }
        rel
    }

    pub fn push(&mut self, record: Vec<u8>) -> RecordId {
        let rid = rid_for(self.records.len());
        self.records.push((rid, record));
        rid
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn rids(&self) -> Vec<RecordId> {
        self.records.iter().map(|(rid, _)| *rid).collect()
    }
}

/// Locator assigned to the `n`th record of a [`MemRelation`].
pub fn rid_for(n: usize) -> RecordId {
    RecordId::new(PageId::new(1 + (n / 100) as u32), (n % 100) as u16)
}

impl Relation for MemRelation {
    fn name(&self) -> &str {
        &self.name
    }

    fn scan(&self) -> Result<Box<dyn RecordScan + '_>> {
        Ok(Box::new(MemScan {
            records: &self.records,
            pos: None,
        }))
    }
}

struct MemScan<'a> {
    records: &'a [(RecordId, Vec<u8>)],
    pos: Option<usize>,
}

impl RecordScan for MemScan<'_> {
    fn scan_next(&mut self) -> Result<Option<RecordId>> {
        let next = self.pos.map_or(0, |p| p + 1);
        self.pos = Some(next);
        Ok(self.records.get(next).map(|(rid, _)| *rid))
    }

    fn record(&self) -> Result<&[u8]> {
        self.pos
            .and_then(|p| self.records.get(p))
            .map(|(_, bytes)| bytes.as_slice())
            .ok_or(intindex::Error::ScanNotInitialized)
    }
}

/// Config in a fresh temp dir with small nodes so splits happen early.
pub fn small_config(leaf: usize, internal: usize) -> (IndexConfig, TempDir) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = IndexConfig::new(dir.path())
        .with_pool_size(16)
        .with_leaf_capacity(leaf)
        .with_internal_capacity(internal);
    (config, dir)
}

/// Run a full scan and collect the record ids.
pub fn scan_rids(
    index: &mut BTreeIndex,
    low: i32,
    low_op: Operator,
    high: i32,
    high_op: Operator,
) -> Result<Vec<RecordId>> {
    index.start_scan(low, low_op, high, high_op)?;
    let mut out = Vec::new();
    while let Some(rid) = index.scan_next()? {
        out.push(rid);
    }
    index.end_scan()?;
    Ok(out)
}

/// Every key in leaf order, read through the sibling chain.
pub fn leaf_keys(index: &BTreeIndex) -> Vec<i32> {
    index
        .leaf_page_ids()
        .unwrap()
        .into_iter()
        .flat_map(|pid| index.read_leaf(pid).unwrap().keys().collect::<Vec<_>>())
        .collect()
}

/// Open (or build) the index over `rel` at offset 0.
pub fn open_index(config: IndexConfig, rel: &MemRelation) -> BTreeIndex {
    BTreeIndex::open_or_create(config, rel, 0, Datatype::Integer).unwrap()
}
