//! Page identifier type.

use std::fmt;

/// Identifies a page within one file.
///
/// Page 0 is always the file superblock; in an index file page 1 holds the
/// index metadata and every later page is a tree node.
///
/// # Example
/// ```
/// use intindex::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert_eq!(PageId::decode(PageId::encode(None)), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Sentinel written on disk for "no page" (an absent right sibling, an
    /// unused child slot).
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Check if this page ID is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// On-disk form of an optional page reference.
    #[inline]
    pub fn encode(page: Option<PageId>) -> u32 {
        page.unwrap_or(Self::INVALID).0
    }

    /// Inverse of [`PageId::encode`].
    #[inline]
    pub fn decode(raw: u32) -> Option<PageId> {
        let page = PageId(raw);
        page.is_valid().then_some(page)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}
