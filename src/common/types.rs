//! Attribute types and scan operators.

/// Type tag of the indexed attribute, persisted in the metadata page.
///
/// Only [`Datatype::Integer`] attributes can be indexed; the other tags exist
/// so a descriptor read from disk always decodes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    Integer = 0,
    Double = 1,
    String = 2,
}

impl Datatype {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Datatype::Integer),
            1 => Some(Datatype::Double),
            2 => Some(Datatype::String),
            _ => None,
        }
    }
}

/// Comparison operator bounding one end of a range scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Greater than or equal.
    Gte,
    /// Greater than.
    Gt,
}

impl Operator {
    /// Whether this operator can bound the low end of a scan.
    #[inline]
    pub fn is_lower_bound(self) -> bool {
        matches!(self, Operator::Gt | Operator::Gte)
    }

    /// Whether this operator can bound the high end of a scan.
    #[inline]
    pub fn is_upper_bound(self) -> bool {
        matches!(self, Operator::Lt | Operator::Lte)
    }

    /// Evaluate `key <op> bound`.
    #[inline]
    pub fn matches(self, key: i32, bound: i32) -> bool {
        match self {
            Operator::Lt => key < bound,
            Operator::Lte => key <= bound,
            Operator::Gte => key >= bound,
            Operator::Gt => key > bound,
        }
    }
}
