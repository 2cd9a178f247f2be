//! Generic structural diff over an ordered field list
//!
//! Heterogeneous sensor entities expose their identity-relevant fields as an
//! ordered (name, rendered value) list; one generic function compares any
//! two of the same kind. No virtual dispatch, no per-type diff code.

/// Capability: render the fields that define this entity's structure, in a
/// stable order.
pub trait OrderedFields {
    fn ordered_fields(&self) -> Vec<(&'static str, String)>;
}

/// One differing field between two entities of the same kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiff {
    /// Field name as reported by `ordered_fields`
    pub field: &'static str,
    /// Rendered left-hand value
    pub left: String,
    /// Rendered right-hand value
    pub right: String,
}

impl std::fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.left, self.right)
    }
}

/// Compare two entities field by field, in `ordered_fields` order.
///
/// Fields present on one side only (trailing fields of the longer list) are
/// reported with an empty opposite value.
pub fn diff<T: OrderedFields>(left: &T, right: &T) -> Vec<FieldDiff> {
    let lhs = left.ordered_fields();
    let rhs = right.ordered_fields();
    let mut out = Vec::new();

    let common = lhs.len().min(rhs.len());
    for i in 0..common {
        if lhs[i].1 != rhs[i].1 {
            out.push(FieldDiff {
                field: lhs[i].0,
                left: lhs[i].1.clone(),
                right: rhs[i].1.clone(),
            });
        }
    }
    for (field, value) in lhs.iter().skip(common) {
        out.push(FieldDiff {
            field,
            left: value.clone(),
            right: String::new(),
        });
    }
    for (field, value) in rhs.iter().skip(common) {
        out.push(FieldDiff {
            field,
            left: String::new(),
            right: value.clone(),
        });
    }
    out
}

/// Structural equality via the ordered field list.
pub fn fields_equal<T: OrderedFields>(left: &T, right: &T) -> bool {
    left.ordered_fields() == right.ordered_fields()
}
