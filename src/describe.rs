//! Reflection replacement (DESIGN NOTES §9): user types hand-write a small
//! "describe" capability instead of the source's runtime field-walking reflection.
//! Canonical ids and pretty-printed "details" strings are defined purely in terms of
//! the descriptors this module produces.

/// One non-pointer field of a described value, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDetail {
    pub name: String,
    pub type_name: String,
    pub value: String,
}

impl FieldDetail {
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value: value.into(),
        }
    }

    /// Convenience constructor for a field whose value is printed via `Debug`.
    pub fn debug(
        name: impl Into<String>,
        type_name: impl Into<String>,
        value: &impl std::fmt::Debug,
    ) -> Self {
        Self::new(name, type_name, format!("{value:?}"))
    }
}

/// Implemented by user-defined state, event-payload, and machine-payload types.
///
/// `describe` must yield an ordered list of non-pointer field descriptors. Pointer
/// (reference/handle) fields are deliberately omitted: the canonical id
/// (`store::canonical_id`) is computed from details strings alone, so skipping
/// pointer fields here is what keeps two worlds that differ only in pointer-held
/// payload comparing equal (spec.md §4.1).
pub trait Describe {
    fn describe(&self) -> Vec<FieldDetail>;
}

impl Describe for () {
    fn describe(&self) -> Vec<FieldDetail> {
        Vec::new()
    }
}

/// Renders a field list as `{Name:<field>,Type:<type>,Value:<value>}` tuples joined
/// by commas, or the sentinel `"no fields"` when empty (spec.md §6).
pub fn details_string(fields: &[FieldDetail]) -> String {
    if fields.is_empty() {
        return "no fields".to_string();
    }
    fields
        .iter()
        .map(|f| format!("{{Name:{},Type:{},Value:{}}}", f.name, f.type_name, f.value))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_render_sentinel() {
        assert_eq!(details_string(&[]), "no fields");
    }

    #[test]
    fn fields_render_as_tuples() {
        let fields = vec![FieldDetail::new("count", "i64", "3")];
        assert_eq!(details_string(&fields), "{Name:count,Type:i64,Value:3}");
    }
}
