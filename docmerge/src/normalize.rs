//! Text canonicalization for fuzzy comparison

/// Canonicalize a string for fuzzy matching
///
/// Lower-cases the input and drops every character that is not alphanumeric,
/// so `"Product Name"`, `"product_name"` and `"PRODUCT-NAME"` all become
/// `"productname"`. Idempotent.
pub fn normalize(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}
