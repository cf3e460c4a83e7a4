/// Container identifier normalization and validation
///
/// Canonical ids look like `C-7QX2`: the `C-` prefix followed by exactly
/// four characters from `0-9A-Z`. Anything typed by the user or read from a
/// QR code goes through [`normalize`] and [`validate`] before it reaches a store.

use rand::Rng;

/// Prefix every canonical id starts with
pub const ID_PREFIX: &str = "C-";

/// Total length of a canonical id (prefix included)
pub const ID_LENGTH: usize = 6;

const ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Why an id was rejected. The messages are shown to the user verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("Container ID is required")]
    EmptyId,
    #[error("Container ID must start with \"C-\"")]
    BadPrefix,
    #[error("Container ID must be exactly 6 characters (C-XXXX)")]
    BadLength,
    #[error("Container ID must follow format C-XXXX (4 characters: 0-9 and A-Z only)")]
    BadCharset,
}

/// Uppercase and trim a raw id
pub fn normalize(raw: &str) -> String {
    raw.to_uppercase().trim().to_string()
}

/// Check an already-normalized id.
///
/// Checks run empty, prefix, length, charset in that order; each later
/// check assumes the earlier ones passed.
pub fn validate(canonical: &str) -> Result<(), IdError> {
    if canonical.is_empty() {
        return Err(IdError::EmptyId);
    }
    if !canonical.starts_with(ID_PREFIX) {
        return Err(IdError::BadPrefix);
    }
    if canonical.chars().count() != ID_LENGTH {
        return Err(IdError::BadLength);
    }
    let body = &canonical[ID_PREFIX.len()..];
    if !body.bytes().all(|b| ID_ALPHABET.contains(&b)) {
        return Err(IdError::BadCharset);
    }
    Ok(())
}

/// Normalize then validate, returning the canonical id
pub fn parse(raw: &str) -> Result<String, IdError> {
    let canonical = normalize(raw);
    validate(&canonical)?;
    Ok(canonical)
}

/// The error a form should display for `raw`, if any
pub fn container_id_error(raw: &str) -> Option<IdError> {
    parse(raw).err()
}

/// Random canonical id. Not guaranteed unique; callers retry against the store.
pub fn generate() -> String {
    let mut rng = rand::rng();
    let body: String = (0..ID_LENGTH - ID_PREFIX.len())
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{}{}", ID_PREFIX, body)
}
