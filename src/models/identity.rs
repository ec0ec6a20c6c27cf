//! User identity: canonical ids derived from display names.

/// Canonical user id: display name lowercased with non-alphanumerics stripped.
/// Equality everywhere in the crate is on this form; original-case display
/// strings are carried separately.
pub type UserId = String;

/// Canonicalize a display name into a [`UserId`].
///
/// "Alice Wonder!" and "alicewonder" map to the same id. Names made entirely
/// of punctuation canonicalize to the empty string, which no component
/// accepts as a participant.
pub fn to_user_id(name: &str) -> UserId {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
