/// Canonical textual length of a stable identifier (`8-4-4-4-12`).
pub const STABLE_ID_LEN: usize = 36;

const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];
const SHORT_LABEL_LEN: usize = 8;

/// Returns true when `value` is a canonical lower-case hyphenated identifier.
///
/// Upper-case hex digits are rejected; callers lower-case before asking.
pub fn is_stable_id(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != STABLE_ID_LEN {
        return false;
    }
    bytes.iter().enumerate().all(|(index, byte)| {
        if HYPHEN_POSITIONS.contains(&index) {
            *byte == b'-'
        } else {
            byte.is_ascii_digit() || (b'a'..=b'f').contains(byte)
        }
    })
}

/// Human-facing label for an identifier: the explicit display name when present,
/// else a shortened stable ID, else the identifier itself.
pub fn display_label(identifier: &str, display_name: Option<&str>) -> String {
    if let Some(name) = display_name.map(str::trim).filter(|name| !name.is_empty()) {
        return name.to_string();
    }
    if is_stable_id(identifier) {
        return format!("{}...", &identifier[..SHORT_LABEL_LEN]);
    }
    identifier.to_string()
}
