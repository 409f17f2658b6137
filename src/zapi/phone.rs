/// Strips every character that is not an ASCII digit.
///
/// The vendor expects the bare international number, e.g. `5511987654321`.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}
