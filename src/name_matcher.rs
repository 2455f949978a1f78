//! Naming convention shared with the upstream producers: a 3 to 5 letter
//! prefix immediately followed by `__`, e.g. `abc__report.csv`.

const MIN_BASE_LEN: usize = 5;
const PREFIX_LENGTHS: std::ops::RangeInclusive<usize> = 3..=5;

/// Returns true if `file_name` should be picked up for upload.
pub fn matches(file_name: &str) -> bool {
    let base = strip_extension(file_name).as_bytes();

    if base.len() < MIN_BASE_LEN {
        return false;
    }

    PREFIX_LENGTHS
        .take_while(|&len| len + 2 <= base.len())
        .any(|len| base[..len].iter().all(u8::is_ascii_alphabetic) && &base[len..len + 2] == b"__")
}

// A leading dot is part of the name, not an extension separator.
fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_each_prefix_length() {
        assert!(matches("abc__report.csv"));
        assert!(matches("abcd__report.csv"));
        assert!(matches("ABCDE__report.csv"));
        assert!(matches("AbC__x"));
    }

    #[test]
    fn rejects_short_or_non_alphabetic_prefix() {
        assert!(!matches("ab__x.csv"));
        assert!(!matches("12c__x.csv"));
        assert!(!matches("a1c__x.csv"));
        assert!(!matches("x__a.csv"));
    }

    #[test]
    fn six_letter_run_does_not_match() {
        // `abcdef` has no `__` at offset 3, 4 or 5
        assert!(!matches("abcdef__x.csv"));
        assert!(matches("abcde__x.csv"));
    }

    #[test]
    fn base_name_shorter_than_five_is_rejected() {
        assert!(!matches("abc_.csv"));
        assert!(!matches("ab__.csv"));
        assert!(!matches(".csv"));
        assert!(!matches(""));
    }

    #[test]
    fn only_final_extension_is_stripped() {
        assert!(matches("abc__data.tar.gz"));
        assert!(matches("abc__"));
        // stripping ".x" leaves "abc_" which is too short
        assert!(!matches("abc_.x"));
    }

    #[test]
    fn separator_must_follow_prefix_directly() {
        assert!(!matches("abc_x_report.csv"));
        assert!(!matches("abc-__report.csv"));
        assert!(!matches("report_abc__.csv"));
    }

    #[test]
    fn non_ascii_letters_do_not_count() {
        assert!(!matches("äbc__report.csv"));
        assert!(!matches("отч__report.csv"));
    }
}
