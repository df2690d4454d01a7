use regex::Regex;

use crate::error::Result;

/// Compile a name pattern that must match the whole name.
pub(crate) fn full_match(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{pattern})$"))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_is_anchored() {
        let re = full_match("Stream[0-9]").unwrap();
        assert!(re.is_match("Stream1"));
        assert!(!re.is_match("Stream12"));
        assert!(!re.is_match("MyStream1"));
    }

    #[test]
    fn alternation_stays_anchored() {
        let re = full_match("A|B").unwrap();
        assert!(re.is_match("B"));
        assert!(!re.is_match("AB"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        assert!(full_match("(").is_err());
    }
}
