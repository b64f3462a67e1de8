//! Header sanitisation.
//!
//! Headers arrive as `" Conc. (mg/ml) "` and leave as `conc._(mg/ml)`:
//! trimmed, lowercased, internal whitespace collapsed to underscores.
//! Punctuation survives - it often carries the unit.

/// Sanitizes a single header.
pub fn sanitize_header(name: &str) -> String {
    let clean = name
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");

    if clean.is_empty() {
        "col".to_owned()
    } else {
        clean
    }
}

/// Sanitizes a full header row, suffixing duplicates (`dose`, `dose_1`, ...)
/// so every column stays addressable.
pub fn sanitize_headers(names: &[String]) -> Vec<String> {
    let mut cleaned = Vec::with_capacity(names.len());
    let mut seen = std::collections::HashSet::new();

    for name in names {
        let base = sanitize_header(name);
        let mut candidate = base.clone();
        let mut n = 0;
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{base}_{n}");
        }
        seen.insert(candidate.clone());
        cleaned.push(candidate);
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_header() {
        assert_eq!(sanitize_header(" Conc. (mg/ml) "), "conc._(mg/ml)");
        assert_eq!(sanitize_header("Treatment  Group"), "treatment_group");
        assert_eq!(sanitize_header(""), "col");
        assert_eq!(sanitize_header("   "), "col");
    }

    #[test]
    fn test_duplicate_headers_get_suffixes() {
        let input = vec!["Dose".to_owned(), "dose".to_owned(), "DOSE ".to_owned()];
        assert_eq!(
            sanitize_headers(&input),
            vec!["dose".to_owned(), "dose_1".to_owned(), "dose_2".to_owned()]
        );
    }
}
