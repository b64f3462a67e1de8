//! Unit/number extraction for measurement strings.
//!
//! Bench data is full of values like `10mg`, `1.5 mg/mL` or `1.2e-3 A.U.`
//! where the number matters and the unit tags along. The extractor splits a
//! leading numeric literal from a trailing unit token. Units are stored
//! as-seen; normalising `mg` vs `MG` vs `milligram` is out of scope.

use regex::Regex;
use std::sync::OnceLock;

/// A numeric value with the unit suffix it was written with, if any.
#[derive(Clone, PartialEq, Debug)]
pub struct UnitValue {
    pub value: f64,
    pub unit: Option<String>,
}

/// Outcome of interpreting a single raw cell.
#[derive(Clone, PartialEq, Debug)]
pub enum CellValue {
    /// Empty string or a "not detected" marker.
    Missing,
    Number(f64),
    /// No numeric prefix; a genuine label such as `Control`.
    Text,
}

// Leading numeric literal with optional sign, decimals and exponent,
// followed by whatever remains (the unit).
fn number_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([-+]?\d*\.?\d+(?:[eE][-+]?\d+)?)\s*(.*)$").expect("static regex")
    })
}

// ND, N.D., nd, n.d. - the usual "not detected" spellings.
fn not_detected() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^n\.?d\.?$").expect("static regex"))
}

/// Returns true for the biological "not detected" markers.
pub fn is_not_detected(token: &str) -> bool {
    not_detected().is_match(token.trim())
}

/// Splits a leading numeric literal from a trailing unit token.
///
/// Returns `None` when the token has no numeric prefix. The fast path is a
/// plain float parse; the regex only runs for mixed text.
pub fn extract(token: &str) -> Option<UnitValue> {
    let s = token.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(value) = s.parse::<f64>() {
        return Some(UnitValue { value, unit: None });
    }

    let caps = number_prefix().captures(s)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().trim())
        .filter(|u| !u.is_empty())
        .map(str::to_owned);
    Some(UnitValue { value, unit })
}

/// Full cell interpretation: missing markers first, then numeric
/// extraction, then plain text.
pub fn interpret_cell(token: &str) -> CellValue {
    let s = token.trim();
    if s.is_empty() || is_not_detected(s) {
        return CellValue::Missing;
    }
    match extract(s) {
        Some(uv) => CellValue::Number(uv.value),
        None => CellValue::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_number() {
        let uv = extract("12.5").unwrap();
        assert!((uv.value - 12.5).abs() < f64::EPSILON);
        assert_eq!(uv.unit, None);
    }

    #[test]
    fn test_unit_suffix() {
        let uv = extract("12.5mg").unwrap();
        assert!((uv.value - 12.5).abs() < f64::EPSILON);
        assert_eq!(uv.unit.as_deref(), Some("mg"));
    }

    #[test]
    fn test_unit_with_space_and_slash() {
        let uv = extract("1.5 mg/mL").unwrap();
        assert!((uv.value - 1.5).abs() < f64::EPSILON);
        assert_eq!(uv.unit.as_deref(), Some("mg/mL"));
    }

    #[test]
    fn test_scientific_notation() {
        let uv = extract("1.2e-3 A.U.").unwrap();
        assert!((uv.value - 0.0012).abs() < 1e-12);
        assert_eq!(uv.unit.as_deref(), Some("A.U."));
    }

    #[test]
    fn test_signs_and_bare_decimal() {
        assert!((extract("-3.5kg").unwrap().value + 3.5).abs() < f64::EPSILON);
        assert!((extract("+.5").unwrap().value - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_numeric_prefix_is_none() {
        assert_eq!(extract("abc"), None);
        assert_eq!(extract("Control"), None);
        assert_eq!(extract(""), None);
    }

    #[test]
    fn test_not_detected_spellings() {
        for s in ["ND", "nd", "N.D.", "n.d.", " N.d. "] {
            assert!(is_not_detected(s), "{s} should read as not-detected");
            assert_eq!(interpret_cell(s), CellValue::Missing);
        }
        assert!(!is_not_detected("NDX"));
    }

    #[test]
    fn test_interpret_cell_variants() {
        assert_eq!(interpret_cell("10mg"), CellValue::Number(10.0));
        assert_eq!(interpret_cell("Control"), CellValue::Text);
        assert_eq!(interpret_cell("  "), CellValue::Missing);
    }
}
