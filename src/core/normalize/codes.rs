//! Clinical code format validation
//!
//! Diagnosis codes follow the ICD-10 shape (letter, two digits, optional
//! dotted extension); procedure codes follow the five-digit CPT shape.
//! Validation is format-only: the pipeline does not carry a terminology
//! server, and an unknown-but-well-formed code is accepted.

use regex::Regex;
use std::sync::OnceLock;

/// Diagnosis codes that count toward the chronic-condition tally
///
/// Heart failure, COPD, chronic kidney disease, type 2 diabetes, chronic
/// ischemic heart disease, essential hypertension, hyperlipidemia.
pub const CHRONIC_DIAGNOSIS_CODES: [&str; 7] =
    ["I50.9", "J44.1", "N18.9", "E11.9", "I25.9", "I10", "E78.5"];

fn diagnosis_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z][0-9]{2}(\.[0-9A-Z]{1,4})?$").expect("static regex"))
}

fn procedure_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{5}$").expect("static regex"))
}

/// Returns true when the code matches the ICD-10 format rule
pub fn is_valid_diagnosis_code(code: &str) -> bool {
    diagnosis_pattern().is_match(code)
}

/// Returns true when the code matches the CPT format rule
pub fn is_valid_procedure_code(code: &str) -> bool {
    procedure_pattern().is_match(code)
}

/// Returns true when the diagnosis code denotes a chronic condition
pub fn is_chronic_code(code: &str) -> bool {
    CHRONIC_DIAGNOSIS_CODES.contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("I50.9", true; "heart failure")]
    #[test_case("I10", true; "no extension")]
    #[test_case("Z51.11", true; "two digit extension")]
    #[test_case("i50.9", false; "lowercase")]
    #[test_case("I5", false; "too short")]
    #[test_case("150.9", false; "leading digit")]
    #[test_case("I50.", false; "dangling dot")]
    fn diagnosis_code_format(code: &str, expected: bool) {
        assert_eq!(is_valid_diagnosis_code(code), expected);
    }

    #[test_case("99213", true; "office visit")]
    #[test_case("36415", true; "venipuncture")]
    #[test_case("9921", false; "four digits")]
    #[test_case("992134", false; "six digits")]
    #[test_case("9921A", false; "letter")]
    fn procedure_code_format(code: &str, expected: bool) {
        assert_eq!(is_valid_procedure_code(code), expected);
    }

    #[test]
    fn test_chronic_codes() {
        assert!(is_chronic_code("I10"));
        assert!(is_chronic_code("E11.9"));
        assert!(!is_chronic_code("M79.3"));
    }
}
