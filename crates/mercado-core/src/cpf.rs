//! # CPF Validation
//!
//! The CPF (Cadastro de Pessoas Físicas) is the 11-digit Brazilian taxpayer
//! number. The last two digits are check digits computed from the first nine.
//!
//! ## Check Digit Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CPF 529.982.247-25                                                     │
//! │                                                                         │
//! │  digits   5  2  9  9  8  2  2  4  7                                     │
//! │  weights 10  9  8  7  6  5  4  3  2      sum = 295                      │
//! │  dv1 = (295 × 10) mod 11 = 2             (10 collapses to 0)            │
//! │                                                                         │
//! │  digits   5  2  9  9  8  2  2  4  7  2                                  │
//! │  weights 11 10  9  8  7  6  5  4  3  2   sum = 347                      │
//! │  dv2 = (347 × 10) mod 11 = 5                                            │
//! │                                                                         │
//! │  valid iff dv1 == 2 and dv2 == 5                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sequences of one repeated digit (`111.111.111-11`) satisfy the arithmetic
//! but are rejected.

use crate::error::ValidationError;

/// Number of digits in a CPF.
pub const CPF_LEN: usize = 11;

/// Keeps only the ASCII digits of `input`.
///
/// ```rust
/// use mercado_core::cpf::normalize;
///
/// assert_eq!(normalize("529.982.247-25"), "52998224725");
/// ```
pub fn normalize(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Computes one check digit over `digits` with weights `len+1 .. 2`.
fn check_digit(digits: &[u8]) -> u8 {
    let top = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .zip((2..=top).rev())
        .map(|(d, w)| u32::from(*d) * w)
        .sum();
    let d = (sum * 10) % 11;
    if d >= 10 {
        0
    } else {
        d as u8
    }
}

/// Returns `true` when `input` is a CPF with valid check digits.
///
/// Punctuation is ignored. Never panics: anything that is not 11 digits
/// after normalization is simply invalid.
///
/// ```rust
/// use mercado_core::cpf::validate;
///
/// assert!(validate("529.982.247-25"));
/// assert!(!validate("529.982.247-26"));
/// assert!(!validate("111.111.111-11"));
/// assert!(!validate("123"));
/// ```
pub fn validate(input: &str) -> bool {
    let digits: Vec<u8> = input
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| d as u8)
        .collect();

    if digits.len() != CPF_LEN {
        return false;
    }
    if digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    check_digit(&digits[..9]) == digits[9] && check_digit(&digits[..10]) == digits[10]
}

/// Validates and normalizes in one step, for write paths.
///
/// ## Returns
/// The 11-digit canonical form, or `ValidationError::InvalidFormat`.
pub fn parse(input: &str) -> Result<String, ValidationError> {
    let digits = normalize(input);
    if digits.is_empty() {
        return Err(ValidationError::Required {
            field: "cpf".to_string(),
        });
    }
    if !validate(&digits) {
        return Err(ValidationError::invalid("cpf", "not a valid CPF"));
    }
    Ok(digits)
}

/// Formats a CPF as `000.000.000-00`.
///
/// Input that does not normalize to 11 digits is returned unchanged.
pub fn format(input: &str) -> String {
    let d = normalize(input);
    if d.len() != CPF_LEN {
        return input.to_string();
    }
    format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11])
}

/// Appends both check digits to a 9-digit base.
///
/// Used by the seeder and by tests to produce valid numbers.
pub fn with_check_digits(base: [u8; 9]) -> String {
    let mut digits = base.to_vec();
    digits.push(check_digit(&digits));
    digits.push(check_digit(&digits));
    digits.iter().map(|d| char::from(b'0' + d)).collect()
}
