//! Guard key exchange arithmetic
//!
//! The guard runs a Diffie-Hellman-like exchange over tiny numbers, but its
//! browser client computes everything in double precision: `pow` followed by
//! a floating remainder rounded to 8 significant digits. The guard compares
//! against those exact values, so integer modular exponentiation would desync.

use rand::Rng;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{Result, TreeTvError};

/// Generator used until the guard asks for another one
pub const DEFAULT_GENERATOR: f64 = 2.0;

/// Modulus used until the guard asks for another one
pub const DEFAULT_MODULUS: f64 = 293.0;

/// Private exponents are drawn from `1..=MAX_EXPONENT`
pub const MAX_EXPONENT: u32 = 7;

/// Significant digits kept by [`fmod`]
const PRECISION: usize = 8;

/// Floating remainder `a - floor(a / b) * b`, rounded to 8 significant digits
pub fn fmod(a: f64, b: f64) -> f64 {
    round_significant(a - (a / b).floor() * b, PRECISION)
}

/// `fmod(base ^ exponent, modulus)`, all in double precision
pub fn mod_pow(base: f64, exponent: u32, modulus: f64) -> f64 {
    fmod(base.powf(f64::from(exponent)), modulus)
}

fn round_significant(x: f64, digits: usize) -> f64 {
    if x == 0.0 || !x.is_finite() {
        return x;
    }
    // `{:e}` breaks exact ties to even; the browser rounds them away from zero.
    let x = if is_decimal_tie(x, digits) {
        f64::from_bits(x.to_bits() + 1)
    } else {
        x
    };
    format!("{:.*e}", digits.saturating_sub(1), x)
        .parse()
        .unwrap_or(x)
}

/// Whether `x` lies exactly halfway between two `digits`-significant decimals
fn is_decimal_tie(x: f64, digits: usize) -> bool {
    let exact = format!("{:.60e}", x.abs());
    let mantissa = exact.split('e').next().unwrap_or_default();
    let mut tail = mantissa.chars().filter(char::is_ascii_digit).skip(digits);
    tail.next() == Some('5') && tail.all(|c| c == '0')
}

/// Renders a number the way the gate's browser client writes it into a form
///
/// Integral values have no fractional part, huge and tiny magnitudes use
/// exponent notation with an explicit sign.
///
/// # Example
/// ```
/// use treetv_core::challenge::js_number;
/// assert_eq!(js_number(128.0), "128");
/// assert_eq!(js_number(1.5), "1.5");
/// ```
pub fn js_number(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if x == 0.0 {
        return "0".to_string();
    }

    let magnitude = x.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return format!("{}", x);
    }

    let formatted = format!("{:e}", x);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => formatted,
    }
}

/// Draws a fresh private exponent
pub fn random_exponent() -> u32 {
    rand::thread_rng().gen_range(1..=MAX_EXPONENT)
}

/// Key negotiated with the guard, sent as `skc`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharedKey(f64);

impl SharedKey {
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Wire form of the key
    pub fn to_wire(&self) -> String {
        js_number(self.0)
    }
}

/// Reply to a key submission: `{"g": .., "p": .., "s_key": ..}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GateResponse {
    #[serde(rename = "g", deserialize_with = "loose_number")]
    pub generator: f64,
    #[serde(rename = "p", deserialize_with = "loose_number")]
    pub modulus: f64,
    #[serde(rename = "s_key", deserialize_with = "loose_number")]
    pub server_public_key: f64,
}

impl GateResponse {
    /// Parses the guard's reply
    ///
    /// # Errors
    /// Returns `ProtocolDesync` carrying the raw body if the reply is not the
    /// expected JSON object
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body.trim()).map_err(|_| TreeTvError::ProtocolDesync {
            body: body.to_string(),
        })
    }
}

/// Accepts numbers and numeric strings
fn loose_number<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {}", value)))
}

/// Generator and modulus for the current exchange
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChallengeParams {
    pub generator: f64,
    pub modulus: f64,
}

impl Default for ChallengeParams {
    fn default() -> Self {
        Self {
            generator: DEFAULT_GENERATOR,
            modulus: DEFAULT_MODULUS,
        }
    }
}

impl ChallengeParams {
    /// Public value to submit for `exponent`
    pub fn public_key(&self, exponent: u32) -> f64 {
        mod_pow(self.generator, exponent, self.modulus)
    }

    /// Completes one round of the exchange
    ///
    /// If the guard kept either the generator or the modulus, the shared key
    /// is derived from its public value. Otherwise the guard's parameters are
    /// adopted and no key is produced. A key of zero counts as no key, the
    /// way the guard's client treats it.
    pub fn exchange(&mut self, reply: &GateResponse, exponent: u32) -> Option<SharedKey> {
        if reply.modulus == self.modulus || reply.generator == self.generator {
            let key = mod_pow(reply.server_public_key, exponent, reply.modulus);
            if key == 0.0 || key.is_nan() {
                return None;
            }
            Some(SharedKey(key))
        } else {
            self.generator = reply.generator;
            self.modulus = reply.modulus;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fmod_basic() {
        assert_eq!(fmod(10.0, 3.0), 1.0);
        assert_eq!(fmod(10.5, 3.0), 1.5);
        assert_eq!(fmod(128.0, 293.0), 128.0);
    }

    #[test]
    fn test_fmod_negative_dividend_is_positive() {
        assert_eq!(fmod(-1.0, 293.0), 292.0);
    }

    #[test]
    fn test_fmod_rounds_to_eight_significant_digits() {
        assert_eq!(round_significant(123_456_789.0, 8), 123_456_790.0);
        assert_eq!(round_significant(0.1 + 0.2, 8), 0.3);
        assert_eq!(fmod(7.3, 1.0), 0.3);
    }

    #[test]
    fn test_round_significant_ties_away_from_zero() {
        assert_eq!(round_significant(12_345_678.5, 8), 12_345_679.0);
        assert_eq!(round_significant(-12_345_678.5, 8), -12_345_679.0);
        assert_eq!(round_significant(1_234_567.25, 8), 1_234_567.3);
        assert_eq!(fmod(12_345_678.5, 1e9), 12_345_679.0);
    }

    #[test]
    fn test_round_significant_near_tie_is_not_a_tie() {
        assert!(!is_decimal_tie(1_234_567.2, 8));
        assert!(is_decimal_tie(12_345_678.5, 8));
        assert_eq!(round_significant(12_345_678.4, 8), 12_345_678.0);
    }

    #[test]
    fn test_mod_pow_default_params() {
        let params = ChallengeParams::default();
        let expected = [2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0];
        for (exponent, want) in (1..=7).zip(expected) {
            assert_eq!(params.public_key(exponent), want);
        }
    }

    #[test]
    fn test_mod_pow_wraps() {
        assert_eq!(mod_pow(2.0, 9, 293.0), 219.0);
        assert_eq!(mod_pow(3.0, 7, 307.0), 38.0);
    }

    #[test]
    fn test_js_number() {
        assert_eq!(js_number(128.0), "128");
        assert_eq!(js_number(0.0), "0");
        assert_eq!(js_number(-0.0), "0");
        assert_eq!(js_number(1.5), "1.5");
        assert_eq!(js_number(-219.0), "-219");
        assert_eq!(js_number(1e21), "1e+21");
        assert_eq!(js_number(1e-7), "1e-7");
        assert_eq!(js_number(f64::NAN), "NaN");
    }

    #[test]
    fn test_random_exponent_range() {
        for _ in 0..200 {
            let exponent = random_exponent();
            assert!((1..=MAX_EXPONENT).contains(&exponent));
        }
    }

    #[test]
    fn test_gate_response_parse() {
        let reply = GateResponse::parse(r#"{"g":2,"p":293,"s_key":64}"#).unwrap();
        assert_eq!(reply.generator, 2.0);
        assert_eq!(reply.modulus, 293.0);
        assert_eq!(reply.server_public_key, 64.0);
    }

    #[test]
    fn test_gate_response_parse_numeric_strings() {
        let reply = GateResponse::parse(r#" {"g":"3","p":"307","s_key":"15"} "#).unwrap();
        assert_eq!(reply.generator, 3.0);
        assert_eq!(reply.modulus, 307.0);
        assert_eq!(reply.server_public_key, 15.0);
    }

    #[test]
    fn test_gate_response_parse_failure_keeps_body() {
        let result = GateResponse::parse("<html>blocked</html>");
        match result {
            Err(TreeTvError::ProtocolDesync { body }) => assert_eq!(body, "<html>blocked</html>"),
            _ => panic!("Expected ProtocolDesync error"),
        }
    }

    #[test]
    fn test_gate_response_missing_field_is_desync() {
        let result = GateResponse::parse(r#"{"g":2,"p":293}"#);
        assert!(matches!(result, Err(TreeTvError::ProtocolDesync { .. })));
    }

    #[test]
    fn test_exchange_derives_key_when_params_match() {
        let mut params = ChallengeParams::default();
        let reply = GateResponse {
            generator: 2.0,
            modulus: 293.0,
            server_public_key: 64.0,
        };
        let key = params.exchange(&reply, 2).expect("key derived");
        assert_eq!(key.value(), 287.0); // 64^2 = 4096 = 13 * 293 + 287
        assert_eq!(key.to_wire(), "287");
        assert_eq!(params, ChallengeParams::default());
    }

    #[test]
    fn test_exchange_derives_key_when_only_generator_matches() {
        let mut params = ChallengeParams::default();
        let reply = GateResponse {
            generator: 2.0,
            modulus: 307.0,
            server_public_key: 10.0,
        };
        let key = params.exchange(&reply, 2).expect("key derived");
        assert_eq!(key.value(), 100.0);
        assert_eq!(params, ChallengeParams::default());
    }

    #[test]
    fn test_exchange_resynchronizes_on_new_params() {
        let mut params = ChallengeParams::default();
        let reply = GateResponse {
            generator: 3.0,
            modulus: 307.0,
            server_public_key: 10.0,
        };
        assert_eq!(params.exchange(&reply, 2), None);
        assert_eq!(params.generator, 3.0);
        assert_eq!(params.modulus, 307.0);

        // Next round with the adopted parameters derives a key.
        assert!(params.exchange(&reply, 2).is_some());
    }

    #[test]
    fn test_exchange_zero_key_is_no_key() {
        let mut params = ChallengeParams::default();
        let reply = GateResponse {
            generator: 2.0,
            modulus: 293.0,
            server_public_key: 293.0,
        };
        assert_eq!(params.exchange(&reply, 3), None);
        assert_eq!(params, ChallengeParams::default());
    }

    proptest! {
        #[test]
        fn prop_small_mod_pow_matches_integer_arithmetic(base in 1u64..100, exponent in 1u32..=4, modulus in 2u64..1000) {
            // Quotients stay far below 2^53 / modulus, so the float path is exact.
            let expected = base.pow(exponent) % modulus;
            prop_assert_eq!(mod_pow(base as f64, exponent, modulus as f64), expected as f64);
        }

        #[test]
        fn prop_public_key_is_deterministic(exponent in 1u32..=7, generator in 2u32..50, modulus in 100u32..400) {
            let params = ChallengeParams { generator: f64::from(generator), modulus: f64::from(modulus) };
            prop_assert_eq!(params.public_key(exponent), params.public_key(exponent));
        }
    }
}
