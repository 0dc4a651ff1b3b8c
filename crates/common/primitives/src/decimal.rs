//! Canonical decimal string encoding for 256-bit integers.
//!
//! Every [`U256`] that crosses the snapshot boundary is written as a base-10 string with no
//! prefix, sign or leading whitespace. Hex strings are rejected on input so a snapshot file
//! has exactly one textual form per value.

use std::{collections::BTreeMap, fmt};

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Deserializer, Serializer};

/// Parses a canonical decimal string into a [`U256`].
pub fn parse(s: &str) -> Result<U256, DecimalError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecimalError(s.to_string()));
    }
    U256::from_str_radix(s, 10).map_err(|_| DecimalError(s.to_string()))
}

/// A string that is not a canonical decimal 256-bit integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecimalError(String);

impl fmt::Display for DecimalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid decimal integer: {:?}", self.0)
    }
}

impl std::error::Error for DecimalError {}

/// `#[serde(with = "decimal::u256")]` for a single value.
pub mod u256 {
    use serde::de::Error as _;

    use super::*;

    /// Serializes `value` as a decimal string.
    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    /// Deserializes a decimal string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(D::Error::custom)
    }
}

/// `#[serde(with = "decimal::u256_seq")]` for a sequence of values.
pub mod u256_seq {
    use serde::de::Error as _;

    use super::*;

    /// Serializes `values` as a sequence of decimal strings.
    pub fn serialize<S: Serializer>(values: &[U256], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(ToString::to_string))
    }

    /// Deserializes a sequence of decimal strings.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<U256>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| parse(s).map_err(D::Error::custom))
            .collect()
    }
}

/// `#[serde(with = "decimal::u256_table")]` for a key to sequence table.
pub mod u256_table {
    use serde::de::Error as _;

    use super::*;

    /// Serializes `table` as an object of address to decimal string arrays.
    pub fn serialize<S: Serializer>(
        table: &BTreeMap<Address, Vec<U256>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            table
                .iter()
                .map(|(key, values)| (key, values.iter().map(ToString::to_string).collect::<Vec<_>>())),
        )
    }

    /// Deserializes an object of address to decimal string arrays.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Address, Vec<U256>>, D::Error> {
        BTreeMap::<Address, Vec<String>>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, values)| {
                let parsed = values
                    .iter()
                    .map(|s| parse(s).map_err(D::Error::custom))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((key, parsed))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde::Serialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "u256")]
        value: U256,
        #[serde(with = "u256_seq")]
        values: Vec<U256>,
    }

    #[rstest]
    #[case("0", U256::ZERO)]
    #[case("42", U256::from(42u64))]
    #[case(
        "115792089237316195423570985008687907853269984665640564039457584007913129639935",
        U256::MAX
    )]
    fn parse_valid(#[case] input: &str, #[case] expected: U256) {
        assert_eq!(parse(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("0x2a")]
    #[case("-1")]
    #[case(" 1")]
    #[case("1e18")]
    #[case("115792089237316195423570985008687907853269984665640564039457584007913129639936")]
    fn parse_rejects_non_canonical(#[case] input: &str) {
        assert!(parse(input).is_err());
    }

    #[test]
    fn large_values_are_written_as_decimal_strings() {
        let wrapper = Wrapper {
            value: U256::from(10u64).pow(U256::from(30u64)),
            values: vec![U256::from(1u64), U256::ZERO],
        };
        let json = serde_json::to_string(&wrapper).unwrap();
        assert_eq!(
            json,
            r#"{"value":"1000000000000000000000000000000","values":["1","0"]}"#
        );
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back, wrapper);
    }

    #[test]
    fn numbers_are_not_accepted_in_place_of_strings() {
        let err = serde_json::from_str::<Wrapper>(r#"{"value":1,"values":[]}"#);
        assert!(err.is_err());
    }
}
