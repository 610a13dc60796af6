use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const DIGITS: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const BASE: usize = DIGITS.len();

/// Densely insertable sort key.
///
/// A key is a base-62 digit string read as the fraction `0.d1d2d3...`. Keys
/// never end in `0`, so byte-wise comparison of the strings matches numeric
/// comparison of the fractions and there is always room below any key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderKey(String);

impl OrderKey {
    pub fn parse(raw: &str) -> Result<Self, OrderKeyError> {
        if raw.is_empty() {
            return Err(OrderKeyError::Empty);
        }
        if let Some(invalid) = raw.chars().find(|ch| !ch.is_ascii_alphanumeric()) {
            return Err(OrderKeyError::InvalidDigit {
                key: raw.to_string(),
                digit: invalid,
            });
        }
        if raw.ends_with('0') {
            return Err(OrderKeyError::TrailingZero(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a key strictly between `lower` and `upper`. A missing bound
    /// stands for the open end of the key space.
    pub fn between(
        lower: Option<&OrderKey>,
        upper: Option<&OrderKey>,
    ) -> Result<OrderKey, OrderKeyError> {
        if let (Some(lower), Some(upper)) = (lower, upper) {
            if lower >= upper {
                return Err(OrderKeyError::NotAscending {
                    lower: lower.0.clone(),
                    upper: upper.0.clone(),
                });
            }
        }

        let lower_digits = lower.map_or(&[][..], |key| key.0.as_bytes());
        let upper_digits = upper.map(|key| key.0.as_bytes());
        Ok(OrderKey(midpoint(lower_digits, upper_digits)))
    }

    pub fn before(key: Option<&OrderKey>) -> OrderKey {
        OrderKey(midpoint(&[], key.map(|key| key.0.as_bytes())))
    }

    pub fn after(key: Option<&OrderKey>) -> OrderKey {
        OrderKey(midpoint(key.map_or(&[][..], |key| key.0.as_bytes()), None))
    }

    /// Key that lands at `index` once inserted into `keys` (ascending).
    /// Indexes past the end append.
    pub fn for_index(keys: &[OrderKey], index: usize) -> Result<OrderKey, OrderKeyError> {
        let index = index.min(keys.len());
        let lower = index.checked_sub(1).and_then(|position| keys.get(position));
        let upper = keys.get(index);
        OrderKey::between(lower, upper)
    }

    pub fn compare(a: &OrderKey, b: &OrderKey) -> Ordering {
        a.0.as_bytes().cmp(b.0.as_bytes())
    }
}

/// Missing keys sort after every present key.
pub fn compare_optional(a: Option<&OrderKey>, b: Option<&OrderKey>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => OrderKey::compare(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn digit_value(byte: u8) -> usize {
    match byte {
        b'0'..=b'9' => usize::from(byte - b'0'),
        b'A'..=b'Z' => usize::from(byte - b'A') + 10,
        b'a'..=b'z' => usize::from(byte - b'a') + 36,
        _ => 0,
    }
}

// `lower` < `upper`; neither ends in '0'; `None` upper means 1.
fn midpoint(lower: &[u8], upper: Option<&[u8]>) -> String {
    if let Some(upper) = upper {
        let mut shared = 0;
        while shared < upper.len() && lower.get(shared).copied().unwrap_or(b'0') == upper[shared] {
            shared += 1;
        }
        if shared > 0 {
            let mut key: String = upper[..shared].iter().map(|byte| char::from(*byte)).collect();
            key.push_str(&midpoint(
                lower.get(shared..).unwrap_or(&[]),
                Some(&upper[shared..]),
            ));
            return key;
        }
    }

    let lower_digit = lower.first().map_or(0, |byte| digit_value(*byte));
    let upper_digit = upper
        .and_then(|digits| digits.first())
        .map_or(BASE, |byte| digit_value(*byte));

    if upper_digit - lower_digit > 1 {
        let mid = (lower_digit + upper_digit + 1) / 2;
        return char::from(DIGITS[mid]).to_string();
    }

    match upper {
        Some(digits) if digits.len() > 1 => char::from(digits[0]).to_string(),
        _ => {
            let mut key = char::from(DIGITS[lower_digit]).to_string();
            key.push_str(&midpoint(lower.get(1..).unwrap_or(&[]), None));
            key
        }
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OrderKey {
    type Err = OrderKeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        OrderKey::parse(value)
    }
}

impl TryFrom<String> for OrderKey {
    type Error = OrderKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        OrderKey::parse(&value)
    }
}

impl From<OrderKey> for String {
    fn from(value: OrderKey) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderKeyError {
    Empty,
    InvalidDigit { key: String, digit: char },
    TrailingZero(String),
    NotAscending { lower: String, upper: String },
}

impl fmt::Display for OrderKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKeyError::Empty => write!(f, "order key cannot be empty"),
            OrderKeyError::InvalidDigit { key, digit } => {
                write!(f, "order key '{}' contains invalid digit '{}'", key, digit)
            }
            OrderKeyError::TrailingZero(key) => {
                write!(f, "order key '{}' must not end in '0'", key)
            }
            OrderKeyError::NotAscending { lower, upper } => write!(
                f,
                "cannot place a key between '{}' and '{}': bounds are not ascending",
                lower, upper
            ),
        }
    }
}

impl Error for OrderKeyError {}
