use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    #[default]
    Life,
    Work,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Life, Category::Work];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Life => "life",
            Category::Work => "work",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "life" | "personal" => Ok(Category::Life),
            "work" => Ok(Category::Work),
            _ => Err(ParseCategoryError {
                value: value.to_string(),
            }),
        }
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Category::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCategoryError {
    value: String,
}

impl fmt::Display for ParseCategoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid category '{}': expected one of {}",
            self.value,
            Category::ALL
                .iter()
                .map(|category| category.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl Error for ParseCategoryError {}

/// Parse a stored category column.
///
/// Backward compat: rows written before categories existed are life tasks.
pub fn parse_category(raw: Option<&str>) -> Result<Category, ParseCategoryError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Category::default()),
        Some(value) => Category::from_str(value),
    }
}
