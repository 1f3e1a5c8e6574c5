//! Core category domain types.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::Error;

/// The opaque, unique identifier of a category.
///
/// IDs are usually chosen by the client (e.g. `"food-001"`), otherwise the
/// store generates a UUID.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CategoryId(String);

impl CategoryId {
    /// Create a category ID.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidField] if `id` is empty or just whitespace.
    pub fn new(id: &str) -> Result<Self, Error> {
        let id = id.trim();

        if id.is_empty() {
            Err(Error::InvalidField {
                field: "id",
                reason: "category ID cannot be empty".to_owned(),
            })
        } else {
            Ok(Self(id.to_owned()))
        }
    }

    /// Create a new random category ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a category ID without validation.
    ///
    /// The caller should ensure that the string is not empty.
    pub(crate) fn new_unchecked(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl AsRef<str> for CategoryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CategoryId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryId::new(s)
    }
}

impl TryFrom<String> for CategoryId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CategoryId::new(&value)
    }
}

impl From<CategoryId> for String {
    fn from(value: CategoryId) -> Self {
        value.0
    }
}

impl Display for CategoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated, non-empty category name.
///
/// Names are case-sensitive: "Food" and "food" are different categories.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidField] if `name` is an empty string.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::InvalidField {
                field: "name",
                reason: "category name cannot be empty".to_owned(),
            })
        } else {
            Ok(Self(name.to_owned()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the non-empty
    /// invariant is violated it will cause incorrect behaviour but not affect memory safety.
    pub(crate) fn new_unchecked(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CategoryName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryName::new(s)
    }
}

impl TryFrom<String> for CategoryName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CategoryName::new(&value)
    }
}

impl From<CategoryName> for String {
    fn from(value: CategoryName) -> Self {
        value.0
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A display colour in the form `#RRGGBB`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(String);

impl HexColor {
    /// Create a colour from a `#RRGGBB` string, hex digits may be upper or lower case.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidField] if `color` is not a `#` followed by
    /// exactly six hex digits.
    pub fn new(color: &str) -> Result<Self, Error> {
        let color = color.trim();
        let is_valid = color.len() == 7
            && color.starts_with('#')
            && color[1..].chars().all(|c| c.is_ascii_hexdigit());

        if is_valid {
            Ok(Self(color.to_owned()))
        } else {
            Err(Error::InvalidField {
                field: "color",
                reason: format!("\"{color}\" is not a hex colour of the form #RRGGBB"),
            })
        }
    }

    pub(crate) fn new_unchecked(color: &str) -> Self {
        Self(color.to_owned())
    }
}

impl AsRef<str> for HexColor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for HexColor {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        HexColor::new(&value)
    }
}

impl From<HexColor> for String {
    fn from(value: HexColor) -> Self {
        value.0
    }
}

/// A category for grouping transactions (e.g., 'Food & Dining', 'Transport').
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// The unique ID of the category.
    pub id: CategoryId,
    /// The unique name of the category.
    pub name: CategoryName,
    /// The colour used when displaying the category.
    pub color: Option<HexColor>,
    /// An icon identifier used when displaying the category.
    pub icon: Option<String>,
    /// When the category was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The fields needed to create a [Category].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewCategory {
    /// The ID to store the category under, a random ID is generated if `None`.
    #[serde(default)]
    pub id: Option<CategoryId>,
    /// The name of the category.
    pub name: CategoryName,
    /// The display colour of the category.
    #[serde(default)]
    pub color: Option<HexColor>,
    /// The icon identifier of the category.
    #[serde(default)]
    pub icon: Option<String>,
}

impl NewCategory {
    /// Start a new category with just a name.
    pub fn new(name: CategoryName) -> Self {
        Self {
            id: None,
            name,
            color: None,
            icon: None,
        }
    }

    /// Set the ID for the category.
    pub fn id(mut self, id: CategoryId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the colour for the category.
    pub fn color(mut self, color: HexColor) -> Self {
        self.color = Some(color);
        self
    }

    /// Set the icon for the category.
    pub fn icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_owned());
        self
    }
}

/// A partial update of a [Category], only the fields that are `Some` change.
///
/// `color` and `icon` are nullable, so `Some(None)` clears them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CategoryUpdate {
    /// The new name.
    #[serde(default)]
    pub name: Option<CategoryName>,
    /// The new colour, or `Some(None)` to remove it.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub color: Option<Option<HexColor>>,
    /// The new icon, or `Some(None)` to remove it.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub icon: Option<Option<String>>,
}

impl CategoryUpdate {
    /// Whether the update would not change anything.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.color.is_none() && self.icon.is_none()
    }
}

/// Deserialize a present field as `Some`, so that an explicit `null` becomes
/// `Some(None)` while a missing field stays `None` via `#[serde(default)]`.
pub(crate) fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
