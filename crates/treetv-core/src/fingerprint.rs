//! Browser fingerprint and the session cookie derived from it
//!
//! The catalog host expects the same fingerprint a desktop browser would
//! report, hashed into the `mycook` cookie and registered once through the
//! imprint endpoint.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TreeTvError};
use crate::hash::hash128;

/// Seed used when hashing the serialized fingerprint
pub const FINGERPRINT_SEED: u32 = 31;

/// Separator between serialized component values
const VALUE_SEPARATOR: &str = "~~~";

/// Separator between the elements of a list value
const LIST_SEPARATOR: &str = ";";

const CANVAS_FINGERPRINT: &str = include_str!("canvas_fingerprint.txt");

/// Value of a single fingerprint component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentValue {
    Flag(bool),
    Number(i64),
    Text(String),
    List(Vec<ComponentValue>),
}

impl ComponentValue {
    /// Renders the value the way a browser stringifies it
    ///
    /// Lists are joined with `;`, flags become `true`/`false`.
    pub fn render(&self) -> String {
        match self {
            Self::Flag(flag) => flag.to_string(),
            Self::Number(number) => number.to_string(),
            Self::Text(text) => text.clone(),
            Self::List(items) => items
                .iter()
                .map(ComponentValue::render)
                .collect::<Vec<_>>()
                .join(LIST_SEPARATOR),
        }
    }
}

impl From<&str> for ComponentValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for ComponentValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for ComponentValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

/// One `{key, value}` pair of the fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintComponent {
    pub key: String,
    pub value: ComponentValue,
}

impl FingerprintComponent {
    pub fn new(key: &str, value: impl Into<ComponentValue>) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
        }
    }
}

/// Cookie value derived from the fingerprint: 32 lowercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionCookie(String);

impl SessionCookie {
    /// Name of the cookie the catalog and player hosts check
    pub const NAME: &'static str = "mycook";

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, immutable set of fingerprint components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    components: Vec<FingerprintComponent>,
}

impl Fingerprint {
    pub fn new(components: Vec<FingerprintComponent>) -> Self {
        Self { components }
    }

    /// Fixed desktop-browser fingerprint with the configured user agent and platform
    pub fn browser(user_agent: &str, platform: &str) -> Self {
        let list = |items: Vec<ComponentValue>| ComponentValue::List(items);
        let fonts = [
            "Arial",
            "Courier",
            "Courier New",
            "Helvetica",
            "Times",
            "Times New Roman",
        ];

        Self::new(vec![
            FingerprintComponent::new("user_agent", user_agent),
            FingerprintComponent::new("language", "en-US"),
            FingerprintComponent::new("color_depth", 24),
            FingerprintComponent::new("pixel_ratio", 1),
            FingerprintComponent::new("hardware_concurrency", 2),
            FingerprintComponent::new("resolution", list(vec![1920.into(), 1080.into()])),
            FingerprintComponent::new(
                "available_resolution",
                list(vec![1920.into(), 1080.into()]),
            ),
            FingerprintComponent::new("timezone_offset", 0),
            FingerprintComponent::new("session_storage", 1),
            FingerprintComponent::new("local_storage", 1),
            FingerprintComponent::new("indexed_db", 1),
            FingerprintComponent::new("open_database", 1),
            FingerprintComponent::new("cpu_class", "unknown"),
            FingerprintComponent::new("navigator_platform", platform),
            FingerprintComponent::new("do_not_track", "unknown"),
            FingerprintComponent::new("regular_plugins", "undefined"),
            FingerprintComponent::new("canvas", CANVAS_FINGERPRINT.trim_end()),
            FingerprintComponent::new("adblock", false),
            FingerprintComponent::new("has_lied_languages", false),
            FingerprintComponent::new("has_lied_resolution", false),
            FingerprintComponent::new("has_lied_os", false),
            FingerprintComponent::new("has_lied_browser", false),
            FingerprintComponent::new(
                "touch_support",
                list(vec![0.into(), false.into(), false.into()]),
            ),
            FingerprintComponent::new(
                "js_fonts",
                list(fonts.iter().map(|font| (*font).into()).collect()),
            ),
        ])
    }

    /// Parses a fingerprint from a JSON array of `{"key": .., "value": ..}` objects
    ///
    /// # Errors
    /// Returns `ParseError` if the JSON does not have that shape
    pub fn from_json(json: &str) -> Result<Self> {
        let components: Vec<FingerprintComponent> = serde_json::from_str(json)
            .map_err(|e| TreeTvError::ParseError(format!("Invalid fingerprint JSON: {}", e)))?;
        Ok(Self::new(components))
    }

    pub fn components(&self) -> &[FingerprintComponent] {
        &self.components
    }

    /// Serializes the component values into the string that gets hashed
    pub fn serialize_values(&self) -> String {
        self.components
            .iter()
            .map(|component| component.value.render())
            .collect::<Vec<_>>()
            .join(VALUE_SEPARATOR)
    }

    /// Derives the session cookie (MurmurHash3 x64-128, seed 31)
    pub fn cookie(&self) -> SessionCookie {
        SessionCookie(hash128(self.serialize_values().as_bytes(), FINGERPRINT_SEED))
    }

    /// Builds the form body for the imprint endpoint
    ///
    /// Scalars are sent as `components[i][value]`, list elements as repeated
    /// `components[i][value][]` pairs.
    pub fn imprint_form(&self, cookie: &SessionCookie) -> Vec<(String, String)> {
        let mut form = vec![("result".to_string(), cookie.to_string())];

        for (i, component) in self.components.iter().enumerate() {
            form.push((format!("components[{}][key]", i), component.key.clone()));
            match &component.value {
                ComponentValue::List(items) => {
                    for item in items {
                        form.push((format!("components[{}][value][]", i), item.render()));
                    }
                }
                scalar => form.push((format!("components[{}][value]", i), scalar.render())),
            }
        }

        form
    }
}
