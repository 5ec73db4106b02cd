use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ValidationError;

const MAX_PROVIDER_ID_LEN: usize = 64;

/// Provider identifier used in logs, attempt chains, registries and store keys.
///
/// Identifiers are lowercase ASCII and may contain digits, `-`, `_` and `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(Cow<'static, str>);

impl ProviderId {
    /// Primary fused (play-services style) location provider.
    pub const FUSED: Self = Self(Cow::Borrowed("fused"));
    /// Legacy OS location manager.
    pub const MANAGER: Self = Self(Cow::Borrowed("manager"));
    /// Vendor-specific location provider.
    pub const VENDOR: Self = Self(Cow::Borrowed("vendor"));
    /// Provider answering from the last-known store.
    pub const LAST_KNOWN: Self = Self(Cow::Borrowed("last-known"));
    /// Offline gazetteer geocoder.
    pub const GAZETTEER: Self = Self(Cow::Borrowed("gazetteer"));

    pub const BUILTIN: [Self; 5] = [
        Self::FUSED,
        Self::MANAGER,
        Self::VENDOR,
        Self::LAST_KNOWN,
        Self::GAZETTEER,
    ];

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let value = input.trim().to_ascii_lowercase();
        if value.is_empty() {
            return Err(ValidationError::EmptyProviderId);
        }
        if value.len() > MAX_PROVIDER_ID_LEN {
            return Err(ValidationError::ProviderIdTooLong {
                len: value.len(),
                max: MAX_PROVIDER_ID_LEN,
            });
        }
        if let Some((index, ch)) = value
            .char_indices()
            .find(|(_, ch)| !(ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')))
        {
            return Err(ValidationError::ProviderIdInvalidChar { ch, index });
        }

        Ok(Self(Cow::Owned(value)))
    }

    pub const fn fused() -> Self {
        Self::FUSED
    }

    pub const fn manager() -> Self {
        Self::MANAGER
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for ProviderId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProviderId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}
