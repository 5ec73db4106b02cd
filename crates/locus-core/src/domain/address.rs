use serde::{Deserialize, Serialize};

use crate::Location;

/// A postal address resolved by a reverse geocoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    pub location: Location,
}

impl Address {
    pub fn new(location: Location) -> Self {
        Self {
            feature_name: None,
            lines: Vec::new(),
            locality: None,
            admin_area: None,
            postal_code: None,
            country_code: None,
            location,
        }
    }

    pub fn with_feature_name(mut self, name: impl Into<String>) -> Self {
        self.feature_name = Some(name.into());
        self
    }

    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn with_locality(mut self, locality: impl Into<String>) -> Self {
        self.locality = Some(locality.into());
        self
    }

    pub fn with_admin_area(mut self, admin_area: impl Into<String>) -> Self {
        self.admin_area = Some(admin_area.into());
        self
    }

    pub fn with_postal_code(mut self, postal_code: impl Into<String>) -> Self {
        self.postal_code = Some(postal_code.into());
        self
    }

    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = Some(country_code.into().to_ascii_uppercase());
        self
    }

    /// Single-line rendering, most specific part first.
    pub fn display_name(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(name) = &self.feature_name {
            parts.push(name);
        }
        parts.extend(self.lines.iter().map(String::as_str));
        for part in [&self.locality, &self.admin_area, &self.country_code]
            .into_iter()
            .flatten()
        {
            if !parts.contains(&part.as_str()) {
                parts.push(part);
            }
        }
        parts.join(", ")
    }
}
