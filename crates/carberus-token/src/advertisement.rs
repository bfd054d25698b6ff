//! Advertisement records handed over by the radio bridge.
//!
//! The radio stack itself is external. It forwards each received
//! advertisement as one text line listing the manufacturer-specific data
//! entries, `<company id hex>:<payload hex>`, separated by whitespace:
//!
//! ```text
//! ffff:3ad77bb40d7a3660a89ecaf32466ef97 004c:0215
//! ```

use std::str::FromStr;

/// Errors parsing an advertisement line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdvertisementError {
    #[error("Empty advertisement")]
    Empty,

    #[error("Missing ':' separator in entry '{0}'")]
    MissingSeparator(String),

    #[error("Invalid company id '{0}'")]
    InvalidCompanyId(String),

    #[error("Invalid payload hex for company {company_id:#06x}: {reason}")]
    InvalidPayload { company_id: u16, reason: String },
}

/// Manufacturer-specific data carried by one advertisement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Advertisement {
    entries: Vec<(u16, Vec<u8>)>,
}

impl Advertisement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a manufacturer data entry.
    pub fn with_manufacturer_data(mut self, company_id: u16, data: impl Into<Vec<u8>>) -> Self {
        self.entries.push((company_id, data.into()));
        self
    }

    /// Payload published under `company_id`, if any.
    pub fn manufacturer_data(&self, company_id: u16) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(id, _)| *id == company_id)
            .map(|(_, data)| data.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render in the bridge line format.
    pub fn to_line(&self) -> String {
        self.entries
            .iter()
            .map(|(id, data)| format!("{id:04x}:{}", hex::encode(data)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromStr for Advertisement {
    type Err = AdvertisementError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut advertisement = Advertisement::new();

        for entry in line.split_whitespace() {
            let (company, payload) = entry
                .split_once(':')
                .ok_or_else(|| AdvertisementError::MissingSeparator(entry.to_string()))?;

            let company = company.trim_start_matches("0x");
            let company_id = u16::from_str_radix(company, 16)
                .map_err(|_| AdvertisementError::InvalidCompanyId(company.to_string()))?;

            let data = hex::decode(payload).map_err(|e| AdvertisementError::InvalidPayload {
                company_id,
                reason: e.to_string(),
            })?;

            advertisement.entries.push((company_id, data));
        }

        if advertisement.is_empty() {
            return Err(AdvertisementError::Empty);
        }
        Ok(advertisement)
    }
}
