//! Shipping addresses.

use serde::{Deserialize, Serialize};

use crate::value_objects::AddressId;

use super::ValidationError;

/// A saved shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub first_name: String,
    pub last_name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub postcode: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Address {
    /// Checks that every required field is present, trimming them in place.
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        for (field, value) in [
            ("first_name", &mut self.first_name),
            ("last_name", &mut self.last_name),
            ("line1", &mut self.line1),
            ("city", &mut self.city),
            ("postcode", &mut self.postcode),
            ("country", &mut self.country),
        ] {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(ValidationError::MissingField(field));
            }
            *value = trimmed.to_string();
        }
        self.line2 = self.line2.filter(|line| !line.trim().is_empty());
        self.phone = self.phone.filter(|phone| !phone.trim().is_empty());
        Ok(self)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[cfg(test)]
pub(crate) fn sample_address() -> Address {
    Address {
        id: AddressId::new(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        line1: "12 Analytical Row".to_string(),
        line2: None,
        city: "London".to_string(),
        postcode: "N1 9GU".to_string(),
        country: "GB".to_string(),
        phone: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_trims_fields() {
        let mut address = sample_address();
        address.city = "  London ".to_string();
        address.line2 = Some("   ".to_string());

        let address = address.validated().unwrap();
        assert_eq!(address.city, "London");
        assert_eq!(address.line2, None);
        assert_eq!(address.full_name(), "Ada Lovelace");
    }

    #[test]
    fn test_missing_required_field() {
        let mut address = sample_address();
        address.postcode = " ".to_string();
        assert_eq!(
            address.validated(),
            Err(ValidationError::MissingField("postcode"))
        );
    }
}
