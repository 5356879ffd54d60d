//! Address book models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Address {
    #[serde(rename = "address_id")]
    pub id: String,
    #[serde(skip_serializing)]
    pub user_id: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country_code: String,
    #[serde(skip_serializing)]
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressRequest {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country_code: String,
}

impl AddressRequest {
    /// Every field is required; returns the names of the blank ones.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country_code", &self.country_code),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn into_address(self, user_id: &str) -> Address {
        Address {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            street: self.street.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            country_code: self.country_code.trim().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_reports_blank_values() {
        let req = AddressRequest {
            street: "1 Main St".to_string(),
            city: "  ".to_string(),
            state: "CA".to_string(),
            postal_code: String::new(),
            country_code: "US".to_string(),
        };
        assert_eq!(req.missing_fields(), vec!["city", "postal_code"]);
    }

    #[test]
    fn test_into_address_assigns_id_and_owner() {
        let req = AddressRequest {
            street: " 1 Main St ".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "62701".to_string(),
            country_code: "US".to_string(),
        };
        let address = req.into_address("user-1");
        assert_eq!(address.user_id, "user-1");
        assert_eq!(address.street, "1 Main St");
        assert!(uuid::Uuid::parse_str(&address.id).is_ok());
    }
}
