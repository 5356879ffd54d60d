//! Input validation shared by the auth, cart and catalog services.
//!
//! Every validator returns `Err(message)` with a message fit to show the client.

use lazy_static::lazy_static;
use regex::Regex;

/// Minimum password length accepted at sign-up and sign-in
pub const MIN_PASSWORD_LENGTH: usize = 6;

const FIRST_NAME_MIN: usize = 3;
const FIRST_NAME_MAX: usize = 20;

lazy_static! {
    /// Pragmatic email shape: local part, `@`, dotted domain
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?)+$"
    ).unwrap();
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("email is required".to_string());
    }

    if email.len() > 254 || !EMAIL_REGEX.is_match(email) {
        return Err("email must be a valid email address".to_string());
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("password is required".to_string());
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }

    Ok(())
}

/// First names are display names of 3 to 20 characters
pub fn validate_first_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("first_name is required".to_string());
    }

    let len = name.chars().count();
    if !(FIRST_NAME_MIN..=FIRST_NAME_MAX).contains(&len) {
        return Err(format!(
            "first_name must be between {} and {} characters",
            FIRST_NAME_MIN, FIRST_NAME_MAX
        ));
    }

    Ok(())
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}

pub fn validate_quantity(quantity: Option<i64>) -> Result<i64, String> {
    match quantity {
        None => Err("quantity is required".to_string()),
        Some(q) if q <= 0 => Err("quantity must be greater than zero".to_string()),
        Some(q) => Ok(q),
    }
}

/// Prices and ratings must be finite and non-negative
pub fn validate_amount(value: f64, field_name: &str) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{} must be a non-negative number", field_name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("first.last+tag@mail.example.co.uk").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("alice").is_err());
        assert!(validate_email("alice@").is_err());
        assert!(validate_email("alice@localhost").is_err());
        assert!(validate_email("al ice@example.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret").is_ok());
        assert!(validate_password("").is_err());
        assert!(validate_password("12345").is_err());
    }

    #[test]
    fn test_validate_first_name() {
        assert!(validate_first_name("Ann").is_ok());
        assert!(validate_first_name("Bartholomew").is_ok());

        assert!(validate_first_name("").is_err());
        assert!(validate_first_name("Al").is_err());
        assert!(validate_first_name("Maximiliana-Josephina").is_err()); // 21 chars
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000", "product_id").is_ok());
        assert_eq!(
            validate_uuid("", "product_id").unwrap_err(),
            "product_id is required"
        );
        assert_eq!(
            validate_uuid("not-a-uuid", "product_id").unwrap_err(),
            "Invalid product_id format"
        );
    }

    #[test]
    fn test_validate_quantity() {
        assert_eq!(validate_quantity(Some(3)), Ok(3));
        assert!(validate_quantity(None).is_err());
        assert!(validate_quantity(Some(0)).is_err());
        assert!(validate_quantity(Some(-2)).is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(0.0, "price").is_ok());
        assert!(validate_amount(19.99, "price").is_ok());
        assert!(validate_amount(-0.01, "price").is_err());
        assert!(validate_amount(f64::NAN, "rating").is_err());
    }
}
