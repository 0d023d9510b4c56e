//! Input validation for API requests.
//!
//! Validation functions return a field-level message on failure; handlers
//! collect them with the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Pragmatic email shape check; deliverability is the mail server's problem
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^@\s]+@[^@\s]+\.[^@\s]+$"
    ).unwrap();

    /// Phone numbers: optional +, digits, spaces and dashes
    static ref PHONE_REGEX: Regex = Regex::new(
        r"^\+?[0-9][0-9 \-]{5,19}$"
    ).unwrap();

    /// HTTP(S) URLs for prize images
    static ref IMAGE_URL_REGEX: Regex = Regex::new(
        r"^https?://[^\s]+$"
    ).unwrap();
}

/// Valid competition categories
const VALID_CATEGORIES: [&str; 3] = ["cars", "electronics", "cash"];

/// Valid user roles
const VALID_ROLES: [&str; 2] = ["user", "admin"];

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 6 {
        return Err("Password must be at least 6 characters".to_string());
    }
    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }
    Ok(())
}

pub fn validate_full_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.len() < 2 {
        return Err("Full name must be at least 2 characters".to_string());
    }
    if trimmed.len() > 100 {
        return Err("Full name is too long (max 100 characters)".to_string());
    }
    Ok(())
}

pub fn validate_phone(phone: &Option<String>) -> Result<(), String> {
    if let Some(p) = phone {
        if p.is_empty() {
            return Ok(()); // Empty string treated as no phone
        }
        if !PHONE_REGEX.is_match(p) {
            return Err("Invalid phone number format".to_string());
        }
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err("Title is required".to_string());
    }
    if trimmed.len() > 200 {
        return Err("Title is too long (max 200 characters)".to_string());
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), String> {
    if description.trim().is_empty() {
        return Err("Description is required".to_string());
    }
    if description.len() > 10_000 {
        return Err("Description is too long (max 10000 characters)".to_string());
    }
    Ok(())
}

pub fn validate_category(category: &str) -> Result<(), String> {
    let lower = category.to_lowercase();
    if !VALID_CATEGORIES.contains(&lower.as_str()) {
        return Err(format!(
            "Invalid category. Must be one of: {}",
            VALID_CATEGORIES.join(", ")
        ));
    }
    Ok(())
}

pub fn validate_price(value: f64, field_name: &str) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("{} must be a finite number", field_name));
    }
    if value <= 0.0 {
        return Err(format!("{} must be greater than 0", field_name));
    }
    Ok(())
}

pub fn validate_total_tickets(total: i64) -> Result<(), String> {
    if total < 1 {
        return Err("Total tickets must be at least 1".to_string());
    }
    if total > 1_000_000 {
        return Err("Total tickets is too high (max 1000000)".to_string());
    }
    Ok(())
}

pub fn validate_draw_date(draw_date: &str) -> Result<(), String> {
    if draw_date.is_empty() {
        return Err("Draw date is required".to_string());
    }
    if chrono::DateTime::parse_from_rfc3339(draw_date).is_err() {
        return Err("Draw date must be an ISO 8601 timestamp".to_string());
    }
    Ok(())
}

pub fn validate_image_url(url: &str) -> Result<(), String> {
    if url.is_empty() {
        return Ok(()); // Image is optional
    }
    if url.len() > 2048 {
        return Err("Image URL is too long (max 2048 characters)".to_string());
    }
    if !IMAGE_URL_REGEX.is_match(url) {
        return Err("Image URL must be an HTTP(S) URL".to_string());
    }
    Ok(())
}

pub fn validate_quantity(quantity: i64, max_per_order: i64) -> Result<(), String> {
    if quantity < 1 {
        return Err("Quantity must be at least 1".to_string());
    }
    if quantity > max_per_order {
        return Err(format!("Quantity is too high (max {})", max_per_order));
    }
    Ok(())
}

pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }
    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }
    Ok(())
}

pub fn validate_role(role: &str) -> Result<(), String> {
    if !VALID_ROLES.contains(&role) {
        return Err(format!(
            "Invalid role. Must be one of: {}",
            VALID_ROLES.join(", ")
        ));
    }
    Ok(())
}

pub fn validate_message(message: &str) -> Result<(), String> {
    if message.trim().is_empty() {
        return Err("Message is required".to_string());
    }
    if message.len() > 5_000 {
        return Err("Message is too long (max 5000 characters)".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("a.b+c@sub.example.co.uk").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("missing@tld").is_err());
        assert!(validate_email("two@@example.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret1").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_full_name() {
        assert!(validate_full_name("Jo Smith").is_ok());
        assert!(validate_full_name("J").is_err());
        assert!(validate_full_name("  ").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone(&Some("+44 7700 900123".to_string())).is_ok());
        assert!(validate_phone(&Some("07700900123".to_string())).is_ok());
        assert!(validate_phone(&Some("".to_string())).is_ok());
        assert!(validate_phone(&None).is_ok());

        assert!(validate_phone(&Some("call-me".to_string())).is_err());
        assert!(validate_phone(&Some("123".to_string())).is_err());
    }

    #[test]
    fn test_validate_category() {
        assert!(validate_category("cars").is_ok());
        assert!(validate_category("Electronics").is_ok());
        assert!(validate_category("cash").is_ok());

        assert!(validate_category("boats").is_err());
        assert!(validate_category("").is_err());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(4.99, "ticket_price").is_ok());
        assert!(validate_price(0.0, "ticket_price").is_err());
        assert!(validate_price(-1.0, "ticket_price").is_err());
        assert!(validate_price(f64::NAN, "ticket_price").is_err());
        assert!(validate_price(f64::INFINITY, "prize_value").is_err());
    }

    #[test]
    fn test_validate_total_tickets() {
        assert!(validate_total_tickets(1).is_ok());
        assert!(validate_total_tickets(4999).is_ok());
        assert!(validate_total_tickets(0).is_err());
        assert!(validate_total_tickets(1_000_001).is_err());
    }

    #[test]
    fn test_validate_draw_date() {
        assert!(validate_draw_date("2030-06-01T12:00:00Z").is_ok());
        assert!(validate_draw_date("2030-06-01T12:00:00+01:00").is_ok());
        assert!(validate_draw_date("").is_err());
        assert!(validate_draw_date("next tuesday").is_err());
        assert!(validate_draw_date("2030-06-01").is_err());
    }

    #[test]
    fn test_validate_image_url() {
        assert!(validate_image_url("").is_ok());
        assert!(validate_image_url("https://images.example.com/car.jpg").is_ok());
        assert!(validate_image_url("ftp://example.com/car.jpg").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1, 100).is_ok());
        assert!(validate_quantity(100, 100).is_ok());
        assert!(validate_quantity(0, 100).is_err());
        assert!(validate_quantity(101, 100).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000", "order_id").is_ok());
        assert!(validate_uuid("", "order_id").is_err());
        assert!(validate_uuid("not-a-uuid", "order_id").is_err());
    }

    #[test]
    fn test_validate_role() {
        assert!(validate_role("user").is_ok());
        assert!(validate_role("admin").is_ok());
        assert!(validate_role("superadmin").is_err());
    }
}
