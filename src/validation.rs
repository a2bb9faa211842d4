use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::checkout::ShippingAddressInput;

/// A single failed field, surfaced per-field so the wizard can highlight
/// the offending input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

const MIN_POSTAL_CODE_LEN: usize = 4;
const MIN_PHONE_LEN: usize = 7;

/// Validate a shipping address. Used by the shipping step of the checkout
/// wizard and re-checked by the engine before the transaction opens.
pub fn validate_shipping_address(address: &ShippingAddressInput) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    let required: [(&'static str, &str); 8] = [
        ("full_name", &address.full_name),
        ("address_line", &address.address_line),
        ("city", &address.city),
        ("state", &address.state),
        ("postal_code", &address.postal_code),
        ("country", &address.country),
        ("email", &address.email),
        ("phone_number", &address.phone_number),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            errors.push(FieldError::new(field, "must not be empty"));
        }
    }

    if !address.email.trim().is_empty() && !is_email_shaped(&address.email) {
        errors.push(FieldError::new("email", "must be a valid email address"));
    }
    if !address.postal_code.trim().is_empty()
        && address.postal_code.trim().len() < MIN_POSTAL_CODE_LEN
    {
        errors.push(FieldError::new(
            "postal_code",
            format!("must be at least {MIN_POSTAL_CODE_LEN} characters"),
        ));
    }
    if !address.phone_number.trim().is_empty() && address.phone_number.trim().len() < MIN_PHONE_LEN
    {
        errors.push(FieldError::new(
            "phone_number",
            format!("must be at least {MIN_PHONE_LEN} characters"),
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

// Shape check only: something before '@', a dot somewhere after it.
fn is_email_shaped(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}
