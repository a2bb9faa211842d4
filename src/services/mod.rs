pub mod admin_service;
pub mod checkout_service;
pub mod order_service;
