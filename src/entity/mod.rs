pub mod audit_logs;
pub mod order_items;
pub mod orders;
pub mod payments;
pub mod products;
pub mod shipping_addresses;
pub mod users;
pub mod variants;

pub use audit_logs::Entity as AuditLogs;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use payments::Entity as Payments;
pub use products::Entity as Products;
pub use shipping_addresses::Entity as ShippingAddresses;
pub use users::Entity as Users;
pub use variants::Entity as Variants;
