//! Client-side checkout session: a four-step wizard (cart -> shipping ->
//! payment -> review) that accumulates a draft order and submits it to the
//! checkout engine in one piece. The draft survives reloads by living in a
//! [`DraftStore`] slot under a fixed key, serialized as versioned JSON.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::dto::checkout::{
    CheckoutItem, CheckoutRequest, PaymentMethod, ShippingAddressInput, ShippingMethod,
};
use crate::validation::{FieldError, join_field_errors, validate_shipping_address};

/// Fixed slot the draft is persisted under.
pub const SESSION_KEY: &str = "checkout-data";

/// Bumped whenever the draft payload changes shape; drafts written by a
/// different version are discarded on resume instead of half-deserialized.
pub const DRAFT_VERSION: u32 = 1;

/// Flat illustrative tax rate applied in the wizard summary. Display only;
/// the server-side order total stays sum(price * quantity).
pub const TAX_RATE: Decimal = dec!(0.08);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Cart cannot be empty")]
    EmptyCart,

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("Validation failed: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("checkout draft is incomplete: missing {0}")]
    Incomplete(&'static str),

    #[error("draft storage failed: {0}")]
    Storage(String),
}

/// Persistence port for the draft. Browser storage in the real client;
/// file- or memory-backed here so the wizard is testable headless.
pub trait DraftStore {
    fn load(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn save(&self, key: &str, value: &str) -> Result<(), SessionError>;
    fn clear(&self, key: &str) -> Result<(), SessionError>;
}

impl<S: DraftStore + ?Sized> DraftStore for &S {
    fn load(&self, key: &str) -> Result<Option<String>, SessionError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), SessionError> {
        (**self).save(key, value)
    }

    fn clear(&self, key: &str) -> Result<(), SessionError> {
        (**self).clear(key)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, SessionError> {
        let slots = self
            .slots
            .lock()
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        Ok(slots.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), SessionError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        slots.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| SessionError::Storage(e.to_string()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl DraftStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, SessionError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SessionError::Storage(e.to_string())),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), SessionError> {
        std::fs::write(self.path_for(key), value).map_err(|e| SessionError::Storage(e.to_string()))
    }

    fn clear(&self, key: &str) -> Result<(), SessionError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Storage(e.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Cart,
    Shipping,
    Payment,
    Review,
}

impl Step {
    fn previous(self) -> Step {
        match self {
            Step::Cart | Step::Shipping => Step::Cart,
            Step::Payment => Step::Shipping,
            Step::Review => Step::Payment,
        }
    }
}

/// The accumulated, not-yet-submitted order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftOrder {
    pub user_id: Uuid,
    pub items: Vec<CheckoutItem>,
    pub shipping_address: Option<ShippingAddressInput>,
    pub shipping_method: Option<ShippingMethod>,
    pub payment_method: Option<PaymentMethod>,
    pub order_reference: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct DraftEnvelope {
    version: u32,
    draft: DraftOrder,
}

/// A line as the storefront cart holds it. `price` is the display price
/// used for the summary; it never reaches the server.
#[derive(Debug, Clone)]
pub struct CartEntry {
    pub product_id: Uuid,
    pub quantity: i32,
    pub storage: String,
    pub condition: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl Totals {
    pub fn compute(subtotal: Decimal, method: ShippingMethod) -> Self {
        let shipping = method.cost();
        let tax = (subtotal * TAX_RATE).round_dp(2);
        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
        }
    }
}

pub struct CheckoutSession<S: DraftStore> {
    store: S,
    step: Step,
    draft: DraftOrder,
    subtotal: Decimal,
}

impl<S: DraftStore> CheckoutSession<S> {
    /// Enter the checkout flow. Resumes a stored draft when one exists and
    /// its version matches; otherwise starts fresh with a newly generated
    /// order reference. The wizard always restarts at the cart step; only
    /// the draft data survives a reload.
    pub fn start(store: S, user_id: Uuid) -> Result<Self, SessionError> {
        let draft = match store.load(SESSION_KEY)? {
            Some(raw) => match serde_json::from_str::<DraftEnvelope>(&raw) {
                Ok(envelope) if envelope.version == DRAFT_VERSION => Some(envelope.draft),
                _ => None,
            },
            None => None,
        };

        let mut draft = draft.unwrap_or_else(|| DraftOrder {
            user_id,
            items: Vec::new(),
            shipping_address: None,
            shipping_method: None,
            payment_method: None,
            order_reference: generate_order_reference(),
        });
        draft.user_id = user_id;

        let session = Self {
            store,
            step: Step::Cart,
            draft,
            subtotal: Decimal::ZERO,
        };
        session.persist()?;
        Ok(session)
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn draft(&self) -> &DraftOrder {
        &self.draft
    }

    /// Cart step: take the externally managed cart and fold it into the
    /// checkout item shape. Advances to shipping.
    pub fn submit_cart(&mut self, entries: &[CartEntry]) -> Result<(), SessionError> {
        if entries.is_empty() {
            return Err(SessionError::EmptyCart);
        }
        if entries.iter().any(|entry| entry.quantity < 1) {
            return Err(SessionError::InvalidQuantity);
        }

        self.draft.items = entries
            .iter()
            .map(|entry| CheckoutItem {
                product_id: entry.product_id,
                quantity: entry.quantity,
                storage: entry.storage.clone(),
                condition: entry.condition.clone(),
            })
            .collect();
        self.subtotal = entries
            .iter()
            .map(|entry| entry.price * Decimal::from(entry.quantity))
            .sum();

        self.step = Step::Shipping;
        self.persist()
    }

    /// Shipping step: validated address plus method choice. Field failures
    /// come back per-field so the form can mark each input.
    pub fn submit_shipping(
        &mut self,
        address: ShippingAddressInput,
        method: ShippingMethod,
    ) -> Result<(), SessionError> {
        validate_shipping_address(&address).map_err(SessionError::Validation)?;

        self.draft.shipping_address = Some(address);
        self.draft.shipping_method = Some(method);
        self.step = Step::Payment;
        self.persist()
    }

    pub fn submit_payment(&mut self, method: PaymentMethod) -> Result<(), SessionError> {
        self.draft.payment_method = Some(method);
        self.step = Step::Review;
        self.persist()
    }

    /// Back button: one step backward, nothing entered so far is dropped.
    pub fn back(&mut self) {
        self.step = self.step.previous();
    }

    /// Wizard summary figures. Uses the chosen shipping method, or standard
    /// while none is picked yet.
    pub fn totals(&self) -> Totals {
        let method = self
            .draft
            .shipping_method
            .unwrap_or(ShippingMethod::Standard);
        Totals::compute(self.subtotal, method)
    }

    /// Static transfer instructions shown for the bank payment method.
    pub fn bank_transfer_instructions(&self) -> String {
        format!(
            "Bank: MobiTrade Bank\nAccount name: MobiTrade Inc.\nAccount number: 1234567890\nRouting number: 987654321\nReference: {}\n\nPlease include your order reference in the payment description. Your order will be processed once payment is confirmed.",
            self.draft.order_reference
        )
    }

    /// Review step: assemble the full submission. Fails if any earlier step
    /// was skipped.
    pub fn finalize(&self) -> Result<CheckoutRequest, SessionError> {
        if self.draft.items.is_empty() {
            return Err(SessionError::Incomplete("items"));
        }
        let shipping_address = self
            .draft
            .shipping_address
            .clone()
            .ok_or(SessionError::Incomplete("shipping_address"))?;
        let shipping_method = self
            .draft
            .shipping_method
            .ok_or(SessionError::Incomplete("shipping_method"))?;
        let payment_method = self
            .draft
            .payment_method
            .ok_or(SessionError::Incomplete("payment_method"))?;

        Ok(CheckoutRequest {
            user_id: self.draft.user_id,
            items: self.draft.items.clone(),
            shipping_address,
            shipping_method,
            payment_method,
            order_reference: self.draft.order_reference.clone(),
        })
    }

    /// The engine accepted the order: drop the draft. A failed submission
    /// must NOT call this; the draft stays put for retry.
    pub fn complete(self) -> Result<(), SessionError> {
        self.store.clear(SESSION_KEY)
    }

    /// Explicit abandonment.
    pub fn cancel(self) -> Result<(), SessionError> {
        self.store.clear(SESSION_KEY)
    }

    fn persist(&self) -> Result<(), SessionError> {
        let envelope = DraftEnvelope {
            version: DRAFT_VERSION,
            draft: self.draft.clone(),
        };
        let raw = serde_json::to_string(&envelope)
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        self.store.save(SESSION_KEY, &raw)
    }
}

// Display label only; uniqueness is not enforced server-side.
fn generate_order_reference() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("ORDER-{}", &suffix[..10])
}
