use serde::{Deserialize, Serialize};

/// # NDOC
/// component: `contracts`
/// purpose: Public intent/outcome contract between the engine and its orchestrator.
/// invariants:
///   - An `Intent` is consumed once and produces exactly one `Outcome`.
///   - Variants are part of external API surface; changes require compatibility review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    /// Select a product variant, e.g. kind="color", value="Midnight Blue".
    /// `kind` is free text supplied by the caller.
    SelectVariant { kind: String, value: String },
    /// Click a navigation-level action button (add to cart, checkout, ...).
    ClickAction { kind: ClickKind },
    /// Fill a labelled text input.
    FillField { field: FieldKind, value: String },
    /// Select an option in a native or custom dropdown.
    SelectDropdown { field: FieldKind, value: String },
    /// Set the purchase quantity.
    SetQuantity { value: u32 },
    /// Drive a checkbox to a target state.
    Checkbox { label: String, checked: bool },
}

impl Intent {
    /// Short stable label used in logs and outcome records.
    pub fn label(&self) -> String {
        match self {
            Intent::SelectVariant { kind, value } => format!("select_variant:{}={}", kind, value),
            Intent::ClickAction { kind } => format!("click:{}", kind.as_str()),
            Intent::FillField { field, .. } => format!("fill:{}", field.as_str()),
            Intent::SelectDropdown { field, .. } => format!("dropdown:{}", field.as_str()),
            Intent::SetQuantity { value } => format!("quantity:{}", value),
            Intent::Checkbox { label, checked } => format!("checkbox:{}={}", label, checked),
        }
    }

    /// Navigation intents (add-to-cart, checkout, ...) never enter the
    /// discovery phase; they get intent-specific recovery instead.
    pub fn is_navigation(&self) -> bool {
        matches!(self, Intent::ClickAction { .. })
    }

    /// Intents that are eligible for the discovery fallback.
    pub fn is_discoverable(&self) -> bool {
        matches!(
            self,
            Intent::SelectVariant { .. }
                | Intent::FillField { .. }
                | Intent::SelectDropdown { .. }
                | Intent::SetQuantity { .. }
        )
    }

    /// The value the page is expected to reflect after the intent ran,
    /// when there is one.
    pub fn target_value(&self) -> Option<&str> {
        match self {
            Intent::SelectVariant { value, .. } => Some(value),
            Intent::FillField { value, .. } => Some(value),
            Intent::SelectDropdown { value, .. } => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ClickKind {
    AddToCart,
    Checkout,
    Continue,
    GuestCheckout,
    ViewCart,
    Custom(String),
}

impl ClickKind {
    pub fn as_str(&self) -> &str {
        match self {
            ClickKind::AddToCart => "add_to_cart",
            ClickKind::Checkout => "checkout",
            ClickKind::Continue => "continue",
            ClickKind::GuestCheckout => "guest_checkout",
            ClickKind::ViewCart => "view_cart",
            ClickKind::Custom(s) => s.as_str(),
        }
    }
}

/// Field kinds the keyword registry knows how to label-match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Email,
    FirstName,
    LastName,
    Phone,
    AddressLine1,
    AddressLine2,
    City,
    State,
    Postal,
    Country,
    Password,
    CardNumber,
    CardExpiry,
    CardCvv,
    UpiId,
    Landmark,
    Custom(String),
}

impl FieldKind {
    pub fn as_str(&self) -> &str {
        match self {
            FieldKind::Email => "email",
            FieldKind::FirstName => "first_name",
            FieldKind::LastName => "last_name",
            FieldKind::Phone => "phone",
            FieldKind::AddressLine1 => "address_line1",
            FieldKind::AddressLine2 => "address_line2",
            FieldKind::City => "city",
            FieldKind::State => "state",
            FieldKind::Postal => "postal",
            FieldKind::Country => "country",
            FieldKind::Password => "password",
            FieldKind::CardNumber => "card_number",
            FieldKind::CardExpiry => "card_expiry",
            FieldKind::CardCvv => "card_cvv",
            FieldKind::UpiId => "upi_id",
            FieldKind::Landmark => "landmark",
            FieldKind::Custom(s) => s.as_str(),
        }
    }

    /// Payment fields are the ones that may live inside hosted payment
    /// iframes and get routed to the keyboard-type strategy.
    pub fn is_payment(&self) -> bool {
        matches!(
            self,
            FieldKind::CardNumber | FieldKind::CardExpiry | FieldKind::CardCvv
        )
    }
}

/// # NDOC
/// component: `contracts`
/// purpose: Stable machine-readable failure category surfaced to the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    NotVisible,
    NotInteractive,
    Obscured,
    ValueRejected,
    VerificationFailed,
    BrowserDisconnected,
    NavigationDetected,
    Timeout,
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutcomeError {
    pub kind: ErrorKind,
    pub detail: String,
}

/// # NDOC
/// component: `contracts`
/// purpose: The single result record every public operation returns.
/// invariants:
///   - `success && navigated` means the action worked so thoroughly the page is gone.
///   - `error` is `Some` exactly when `success` is false.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Outcome {
    pub success: bool,
    pub action: String,
    pub method: String,
    pub verified: bool,
    pub navigated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
}

impl Outcome {
    pub fn success(action: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            success: true,
            action: action.into(),
            method: method.into(),
            verified: false,
            navigated: false,
            matched_text: None,
            error: None,
        }
    }

    pub fn failure(
        action: impl Into<String>,
        kind: ErrorKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            action: action.into(),
            method: String::new(),
            verified: false,
            navigated: false,
            matched_text: None,
            error: Some(OutcomeError {
                kind,
                detail: detail.into(),
            }),
        }
    }

    /// The action succeeded so thoroughly the execution context was torn
    /// down; no verification can or should run.
    pub fn navigated(action: impl Into<String>, method: impl Into<String>) -> Self {
        let mut o = Self::success(action, method);
        o.navigated = true;
        o.verified = true;
        o
    }

    pub fn verified(mut self, matched_text: Option<String>) -> Self {
        self.verified = true;
        self.matched_text = matched_text;
        self
    }
}

/// Result of a standalone `verify_selection` probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectionCheck {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
    pub method: String,
}

/// Result of a `dismiss_popups` sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DismissReport {
    pub dismissed_count: u32,
}
