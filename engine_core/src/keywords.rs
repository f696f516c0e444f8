use crate::contracts::{ClickKind, FieldKind};
use std::collections::HashMap;

/// # NDOC
/// component: `keywords`
/// purpose: Intent -> ranked keyword lists, exposed as data and overridable
///          by the orchestrator (e.g. to inject localized keywords).
/// invariants:
///   - Lists are ordered by expected discriminating power, primary first.
///   - "add for ship" stays ahead of "add to bag": pickup-vs-ship storefronts
///     present both and the ship button is the one checkout needs.

const ADD_TO_CART: &[&str] = &[
    "add to cart",
    "add for ship",
    "add to bag",
    "add to basket",
    "buy now",
    "add to trolley",
    "añadir a la bolsa",
    "ajouter au panier",
];

const CHECKOUT: &[&str] = &[
    "checkout",
    "check out",
    "proceed to checkout",
    "proceed to buy",
    "place order",
    "continue to checkout",
    "finalizar compra",
];

const CONTINUE_KEYWORDS: &[&str] = &["continue", "next", "proceed", "save & continue"];

const GUEST_CHECKOUT: &[&str] = &[
    "guest checkout",
    "checkout as guest",
    "continue as guest",
    "guest",
];

const VIEW_CART: &[&str] = &["view cart", "view bag", "view basket", "go to cart", "cart"];

const EMAIL: &[&str] = &["email", "e-mail", "email address"];
const FIRST_NAME: &[&str] = &["first name", "given name", "fname", "first"];
const LAST_NAME: &[&str] = &["last name", "surname", "family name", "lname", "last"];
const PHONE: &[&str] = &["phone", "mobile", "telephone", "contact number", "tel"];
const ADDRESS_LINE1: &[&str] = &[
    "address",
    "street address",
    "address line 1",
    "house number and street",
    "flat, house no",
];
const ADDRESS_LINE2: &[&str] = &[
    "address line 2",
    "apartment",
    "apt",
    "suite",
    "unit",
    "area, street",
];
const CITY: &[&str] = &["city", "town", "town/city", "district"];
const STATE: &[&str] = &["state", "province", "state/province", "region"];
const POSTAL: &[&str] = &["zip", "postal code", "postcode", "pincode", "pin code", "zip code"];
const COUNTRY: &[&str] = &["country", "country/region"];
const PASSWORD: &[&str] = &["password", "create password"];
const CARD_NUMBER: &[&str] = &["card number", "credit card number", "debit card number", "card"];
const CARD_EXPIRY: &[&str] = &["expiry", "expiration", "expiration date", "valid thru", "mm/yy"];
const CARD_CVV: &[&str] = &["cvv", "cvc", "security code", "card verification"];
const UPI_ID: &[&str] = &["upi id", "upi", "vpa"];
const LANDMARK: &[&str] = &["landmark", "nearby landmark"];

/// The keyword tables for one engine instance. Constructed from the
/// built-in defaults; the orchestrator may replace any entry.
#[derive(Debug, Clone)]
pub struct KeywordCatalog {
    fields: HashMap<FieldKind, Vec<String>>,
    actions: HashMap<ClickKind, Vec<String>>,
}

impl Default for KeywordCatalog {
    fn default() -> Self {
        let mut fields = HashMap::new();
        let field_table: &[(FieldKind, &[&str])] = &[
            (FieldKind::Email, EMAIL),
            (FieldKind::FirstName, FIRST_NAME),
            (FieldKind::LastName, LAST_NAME),
            (FieldKind::Phone, PHONE),
            (FieldKind::AddressLine1, ADDRESS_LINE1),
            (FieldKind::AddressLine2, ADDRESS_LINE2),
            (FieldKind::City, CITY),
            (FieldKind::State, STATE),
            (FieldKind::Postal, POSTAL),
            (FieldKind::Country, COUNTRY),
            (FieldKind::Password, PASSWORD),
            (FieldKind::CardNumber, CARD_NUMBER),
            (FieldKind::CardExpiry, CARD_EXPIRY),
            (FieldKind::CardCvv, CARD_CVV),
            (FieldKind::UpiId, UPI_ID),
            (FieldKind::Landmark, LANDMARK),
        ];
        for (kind, list) in field_table {
            fields.insert(
                kind.clone(),
                list.iter().map(|s| s.to_string()).collect(),
            );
        }

        let mut actions = HashMap::new();
        let action_table: &[(ClickKind, &[&str])] = &[
            (ClickKind::AddToCart, ADD_TO_CART),
            (ClickKind::Checkout, CHECKOUT),
            (ClickKind::Continue, CONTINUE_KEYWORDS),
            (ClickKind::GuestCheckout, GUEST_CHECKOUT),
            (ClickKind::ViewCart, VIEW_CART),
        ];
        for (kind, list) in action_table {
            actions.insert(
                kind.clone(),
                list.iter().map(|s| s.to_string()).collect(),
            );
        }

        Self { fields, actions }
    }
}

impl KeywordCatalog {
    /// Ranked keywords for a field kind. A `Custom` kind falls back to
    /// its own raw name as the single keyword.
    pub fn for_field(&self, kind: &FieldKind) -> Vec<String> {
        if let Some(list) = self.fields.get(kind) {
            return list.clone();
        }
        match kind {
            FieldKind::Custom(name) => vec![name.clone()],
            _ => Vec::new(),
        }
    }

    /// Ranked keywords for a click action. A `Custom` kind falls back to
    /// its raw name.
    pub fn for_action(&self, kind: &ClickKind) -> Vec<String> {
        if let Some(list) = self.actions.get(kind) {
            return list.clone();
        }
        match kind {
            ClickKind::Custom(name) => vec![name.clone()],
            _ => Vec::new(),
        }
    }

    pub fn override_field(&mut self, kind: FieldKind, keywords: Vec<String>) {
        self.fields.insert(kind, keywords);
    }

    pub fn override_action(&mut self, kind: ClickKind, keywords: Vec<String>) {
        self.actions.insert(kind, keywords);
    }

    /// Texts that disqualify an action candidate no matter how well it
    /// scored. Part of the Phase 1 negative-signal set.
    pub fn unwanted_action_texts() -> &'static [&'static str] {
        &[
            "close",
            "dismiss",
            "continue shopping",
            "keep shopping",
            "shop now",
            "back to shop",
            "return to",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_to_cart_ordering_keeps_ship_before_bag() {
        let catalog = KeywordCatalog::default();
        let list = catalog.for_action(&ClickKind::AddToCart);
        let ship = list.iter().position(|k| k == "add for ship").expect("ship");
        let bag = list.iter().position(|k| k == "add to bag").expect("bag");
        assert!(list[0] == "add to cart");
        assert!(ship < bag);
    }

    #[test]
    fn custom_kinds_fall_back_to_their_name() {
        let catalog = KeywordCatalog::default();
        assert_eq!(
            catalog.for_field(&FieldKind::Custom("gift note".into())),
            vec!["gift note".to_string()]
        );
        assert_eq!(
            catalog.for_action(&ClickKind::Custom("apply coupon".into())),
            vec!["apply coupon".to_string()]
        );
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut catalog = KeywordCatalog::default();
        catalog.override_field(FieldKind::Postal, vec!["eircode".into()]);
        assert_eq!(catalog.for_field(&FieldKind::Postal), vec!["eircode"]);
    }

    #[test]
    fn every_builtin_field_kind_has_keywords() {
        let catalog = KeywordCatalog::default();
        for kind in [
            FieldKind::Email,
            FieldKind::FirstName,
            FieldKind::LastName,
            FieldKind::Phone,
            FieldKind::AddressLine1,
            FieldKind::City,
            FieldKind::Postal,
            FieldKind::Country,
            FieldKind::CardNumber,
            FieldKind::CardExpiry,
            FieldKind::CardCvv,
        ] {
            assert!(!catalog.for_field(&kind).is_empty(), "{:?}", kind);
        }
    }
}
