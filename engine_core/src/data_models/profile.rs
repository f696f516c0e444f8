use serde::{Deserialize, Serialize};
use validator::Validate;

/// Contact, shipping and payment data the orchestrator hands the engine
/// for a checkout run. Payment fields are optional; storefronts that
/// take payment after login never need them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CustomerProfile {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    #[validate(length(min = 7, max = 20))]
    pub phone: String,
    pub shipping: ShippingAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentCard>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 1))]
    pub line1: String,
    pub line2: String,
    pub landmark: String,
    #[validate(length(min = 1))]
    pub city: String,
    pub state: String,
    #[validate(length(min = 3, max = 12))]
    pub postal: String,
    #[validate(length(min = 2))]
    pub country: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PaymentCard {
    #[validate(length(min = 12, max = 19))]
    pub number: String,
    /// MM/YY as typed into expiry fields.
    #[validate(length(min = 4, max = 7))]
    pub expiry: String,
    #[validate(length(min = 3, max = 4))]
    pub cvv: String,
    pub holder: String,
}

impl CustomerProfile {
    /// Full name the way address forms usually want it.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CustomerProfile {
        CustomerProfile {
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            phone: "+1 415 555 0142".into(),
            shipping: ShippingAddress {
                line1: "12 Analytical Way".into(),
                line2: String::new(),
                landmark: String::new(),
                city: "San Francisco".into(),
                state: "CA".into(),
                postal: "94107".into(),
                country: "US".into(),
            },
            payment: None,
        }
    }

    #[test]
    fn valid_profile_passes_validation() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn bad_email_fails_validation() {
        let mut p = sample();
        p.email = "not-an-email".into();
        assert!(p.validate().is_err());
    }

    #[test]
    fn full_name_joins_and_trims() {
        assert_eq!(sample().full_name(), "Ada Lovelace");
    }
}
