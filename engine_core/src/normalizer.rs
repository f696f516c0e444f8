use crate::contracts::FieldKind;
use once_cell::sync::Lazy;
use regex::Regex;

/// # NDOC
/// component: `normalizer`
/// purpose: Canonical text/number/phone comparison and exclusion predicates.
/// invariants:
///   - Every function here is pure; no I/O, no page access.
///   - `matches` short-circuits on the first rule that fires, in rule order.

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Lowercase, trim, collapse internal whitespace, strip punctuation
/// except intra-word hyphens and digits. Empty input stays empty.
pub fn normalize(s: &str) -> String {
    let lowered = s.trim().to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let chars: Vec<char> = lowered.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() || c.is_whitespace() {
            out.push(c);
        } else if c == '-' {
            // Keep hyphens only between word characters.
            let prev_word = i > 0 && chars[i - 1].is_alphanumeric();
            let next_word = i + 1 < chars.len() && chars[i + 1].is_alphanumeric();
            if prev_word && next_word {
                out.push(c);
            } else {
                out.push(' ');
            }
        } else {
            out.push(' ');
        }
    }
    WHITESPACE.replace_all(out.trim(), " ").into_owned()
}

/// Alphanumerics only, no spaces. Used for OCR and exact checks.
pub fn normalize_strict(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Strip everything but digits. Only used for phone comparison.
pub fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// How a candidate text matched the target, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchQuality {
    Exact,
    Phrase,
    Bag,
    Phone,
}

/// Ordered matching decision between a candidate's text and a target
/// value. `phone` widens the rules with digit-substring comparison.
pub fn matches(candidate: &str, target: &str, phone: bool) -> Option<MatchQuality> {
    let a = normalize(candidate);
    let b = normalize(target);
    if a.is_empty() || b.is_empty() {
        if phone {
            let da = digits_only(candidate);
            let db = digits_only(target);
            if !db.is_empty() && da.contains(&db) {
                return Some(MatchQuality::Phone);
            }
        }
        return None;
    }
    if a == b {
        return Some(MatchQuality::Exact);
    }
    let multi_word = b.contains(' ');
    if multi_word && a.contains(&b) {
        return Some(MatchQuality::Phrase);
    }
    if multi_word {
        let candidate_words: Vec<&str> = a.split(' ').collect();
        let all_present = b.split(' ').all(|tw| {
            candidate_words
                .iter()
                .any(|cw| cw.starts_with(tw) || cw.ends_with(tw))
        });
        if all_present {
            return Some(MatchQuality::Bag);
        }
    }
    if phone {
        let da = digits_only(candidate);
        let db = digits_only(target);
        if !db.is_empty() && da.contains(&db) {
            return Some(MatchQuality::Phone);
        }
    }
    None
}

/// Containers whose descendants are never candidates. Walked up to five
/// ancestor levels against class/id/name tokens.
pub const EXCLUDED_SECTION_TOKENS: &[&str] = &[
    "country",
    "localization",
    "currency",
    "language",
    "region",
    "shipping-picker",
    "search",
    "filter",
    "sort",
    "breadcrumb",
    "navigation",
    "recommendation",
    "related",
    "you-may-also-like",
    "cookie",
];

/// Label tokens that disqualify a field for a given field kind: a
/// "first name" input that also says "last" belongs to somebody else.
pub fn cross_contamination(field: &FieldKind) -> &'static [&'static str] {
    match field {
        FieldKind::FirstName => &["last", "surname", "family"],
        FieldKind::LastName => &["first", "given"],
        FieldKind::Email => &["confirm", "phone"],
        FieldKind::Phone => &["email"],
        FieldKind::AddressLine1 => &["email", "line 2", "line2", "apartment", "landmark"],
        FieldKind::AddressLine2 => &["line 1", "line1", "email"],
        FieldKind::City => &["state", "country", "postal", "zip"],
        FieldKind::State => &["city", "country"],
        FieldKind::Postal => &["phone", "city"],
        FieldKind::Country => &["state", "city", "county"],
        FieldKind::Password => &["confirm", "current"],
        FieldKind::CardNumber => &["cvv", "cvc", "expiry", "expiration"],
        FieldKind::CardExpiry => &["number", "cvv", "cvc"],
        FieldKind::CardCvv => &["number", "expiry", "expiration"],
        _ => &[],
    }
}

/// True when a field label contains a token that belongs to a different
/// field kind.
pub fn label_contaminated(label: &str, field: &FieldKind) -> bool {
    let normalized = normalize(label);
    cross_contamination(field)
        .iter()
        .any(|tok| normalized.contains(&normalize(tok)))
}

/// Detected storefront family for selector boosting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFamily {
    Myntra,
    Amazon,
    Ajio,
    Flipkart,
    BigBasket,
    Swiggy,
    Patagonia,
    Generic,
}

impl StoreFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreFamily::Myntra => "myntra",
            StoreFamily::Amazon => "amazon",
            StoreFamily::Ajio => "ajio",
            StoreFamily::Flipkart => "flipkart",
            StoreFamily::BigBasket => "bigbasket",
            StoreFamily::Swiggy => "swiggy",
            StoreFamily::Patagonia => "patagonia",
            StoreFamily::Generic => "generic",
        }
    }
}

/// Classify a page URL into a storefront family. Unknown hosts are
/// `Generic`; a bad URL string is also `Generic`.
pub fn site_hint(page_url: &str) -> StoreFamily {
    let host = match url::Url::parse(page_url) {
        Ok(u) => u.host_str().unwrap_or_default().to_string(),
        Err(_) => return StoreFamily::Generic,
    };
    const TABLE: &[(&str, StoreFamily)] = &[
        ("myntra.com", StoreFamily::Myntra),
        ("amazon.", StoreFamily::Amazon),
        ("ajio.com", StoreFamily::Ajio),
        ("flipkart.com", StoreFamily::Flipkart),
        ("bigbasket.com", StoreFamily::BigBasket),
        ("swiggy.com", StoreFamily::Swiggy),
        ("patagonia.com", StoreFamily::Patagonia),
    ];
    for (needle, family) in TABLE {
        if host.contains(needle) {
            return *family;
        }
    }
    StoreFamily::Generic
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalize_collapses_and_strips() {
        assert_eq!(normalize("  Midnight   Blue!  "), "midnight blue");
        assert_eq!(normalize("T-Shirt (Large)"), "t-shirt large");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("- leading hyphen"), "leading hyphen");
    }

    #[test]
    fn normalize_strict_keeps_alphanumerics() {
        assert_eq!(normalize_strict("Midnight Blue #2"), "midnightblue2");
    }

    #[test]
    fn digits_only_strips_formatting() {
        assert_eq!(digits_only("+1 (415) 555-0142"), "14155550142");
    }

    #[test]
    fn matches_ordered_rules() {
        assert_eq!(
            matches("Midnight Blue", "midnight blue", false),
            Some(MatchQuality::Exact)
        );
        assert_eq!(
            matches("Color: Midnight Blue selected", "Midnight Blue", false),
            Some(MatchQuality::Phrase)
        );
        assert_eq!(
            matches("Blue (Midnight)", "Midnight Blue", false),
            Some(MatchQuality::Bag)
        );
        assert_eq!(matches("Forest", "Midnight Blue", false), None);
    }

    #[test]
    fn phone_rule_only_fires_for_phone_fields() {
        assert_eq!(matches("Tel: +1-415-555-0142", "4155550142", false), None);
        assert_eq!(
            matches("Tel: +1-415-555-0142", "4155550142", true),
            Some(MatchQuality::Phone)
        );
    }

    #[test]
    fn contamination_matrix_rejects_foreign_labels() {
        assert!(label_contaminated("First and Last Name", &FieldKind::FirstName));
        assert!(!label_contaminated("First Name", &FieldKind::FirstName));
        assert!(label_contaminated("Email or phone", &FieldKind::Email));
        assert!(!label_contaminated("Street address", &FieldKind::AddressLine1));
    }

    #[test]
    fn site_hint_maps_known_hosts() {
        assert_eq!(
            site_hint("https://www.myntra.com/p/123"),
            StoreFamily::Myntra
        );
        assert_eq!(site_hint("https://www.amazon.in/dp/X"), StoreFamily::Amazon);
        assert_eq!(site_hint("https://shop.example.com/"), StoreFamily::Generic);
        assert_eq!(site_hint("not a url"), StoreFamily::Generic);
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(s in ".{0,64}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn normalized_text_always_self_matches(s in "[a-zA-Z][a-zA-Z ]{0,24}") {
            prop_assume!(!normalize(&s).is_empty());
            prop_assert_eq!(matches(&s, &s, false), Some(MatchQuality::Exact));
        }

        #[test]
        fn digits_only_yields_digits(s in ".{0,64}") {
            prop_assert!(digits_only(&s).chars().all(|c| c.is_ascii_digit()));
        }
    }
}
