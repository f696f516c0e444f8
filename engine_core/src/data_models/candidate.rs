use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Coarse element classification carried by every candidate. A button
/// outranks a generic div at equal text score, so the tag survives all
/// the way into scoring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Button,
    Link,
    Input,
    Select,
    Radio,
    Checkbox,
    Label,
    Swatch,
    Option,
    Generic,
}

impl Default for ElementKind {
    fn default() -> Self {
        ElementKind::Generic
    }
}

/// Everything textual we can read off an element without touching layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextBag {
    pub text: String,
    pub aria_label: String,
    pub title: String,
    pub value: String,
    pub alt: String,
    pub placeholder: String,
    pub name: String,
    pub id: String,
    pub class_name: String,
    pub data_attrs: HashMap<String, String>,
}

impl TextBag {
    /// All textual signals joined, in match-priority order.
    pub fn joined(&self) -> String {
        let mut parts: Vec<&str> = vec![
            &self.text,
            &self.aria_label,
            &self.title,
            &self.value,
            &self.alt,
            &self.placeholder,
            &self.name,
            &self.id,
            &self.class_name,
        ];
        parts.retain(|p| !p.is_empty());
        let mut joined = parts.join(" ");
        for v in self.data_attrs.values() {
            if !v.is_empty() {
                joined.push(' ');
                joined.push_str(v);
            }
        }
        joined
    }

    /// The best human-visible label, for outcome reporting.
    pub fn display(&self) -> &str {
        for s in [
            &self.text,
            &self.aria_label,
            &self.value,
            &self.title,
            &self.alt,
        ] {
            if !s.is_empty() {
                return s;
            }
        }
        ""
    }
}

/// Position snapshot taken at scoring time. Stale for clicking: the
/// executor re-acquires geometry immediately before any pointer event.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub in_viewport: bool,
    pub obscured: bool,
}

impl Geometry {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn has_area(&self) -> bool {
        self.w > 0.0 && self.h > 0.0
    }
}

/// A live element the cascade has identified and annotated. The opaque
/// handle is the `data-dom-el` marker value the search payload wrote;
/// candidates never outlive one attempt of one intent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CandidateElement {
    pub element_index: i64,
    pub frame: usize,
    pub kind: ElementKind,
    pub tag_name: String,
    pub text_bag: TextBag,
    pub geometry: Geometry,
    pub interactive: bool,
    pub score: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_skips_empty_signals() {
        let bag = TextBag {
            text: "Add to Cart".into(),
            class_name: "btn primary".into(),
            ..TextBag::default()
        };
        let joined = bag.joined();
        assert_eq!(joined, "Add to Cart btn primary");
    }

    #[test]
    fn display_prefers_visible_text() {
        let bag = TextBag {
            text: "".into(),
            aria_label: "Select Midnight Blue".into(),
            value: "mb-01".into(),
            ..TextBag::default()
        };
        assert_eq!(bag.display(), "Select Midnight Blue");
    }

    #[test]
    fn geometry_center_and_area() {
        let g = Geometry {
            x: 10.0,
            y: 20.0,
            w: 100.0,
            h: 40.0,
            ..Geometry::default()
        };
        assert_eq!(g.center(), (60.0, 40.0));
        assert!(g.has_area());
        assert!(!Geometry::default().has_area());
    }

    #[test]
    fn candidate_deserializes_from_payload_shape() {
        let raw = serde_json::json!({
            "elementIndex": 3,
            "kind": "button",
            "tagName": "BUTTON",
            "textBag": { "text": "Checkout", "className": "cta" },
            "geometry": { "x": 1.0, "y": 2.0, "w": 80.0, "h": 30.0, "inViewport": true },
            "interactive": true,
            "score": 110
        });
        let c: CandidateElement = serde_json::from_value(raw).expect("deserialize");
        assert_eq!(c.kind, ElementKind::Button);
        assert_eq!(c.text_bag.text, "Checkout");
        assert!(c.geometry.in_viewport);
    }
}
