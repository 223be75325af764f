//! Control Discovery Model
//!
//! Pure functions that turn raw element facts collected from the rendered page
//! into `ControlDescriptor`s:
//!
//! - visibility/interactivity filtering
//! - structural fingerprinting (`tag|type|role|id|name|label`)
//! - re-selection key derivation (`id` → test id → stamped fingerprint token)
//! - closed `ControlKind` derivation
//! - per-pass deduplication by fingerprint
//!
//! The fingerprint must stay identical for the same logical control across
//! discovery passes and full page reloads, so it is built only from
//! structural attributes and never from the current value.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Longest text the in-page scan reports as a label.
const LABEL_TEXT_LIMIT: usize = 120;

/// Attribute stamped on elements that have neither a stable id nor a test id.
pub const FINGERPRINT_ATTR: &str = "data-sweep-fp";

/// Test identifier attribute preferred after `id`.
pub const TEST_ID_ATTR: &str = "data-testid";

// ============================================================================
// Raw element facts
// ============================================================================

/// Facts about one candidate element, as reported by the in-page scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawElement {
    /// Scan-local index used to address the element when stamping
    pub index: usize,
    pub tag: String,
    #[serde(rename = "type")]
    pub input_type: Option<String>,
    pub role: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    /// Accessible label (aria-label, associated label, placeholder or text)
    pub label: Option<String>,
    pub test_id: Option<String>,
    pub value: Option<String>,
    pub checked: Option<bool>,
    pub disabled: bool,
    pub content_editable: bool,
    /// Computed `display`
    pub display: String,
    /// Computed `visibility`
    pub visibility: String,
    /// Computed `opacity`
    pub opacity: f64,
    /// Bounding box width in CSS pixels
    pub width: f64,
    /// Bounding box height in CSS pixels
    pub height: f64,
    pub aria_hidden: bool,
    pub min: Option<String>,
    pub max: Option<String>,
    pub step: Option<String>,
    /// Option values for `<select>` elements
    pub options: Vec<String>,
}

impl RawElement {
    fn lower(value: &Option<String>) -> String {
        value.as_deref().unwrap_or("").trim().to_ascii_lowercase()
    }

    /// Buttons, inputs, selects, text areas, ARIA button/combobox/switch
    /// roles and editable regions. Hidden inputs never qualify.
    pub fn is_interactive_kind(&self) -> bool {
        let tag = self.tag.to_ascii_lowercase();
        if tag == "input" && Self::lower(&self.input_type) == "hidden" {
            return false;
        }
        if matches!(tag.as_str(), "button" | "input" | "select" | "textarea") {
            return true;
        }
        if self.content_editable {
            return true;
        }
        matches!(
            Self::lower(&self.role).as_str(),
            "button" | "combobox" | "switch"
        )
    }

    /// Editable regions and comboboxes render their current value as text.
    pub fn shows_value(&self) -> bool {
        self.content_editable || Self::lower(&self.role) == "combobox"
    }

    /// Accessible label, whitespace-collapsed. A value-showing element whose
    /// label is just its rendered value has no label, so its fingerprint
    /// survives edits.
    pub fn stable_label(&self) -> String {
        let label = collapse_whitespace(self.label.as_deref().unwrap_or(""));
        if self.shows_value() && !label.is_empty() {
            let value = collapse_whitespace(self.value.as_deref().unwrap_or(""));
            let truncated = label.chars().count() >= LABEL_TEXT_LIMIT && value.starts_with(&label);
            if label == value || truncated {
                return String::new();
            }
        }
        label
    }

    /// Non-zero box, not `display:none`, not `visibility:hidden`, not fully
    /// transparent and not `aria-hidden`.
    pub fn is_visible(&self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.display.trim() != "none"
            && self.visibility.trim() != "hidden"
            && self.opacity > 0.0
            && !self.aria_hidden
    }
}

// ============================================================================
// Control kind
// ============================================================================

/// Closed set of mutation policies, derived once at discovery time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlKind {
    /// Checkbox, radio or ARIA switch
    Checkbox,
    /// Range or number input with optional bounds
    Range {
        min: Option<f64>,
        max: Option<f64>,
        step: f64,
    },
    /// Free text entry
    Text { multiline: bool },
    /// `<select>` element
    Select,
    /// Anything else interactive: a single click, no persisted value
    Clickable,
}

impl ControlKind {
    fn derive(raw: &RawElement) -> Self {
        let tag = raw.tag.to_ascii_lowercase();
        let input_type = RawElement::lower(&raw.input_type);
        let role = RawElement::lower(&raw.role);

        match tag.as_str() {
            "input" => match input_type.as_str() {
                "checkbox" | "radio" => ControlKind::Checkbox,
                "range" | "number" => ControlKind::Range {
                    min: parse_number(raw.min.as_deref()),
                    max: parse_number(raw.max.as_deref()),
                    step: parse_number(raw.step.as_deref())
                        .filter(|s| *s > 0.0)
                        .unwrap_or(1.0),
                },
                "button" | "submit" | "reset" | "image" | "file" | "color" | "date"
                | "datetime-local" | "month" | "time" | "week" => ControlKind::Clickable,
                _ => ControlKind::Text { multiline: false },
            },
            "textarea" => ControlKind::Text { multiline: true },
            "select" => ControlKind::Select,
            _ if raw.content_editable => ControlKind::Text { multiline: true },
            _ if role == "switch" => ControlKind::Checkbox,
            _ => ControlKind::Clickable,
        }
    }

    /// Short name used in logs and action labels.
    pub fn name(&self) -> &'static str {
        match self {
            ControlKind::Checkbox => "checkbox",
            ControlKind::Range { .. } => "range",
            ControlKind::Text { .. } => "text",
            ControlKind::Select => "select",
            ControlKind::Clickable => "clickable",
        }
    }
}

/// Parse a numeric attribute, ignoring blanks and garbage.
pub fn parse_number(value: Option<&str>) -> Option<f64> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

// ============================================================================
// Descriptor
// ============================================================================

/// Immutable snapshot of one interactive control at discovery time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    pub fingerprint: String,
    pub selector: String,
    pub tag: String,
    #[serde(rename = "type")]
    pub control_type: String,
    pub role: String,
    pub id: String,
    pub name: String,
    pub label: String,
    pub test_id: String,
    pub value: Option<String>,
    pub checked: Option<bool>,
    pub disabled: bool,
    pub visible: bool,
    pub option_values: Vec<String>,
    pub kind: ControlKind,
}

impl ControlDescriptor {
    /// Build a descriptor from raw facts. Returns `None` for elements that are
    /// not visible or not of an interactive kind.
    pub fn from_raw(raw: &RawElement) -> Option<Self> {
        if !raw.is_interactive_kind() || !raw.is_visible() {
            return None;
        }

        let tag = raw.tag.to_ascii_lowercase();
        let control_type = RawElement::lower(&raw.input_type);
        let role = RawElement::lower(&raw.role);
        let id = raw.id.as_deref().unwrap_or("").trim().to_string();
        let name = raw.name.as_deref().unwrap_or("").trim().to_string();
        let label = raw.stable_label();
        let test_id = raw.test_id.as_deref().unwrap_or("").trim().to_string();

        let fingerprint = fingerprint(&tag, &control_type, &role, &id, &name, &label);
        let selector = derive_selector(&id, &test_id, &fingerprint);

        let mut option_values = Vec::new();
        for option in &raw.options {
            if !option_values.contains(option) {
                option_values.push(option.clone());
            }
        }

        Some(Self {
            kind: ControlKind::derive(raw),
            fingerprint,
            selector,
            tag,
            control_type,
            role,
            id,
            name,
            label,
            test_id,
            value: raw.value.clone(),
            checked: raw.checked,
            disabled: raw.disabled,
            visible: true,
            option_values,
        })
    }

    /// The value a reader of this control would observe, as a string.
    /// Checkable controls report their checked state.
    pub fn current_value(&self) -> String {
        match self.kind {
            ControlKind::Checkbox => self.checked.unwrap_or(false).to_string(),
            _ => self.value.clone().unwrap_or_default(),
        }
    }

    /// Text the classifier matches lexicons against.
    pub fn classification_text(&self) -> String {
        normalize(&format!(
            "{} {} {} {} {} {}",
            self.tag, self.control_type, self.role, self.id, self.name, self.label
        ))
    }

    /// Whether this control identifies a logical setting (`id` or `name`).
    pub fn has_logical_identity(&self) -> bool {
        !self.id.is_empty() || !self.name.is_empty()
    }

    /// Whether `other` renders the same logical setting.
    pub fn mirrors(&self, other: &ControlDescriptor) -> bool {
        (!self.id.is_empty() && self.id == other.id)
            || (!self.name.is_empty() && self.name == other.name)
    }

    /// Whether the selector relies on the stamped fingerprint attribute.
    pub fn uses_stamp(&self) -> bool {
        self.selector.starts_with(&format!("[{}=", FINGERPRINT_ATTR))
    }
}

// ============================================================================
// Normalization, fingerprint, selector
// ============================================================================

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase and whitespace-collapse.
pub fn normalize(text: &str) -> String {
    collapse_whitespace(&text.to_lowercase())
}

/// Structural key `tag|type|role|id|name|label`, normalized.
pub fn fingerprint(
    tag: &str,
    control_type: &str,
    role: &str,
    id: &str,
    name: &str,
    label: &str,
) -> String {
    [tag, control_type, role, id, name, label]
        .iter()
        .map(|part| normalize(part))
        .collect::<Vec<_>>()
        .join("|")
}

/// Deterministic token stamped into [`FINGERPRINT_ATTR`].
pub fn fingerprint_token(fingerprint: &str) -> String {
    let digest = Sha256::digest(fingerprint.as_bytes());
    digest
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn is_css_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn escape_attr(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Prefer a stable `id`, then the test identifier, then the stamped token.
pub fn derive_selector(id: &str, test_id: &str, fingerprint: &str) -> String {
    if !id.is_empty() {
        if is_css_identifier(id) {
            return format!("#{}", id);
        }
        return format!("[id=\"{}\"]", escape_attr(id));
    }
    if !test_id.is_empty() {
        return format!("[{}=\"{}\"]", TEST_ID_ATTR, escape_attr(test_id));
    }
    format!(
        "[{}=\"{}\"]",
        FINGERPRINT_ATTR,
        fingerprint_token(fingerprint)
    )
}

/// Filter raw elements and keep one descriptor per fingerprint, preserving
/// document order.
pub fn discover_controls(raw: &[RawElement]) -> Vec<(usize, ControlDescriptor)> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(|r| ControlDescriptor::from_raw(r).map(|d| (r.index, d)))
        .filter(|(_, d)| seen.insert(d.fingerprint.clone()))
        .collect()
}
