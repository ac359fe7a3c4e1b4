//! Fields: atomic, named value holders on a block.
//!
//! [`Field::set_from_string`] is the canonical mutator. It rejects input it
//! cannot parse, and notifies registered observers exactly once with the
//! old and new serialized values when (and only when) the value changes.

use chrono::NaiveDate;
use std::fmt;

/// One entry of a dropdown: text shown to the user and the stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct DropdownOption {
    pub display: String,
    pub value: String,
}

/// Typed field payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Static text; never serialized.
    Label { text: String },
    /// Free-form text input.
    Text { text: String },
    Checkbox { checked: bool },
    Number {
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
        precision: Option<f64>,
    },
    /// Degrees, normalized to `[0, 360)`.
    Angle { degrees: f64 },
    /// Lowercase `#rrggbb`.
    Colour { rgb: String },
    Date { date: NaiveDate },
    Dropdown {
        options: Vec<DropdownOption>,
        selected: usize,
    },
    /// `None` once the referenced variable has been deleted.
    Variable { name: Option<String> },
    /// Static image; never serialized.
    Image {
        src: String,
        width: f32,
        height: f32,
        alt: String,
    },
}

/// Payload delivered to field observers.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub type FieldObserver = Box<dyn FnMut(&FieldChange)>;

/// A named value holder with its own observer list.
pub struct Field {
    name: String,
    value: FieldValue,
    observers: Vec<(ObserverId, FieldObserver)>,
    next_observer: u64,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Copies carry the value only; observers stay with the original.
impl Clone for Field {
    fn clone(&self) -> Self {
        Self::new(self.name.clone(), self.value.clone())
    }
}

impl Field {
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// JSON definition type name of this field.
    pub fn type_name(&self) -> &'static str {
        match self.value {
            FieldValue::Label { .. } => "field_label",
            FieldValue::Text { .. } => "field_input",
            FieldValue::Checkbox { .. } => "field_checkbox",
            FieldValue::Number { .. } => "field_number",
            FieldValue::Angle { .. } => "field_angle",
            FieldValue::Colour { .. } => "field_colour",
            FieldValue::Date { .. } => "field_date",
            FieldValue::Dropdown { .. } => "field_dropdown",
            FieldValue::Variable { .. } => "field_variable",
            FieldValue::Image { .. } => "field_image",
        }
    }

    /// Labels and images are decoration and are not written to XML.
    pub fn is_serializable(&self) -> bool {
        !matches!(
            self.value,
            FieldValue::Label { .. } | FieldValue::Image { .. }
        )
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.value, FieldValue::Variable { .. })
    }

    /// The referenced variable name, for variable fields.
    pub fn variable(&self) -> Option<&str> {
        match &self.value {
            FieldValue::Variable { name } => name.as_deref(),
            _ => None,
        }
    }

    /// The serialized form of the current value.
    pub fn serialized_value(&self) -> String {
        match &self.value {
            FieldValue::Label { text } | FieldValue::Text { text } => text.clone(),
            FieldValue::Checkbox { checked } => {
                if *checked { "TRUE" } else { "FALSE" }.to_string()
            }
            FieldValue::Number { value, .. } => format_number(*value),
            FieldValue::Angle { degrees } => format_number(*degrees),
            FieldValue::Colour { rgb } => rgb.clone(),
            FieldValue::Date { date } => date.format("%Y-%m-%d").to_string(),
            FieldValue::Dropdown { options, selected } => options
                .get(*selected)
                .map(|o| o.value.clone())
                .unwrap_or_default(),
            FieldValue::Variable { name } => name.clone().unwrap_or_default(),
            FieldValue::Image { src, .. } => src.clone(),
        }
    }

    /// Parse and store a serialized value.
    ///
    /// Returns `false` and leaves the field untouched when `text` cannot be
    /// parsed for this field type. Observers fire only if the stored value
    /// actually changed.
    pub fn set_from_string(&mut self, text: &str) -> bool {
        let Some(parsed) = self.parse(text) else {
            return false;
        };
        self.replace_value(parsed);
        true
    }

    /// Detach a variable field from its variable. Returns `true` if the
    /// field referenced a variable before.
    pub fn clear_variable(&mut self) -> bool {
        if self.variable().is_none() {
            return false;
        }
        self.replace_value(FieldValue::Variable { name: None });
        true
    }

    /// Register an observer. Observers are called in registration order.
    pub fn register_observer(&mut self, observer: FieldObserver) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, observer));
        id
    }

    pub fn unregister_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        before != self.observers.len()
    }

    fn replace_value(&mut self, value: FieldValue) {
        let old_value = self.serialized_value();
        let old = std::mem::replace(&mut self.value, value);
        let new_value = self.serialized_value();
        if old == self.value || old_value == new_value {
            return;
        }
        let change = FieldChange {
            field: self.name.clone(),
            old_value,
            new_value,
        };
        for (_, observer) in self.observers.iter_mut() {
            observer(&change);
        }
    }

    fn parse(&self, text: &str) -> Option<FieldValue> {
        match &self.value {
            FieldValue::Label { .. } => Some(FieldValue::Label {
                text: text.to_string(),
            }),
            FieldValue::Text { .. } => Some(FieldValue::Text {
                text: text.to_string(),
            }),
            FieldValue::Checkbox { .. } => {
                let trimmed = text.trim();
                if trimmed.eq_ignore_ascii_case("true") {
                    Some(FieldValue::Checkbox { checked: true })
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Some(FieldValue::Checkbox { checked: false })
                } else {
                    None
                }
            }
            FieldValue::Number {
                min,
                max,
                precision,
                ..
            } => {
                let raw: f64 = text.trim().parse().ok()?;
                if !raw.is_finite() {
                    return None;
                }
                Some(FieldValue::Number {
                    value: constrain_number(raw, *min, *max, *precision),
                    min: *min,
                    max: *max,
                    precision: *precision,
                })
            }
            FieldValue::Angle { .. } => {
                let raw: f64 = text.trim().parse().ok()?;
                if !raw.is_finite() {
                    return None;
                }
                Some(FieldValue::Angle {
                    degrees: normalize_angle(raw),
                })
            }
            FieldValue::Colour { .. } => parse_colour(text).map(|rgb| FieldValue::Colour { rgb }),
            FieldValue::Date { .. } => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                .ok()
                .map(|date| FieldValue::Date { date }),
            FieldValue::Dropdown { options, .. } => {
                let selected = options.iter().position(|o| o.value == text)?;
                Some(FieldValue::Dropdown {
                    options: options.clone(),
                    selected,
                })
            }
            FieldValue::Variable { .. } => {
                if text.trim().is_empty() {
                    None
                } else {
                    Some(FieldValue::Variable {
                        name: Some(text.to_string()),
                    })
                }
            }
            FieldValue::Image { width, height, alt, .. } => Some(FieldValue::Image {
                src: text.to_string(),
                width: *width,
                height: *height,
                alt: alt.clone(),
            }),
        }
    }
}

/// Normalize degrees into `[0, 360)`.
pub fn normalize_angle(degrees: f64) -> f64 {
    let d = degrees % 360.0;
    let d = if d < 0.0 { d + 360.0 } else { d };
    // Tiny negative inputs round up to exactly 360.
    if d >= 360.0 { 0.0 } else { d }
}

fn constrain_number(value: f64, min: Option<f64>, max: Option<f64>, precision: Option<f64>) -> f64 {
    let mut v = value;
    if let Some(p) = precision.filter(|p| *p > 0.0) {
        v = (v / p).round() * p;
        // Trim the binary noise left by the multiplication.
        let decimals = format_number(p)
            .split_once('.')
            .map(|(_, frac)| frac.len())
            .unwrap_or(0);
        v = format!("{:.*}", decimals, v).parse().unwrap_or(v);
    }
    if let Some(lo) = min {
        v = v.max(lo);
    }
    if let Some(hi) = max {
        v = v.min(hi);
    }
    v
}

/// Integers print without a fractional part (`5`, not `5.0`).
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn parse_colour(text: &str) -> Option<String> {
    let hex = text.trim().strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => Some(format!("#{}", hex.to_ascii_lowercase())),
        3 => {
            let expanded: String = hex
                .chars()
                .flat_map(|c| [c, c])
                .collect::<String>()
                .to_ascii_lowercase();
            Some(format!("#{}", expanded))
        }
        _ => None,
    }
}
