//! Inspector-facing property descriptors.
//!
//! Every component exposes an ordered table of named descriptors; the editor
//! renders them without knowing the component variant and writes values back
//! through `set_property`. The caller converts UI strings per descriptor kind
//! before passing a [`PropValue`].

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl PropValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        PropValue::Number(v)
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Text(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::Text(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Number,
    Range,
    Select,
    Checkbox,
    Text,
}

#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub value: PropValue,
    pub label: Option<String>,
    pub kind: PropertyKind,
    pub options: Vec<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    pub readonly: bool,
    pub disabled: bool,
    pub title: Option<String>,
}

impl PropertyDescriptor {
    fn base(kind: PropertyKind, value: PropValue) -> Self {
        Self {
            value,
            label: None,
            kind,
            options: Vec::new(),
            min: None,
            max: None,
            step: None,
            readonly: false,
            disabled: false,
            title: None,
        }
    }

    pub fn number(value: f64) -> Self {
        Self::base(PropertyKind::Number, PropValue::Number(value))
    }

    pub fn range(value: f64, min: f64, max: f64, step: f64) -> Self {
        let mut d = Self::base(PropertyKind::Range, PropValue::Number(value));
        d.min = Some(min);
        d.max = Some(max);
        d.step = Some(step);
        d
    }

    pub fn select(value: &str, options: &[&str]) -> Self {
        let mut d = Self::base(PropertyKind::Select, PropValue::Text(value.to_string()));
        d.options = options.iter().map(|o| o.to_string()).collect();
        d
    }

    pub fn checkbox(value: bool) -> Self {
        Self::base(PropertyKind::Checkbox, PropValue::Bool(value))
    }

    pub fn text(value: &str) -> Self {
        Self::base(PropertyKind::Text, PropValue::Text(value.to_string()))
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }
}

/// Ordered name → descriptor map. Iteration order is declaration order, which
/// the inspector renders top to bottom.
#[derive(Debug, Clone, Default)]
pub struct PropertyTable {
    entries: Vec<(String, PropertyDescriptor)>,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, name: &str, descriptor: PropertyDescriptor) -> Self {
        self.entries.push((name.to_string(), descriptor));
        self
    }

    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyDescriptor)> {
        self.entries.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PropertyError {
    #[error("unknown property `{name}`")]
    Unknown { name: String },
    #[error("property `{name}` expects a {expected} value")]
    TypeMismatch {
        name: String,
        expected: &'static str,
    },
    #[error("property `{name}` rejected value: {reason}")]
    Invalid { name: String, reason: String },
}

impl PropertyError {
    pub fn unknown(name: &str) -> Self {
        Self::Unknown {
            name: name.to_string(),
        }
    }

    pub fn expects_number(name: &str) -> Self {
        Self::TypeMismatch {
            name: name.to_string(),
            expected: "number",
        }
    }

    pub fn expects_bool(name: &str) -> Self {
        Self::TypeMismatch {
            name: name.to_string(),
            expected: "boolean",
        }
    }

    pub fn expects_text(name: &str) -> Self {
        Self::TypeMismatch {
            name: name.to_string(),
            expected: "text",
        }
    }
}

/// Extract a finite number or report a type mismatch.
pub fn number_arg(name: &str, value: &PropValue) -> Result<f64, PropertyError> {
    let v = value.as_f64().ok_or_else(|| PropertyError::expects_number(name))?;
    if !v.is_finite() {
        return Err(PropertyError::Invalid {
            name: name.to_string(),
            reason: "must be finite".to_string(),
        });
    }
    Ok(v)
}

pub fn bool_arg(name: &str, value: &PropValue) -> Result<bool, PropertyError> {
    value.as_bool().ok_or_else(|| PropertyError::expects_bool(name))
}

pub fn text_arg<'v>(name: &str, value: &'v PropValue) -> Result<&'v str, PropertyError> {
    value.as_str().ok_or_else(|| PropertyError::expects_text(name))
}
