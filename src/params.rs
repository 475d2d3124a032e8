//! Request parameters sent to the Tickspot API.
//!
//! Every operation builds an ordered list of named fields on top of the
//! credentials. A field can be left unset (`None`), in which case it is not
//! transmitted at all. Unset is not the same as falsy: `0`, `false` and the
//! empty string are all sent. The API relies on this for partial updates,
//! e.g. `update_entry` with only `billed` present.

use std::fmt;

use url::form_urlencoded;

/// A scalar form value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{}", s),
            Self::Int(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Text(value.to_string()), Self::Int)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Ordered field name -> optional value mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    fields: Vec<(&'static str, Option<ParamValue>)>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any earlier value under the same name.
    pub fn insert<V: Into<ParamValue>>(&mut self, name: &'static str, value: Option<V>) {
        let value = value.map(Into::into);
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<V: Into<ParamValue>>(mut self, name: &'static str, value: Option<V>) -> Self {
        self.insert(name, value);
        self
    }

    /// Value of a field that will be transmitted.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Fields that will be transmitted, in insertion order.
    pub fn present(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> + '_ {
        self.fields
            .iter()
            .filter_map(|(name, value)| value.as_ref().map(|v| (*name, v)))
    }

    /// Names of the transmitted fields, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.present().map(|(name, _)| name).collect()
    }

    /// `application/x-www-form-urlencoded` encoding, unset fields dropped.
    pub fn to_form(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, value) in self.present() {
            serializer.append_pair(name, &value.to_string());
        }
        serializer.finish()
    }
}
