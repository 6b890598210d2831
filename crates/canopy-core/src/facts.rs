#![forbid(unsafe_code)]

//! Facts: attributes, styles, properties, and event handlers on a node.
//!
//! A node is declared with a flat list of [`Fact`]s. [`Facts::organize`]
//! partitions that list once, at construction, into one ordered map per
//! [`FactKind`], so diffing two nodes is a key-by-key walk instead of a list
//! scan.
//!
//! Duplicates never fail. A later fact with the same name overwrites an
//! earlier one, except for the class-like facts (the `className` property and
//! the `class` attribute), whose values are joined with a single space.

use std::collections::BTreeMap;
use std::fmt;

use crate::event::Handler;

/// Property name whose values accumulate instead of overwriting.
pub const CLASS_PROPERTY: &str = "className";
/// Attribute name whose values accumulate instead of overwriting.
pub const CLASS_ATTRIBUTE: &str = "class";

/// Syntactic category of a fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FactKind {
    Event,
    Style,
    Property,
    Attribute,
    AttributeNs,
}

impl FactKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Style => "style",
            Self::Property => "property",
            Self::Attribute => "attribute",
            Self::AttributeNs => "attribute-ns",
        }
    }
}

/// Value of a property fact.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Value of a namespaced attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsValue {
    pub namespace: String,
    pub value: String,
}

/// One declared fact, before organization.
pub enum Fact<Msg> {
    Event {
        name: String,
        handler: Handler<Msg>,
    },
    Style {
        name: String,
        value: String,
    },
    Property {
        name: String,
        value: PropValue,
    },
    Attribute {
        name: String,
        value: String,
    },
    AttributeNs {
        namespace: String,
        name: String,
        value: String,
    },
}

impl<Msg> fmt::Debug for Fact<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event { name, handler } => write!(f, "on:{name}={handler:?}"),
            Self::Style { name, value } => write!(f, "style:{name}={value:?}"),
            Self::Property { name, value } => write!(f, "prop:{name}={value:?}"),
            Self::Attribute { name, value } => write!(f, "{name}={value:?}"),
            Self::AttributeNs {
                namespace,
                name,
                value,
            } => write!(f, "{{{namespace}}}{name}={value:?}"),
        }
    }
}

impl<Msg> Fact<Msg> {
    pub fn on(name: impl Into<String>, handler: Handler<Msg>) -> Self {
        Self::Event {
            name: name.into(),
            handler,
        }
    }

    pub fn style(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Style {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn property(name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        Self::Property {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Attribute {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn attribute_ns(
        namespace: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::AttributeNs {
            namespace: namespace.into(),
            name: name.into(),
            value: value.into(),
        }
    }

    /// Shorthand for a `class` attribute. Repeated uses accumulate.
    pub fn class(value: impl Into<String>) -> Self {
        Self::attribute(CLASS_ATTRIBUTE, value)
    }

    #[inline]
    pub fn kind(&self) -> FactKind {
        match self {
            Self::Event { .. } => FactKind::Event,
            Self::Style { .. } => FactKind::Style,
            Self::Property { .. } => FactKind::Property,
            Self::Attribute { .. } => FactKind::Attribute,
            Self::AttributeNs { .. } => FactKind::AttributeNs,
        }
    }
}

/// Organized fact table: one ordered map per [`FactKind`].
pub struct Facts<Msg> {
    events: BTreeMap<String, Handler<Msg>>,
    styles: BTreeMap<String, String>,
    properties: BTreeMap<String, PropValue>,
    attributes: BTreeMap<String, String>,
    attributes_ns: BTreeMap<String, NsValue>,
}

impl<Msg> Default for Facts<Msg> {
    fn default() -> Self {
        Self {
            events: BTreeMap::new(),
            styles: BTreeMap::new(),
            properties: BTreeMap::new(),
            attributes: BTreeMap::new(),
            attributes_ns: BTreeMap::new(),
        }
    }
}

impl<Msg> fmt::Debug for Facts<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, handler) in &self.events {
            map.entry(&format_args!("on:{name}"), &handler.kind());
        }
        for (name, value) in &self.styles {
            map.entry(&format_args!("style:{name}"), value);
        }
        for (name, value) in &self.properties {
            map.entry(&format_args!("prop:{name}"), value);
        }
        for (name, value) in &self.attributes {
            map.entry(&format_args!("{name}"), value);
        }
        for (name, value) in &self.attributes_ns {
            map.entry(&format_args!("{{{}}}{name}", value.namespace), &value.value);
        }
        map.finish()
    }
}

fn add_class(map: &mut BTreeMap<String, String>, name: String, class: String) {
    match map.get_mut(&name) {
        Some(existing) => {
            existing.push(' ');
            existing.push_str(&class);
        }
        None => {
            map.insert(name, class);
        }
    }
}

impl<Msg> Facts<Msg> {
    /// Partition a declared fact list into per-kind maps.
    pub fn organize(facts: impl IntoIterator<Item = Fact<Msg>>) -> Self {
        let mut table = Self::default();
        for fact in facts {
            match fact {
                Fact::Event { name, handler } => {
                    table.events.insert(name, handler);
                }
                Fact::Style { name, value } => {
                    table.styles.insert(name, value);
                }
                Fact::Property { name, value } => match value {
                    PropValue::Str(class) if name == CLASS_PROPERTY => {
                        match table.properties.get_mut(&name) {
                            Some(PropValue::Str(existing)) => {
                                existing.push(' ');
                                existing.push_str(&class);
                            }
                            _ => {
                                table.properties.insert(name, PropValue::Str(class));
                            }
                        }
                    }
                    value => {
                        table.properties.insert(name, value);
                    }
                },
                Fact::Attribute { name, value } => {
                    if name == CLASS_ATTRIBUTE {
                        add_class(&mut table.attributes, name, value);
                    } else {
                        table.attributes.insert(name, value);
                    }
                }
                Fact::AttributeNs {
                    namespace,
                    name,
                    value,
                } => {
                    table
                        .attributes_ns
                        .insert(name, NsValue { namespace, value });
                }
            }
        }
        table
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
            && self.styles.is_empty()
            && self.properties.is_empty()
            && self.attributes.is_empty()
            && self.attributes_ns.is_empty()
    }

    /// Total number of distinct facts across all kinds.
    pub fn len(&self) -> usize {
        self.events.len()
            + self.styles.len()
            + self.properties.len()
            + self.attributes.len()
            + self.attributes_ns.len()
    }

    #[inline]
    pub fn events(&self) -> &BTreeMap<String, Handler<Msg>> {
        &self.events
    }

    #[inline]
    pub fn styles(&self) -> &BTreeMap<String, String> {
        &self.styles
    }

    #[inline]
    pub fn properties(&self) -> &BTreeMap<String, PropValue> {
        &self.properties
    }

    #[inline]
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    #[inline]
    pub fn attributes_ns(&self) -> &BTreeMap<String, NsValue> {
        &self.attributes_ns
    }
}
