#![forbid(unsafe_code)]

//! Fact table diffing.
//!
//! Two organized tables are compared kind by kind, key by key. The result
//! lists only the keys that changed: additions and updates carry the new
//! value, removals carry what the applier needs to undo the old one.
//!
//! `value` and `checked` properties are live on the real surface (user input
//! changes them behind the tree's back), so they are re-sent whenever the new
//! table has them, even when the virtual value did not change.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::rc::Rc;

use canopy_core::{FactKind, Facts, Handler, NsValue, PropValue};

const LIVE_PROPERTIES: [&str; 2] = ["value", "checked"];

/// Identity of one fact: its kind plus its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactKey {
    pub kind: FactKind,
    pub name: String,
}

/// Change to a single fact. `None` means the fact was removed.
pub enum FactChange<Msg> {
    Event(Option<Handler<Msg>>),
    /// Removal reverts the style to its default.
    Style(Option<String>),
    Property(Option<PropValue>),
    Attribute(Option<String>),
    /// Removal keeps the namespace of the removed attribute. A set that
    /// moves the attribute to another namespace carries the old one in
    /// `replaces`, which must be removed first.
    AttributeNs {
        namespace: String,
        value: Option<String>,
        replaces: Option<String>,
    },
}

impl<Msg> FactChange<Msg> {
    pub fn is_removal(&self) -> bool {
        match self {
            Self::Event(h) => h.is_none(),
            Self::Style(v) | Self::Attribute(v) => v.is_none(),
            Self::Property(v) => v.is_none(),
            Self::AttributeNs { value, .. } => value.is_none(),
        }
    }
}

impl<Msg> fmt::Debug for FactChange<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(Some(h)) => write!(f, "Set({:?})", h.kind()),
            Self::Style(Some(v)) | Self::Attribute(Some(v)) => write!(f, "Set({v:?})"),
            Self::Property(Some(v)) => write!(f, "Set({v:?})"),
            Self::AttributeNs {
                namespace,
                value: Some(v),
                replaces: None,
            } => write!(f, "Set({{{namespace}}}{v:?})"),
            Self::AttributeNs {
                namespace,
                value: Some(v),
                replaces: Some(old),
            } => write!(f, "Moved({{{old}}} -> {{{namespace}}}{v:?})"),
            Self::AttributeNs {
                namespace,
                value: None,
                ..
            } => write!(f, "Removed({{{namespace}}})"),
            Self::Event(None) | Self::Style(None) | Self::Property(None) | Self::Attribute(None) => {
                f.write_str("Removed")
            }
        }
    }
}

/// Changed facts between two tables, ordered by kind then name.
pub struct FactDiff<Msg> {
    changes: BTreeMap<FactKey, FactChange<Msg>>,
}

impl<Msg> Default for FactDiff<Msg> {
    fn default() -> Self {
        Self {
            changes: BTreeMap::new(),
        }
    }
}

impl<Msg> fmt::Debug for FactDiff<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.changes
                    .iter()
                    .map(|(key, change)| (format!("{}:{}", key.kind.as_str(), key.name), change)),
            )
            .finish()
    }
}

impl<Msg> FactDiff<Msg> {
    #[inline]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn get(&self, kind: FactKind, name: &str) -> Option<&FactChange<Msg>> {
        self.changes.get(&FactKey {
            kind,
            name: name.to_owned(),
        })
    }

    pub fn iter(&self) -> btree_map::Iter<'_, FactKey, FactChange<Msg>> {
        self.changes.iter()
    }

    /// Number of keys the diff removes.
    pub fn removals(&self) -> usize {
        self.changes.values().filter(|c| c.is_removal()).count()
    }

    fn record(&mut self, kind: FactKind, name: &str, change: FactChange<Msg>) {
        self.changes.insert(
            FactKey {
                kind,
                name: name.to_owned(),
            },
            change,
        );
    }
}

impl<'a, Msg> IntoIterator for &'a FactDiff<Msg> {
    type Item = (&'a FactKey, &'a FactChange<Msg>);
    type IntoIter = btree_map::Iter<'a, FactKey, FactChange<Msg>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn diff_map<V, Msg>(
    out: &mut FactDiff<Msg>,
    kind: FactKind,
    old: &BTreeMap<String, V>,
    new: &BTreeMap<String, V>,
    same: impl Fn(&str, &V, &V) -> bool,
    set: impl Fn(&V) -> FactChange<Msg>,
    remove: impl Fn(&V) -> FactChange<Msg>,
) {
    for (name, old_value) in old {
        match new.get(name) {
            None => out.record(kind, name, remove(old_value)),
            Some(new_value) if !same(name, old_value, new_value) => {
                out.record(kind, name, set(new_value));
            }
            Some(_) => {}
        }
    }
    for (name, new_value) in new {
        if !old.contains_key(name) {
            out.record(kind, name, set(new_value));
        }
    }
}

/// Diff two fact tables. Returns `None` when nothing changed.
pub fn diff_facts<Msg>(old: &Rc<Facts<Msg>>, new: &Rc<Facts<Msg>>) -> Option<FactDiff<Msg>> {
    if Rc::ptr_eq(old, new) {
        return None;
    }

    let mut out = FactDiff::default();
    diff_map(
        &mut out,
        FactKind::Event,
        old.events(),
        new.events(),
        |_, a, b| a.same(b),
        |h| FactChange::Event(Some(h.clone())),
        |_| FactChange::Event(None),
    );
    diff_map(
        &mut out,
        FactKind::Style,
        old.styles(),
        new.styles(),
        |_, a, b| a == b,
        |v| FactChange::Style(Some(v.clone())),
        |_| FactChange::Style(None),
    );
    diff_map(
        &mut out,
        FactKind::Property,
        old.properties(),
        new.properties(),
        |name, a, b| a == b && !LIVE_PROPERTIES.contains(&name),
        |v| FactChange::Property(Some(v.clone())),
        |_| FactChange::Property(None),
    );
    diff_map(
        &mut out,
        FactKind::Attribute,
        old.attributes(),
        new.attributes(),
        |_, a, b| a == b,
        |v| FactChange::Attribute(Some(v.clone())),
        |_| FactChange::Attribute(None),
    );
    diff_map(
        &mut out,
        FactKind::AttributeNs,
        old.attributes_ns(),
        new.attributes_ns(),
        |_, a: &NsValue, b: &NsValue| a == b,
        |v| FactChange::AttributeNs {
            namespace: v.namespace.clone(),
            value: Some(v.value.clone()),
            replaces: None,
        },
        |v| FactChange::AttributeNs {
            namespace: v.namespace.clone(),
            value: None,
            replaces: None,
        },
    );
    // Same name, different namespace: the surface holds two distinct
    // attributes, so the old one has to go.
    for (name, old_value) in old.attributes_ns() {
        let Some(new_value) = new.attributes_ns().get(name) else {
            continue;
        };
        if new_value.namespace != old_value.namespace {
            out.record(
                FactKind::AttributeNs,
                name,
                FactChange::AttributeNs {
                    namespace: new_value.namespace.clone(),
                    value: Some(new_value.value.clone()),
                    replaces: Some(old_value.namespace.clone()),
                },
            );
        }
    }

    if out.is_empty() { None } else { Some(out) }
}
