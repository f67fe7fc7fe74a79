//! Field model and field registry.
//!
//! Fields live in an arena owned by [`Fields`]; a [`FieldId`] is an index into
//! it and the parent link is just another index. A field is created detached
//! and then attached either as a record-root field ([`Fields::add_field`]) or
//! as the child of an object field ([`Fields::add_child`]).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BatchError, BatchResult};

/// Name of the discriminator sub-field of a typed container.
pub const TYPE_SUBFIELD: &str = "type";

/// Name of the payload sub-field shared by all variants of a typed container.
pub const VALUE_SUBFIELD: &str = "value";

/// Content kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Holds sub-fields only; not eligible for search/replace.
    Object,
    /// Search tests whether the text contains the searched string.
    Text,
    /// Search tests whether the whole value equals the searched string.
    Value,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Object => "object",
            Self::Text => "text",
            Self::Value => "value",
        };
        f.write_str(name)
    }
}

/// Handle to a field stored in a [`Fields`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(usize);

/// Binding of a typed field to the real payload field it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Typed {
    /// Discriminator value selecting the occurrences this field addresses.
    pub(crate) condition: String,
    /// The shared `value` sub-field of the typed container.
    pub(crate) real: FieldId,
}

/// One addressable field.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    kind: FieldKind,
    repeatable: bool,
    parent: Option<FieldId>,
    children: BTreeMap<String, FieldId>,
    pub(crate) typed: Option<Typed>,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_object(&self) -> bool {
        self.kind == FieldKind::Object
    }

    pub fn is_text(&self) -> bool {
        self.kind == FieldKind::Text
    }

    pub fn is_value(&self) -> bool {
        self.kind == FieldKind::Value
    }

    pub fn is_repeatable(&self) -> bool {
        self.repeatable
    }

    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    pub fn parent(&self) -> Option<FieldId> {
        self.parent
    }

    pub fn has_fields(&self) -> bool {
        !self.children.is_empty()
    }

    /// Discriminator value, for typed fields.
    pub fn condition(&self) -> Option<&str> {
        self.typed.as_ref().map(|t| t.condition.as_str())
    }
}

/// How [`Fields::select_options`] presents fields that have sub-fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionLayout {
    /// Sub-fields listed in place of their parent.
    #[default]
    Flat,
    /// One group per parent field.
    Grouped,
}

/// An entry of the field picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SelectOption {
    Field { key: String, label: String },
    Group { label: String, options: Vec<SelectOption> },
}

/// Registry of the fields available for search/replace.
#[derive(Debug, Clone, Default)]
pub struct Fields {
    nodes: Vec<Field>,
    roots: BTreeMap<String, FieldId>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached field.
    pub fn create(&mut self, name: &str, kind: FieldKind, repeatable: bool) -> FieldId {
        self.push(Field {
            name: name.to_owned(),
            kind,
            repeatable,
            parent: None,
            children: BTreeMap::new(),
            typed: None,
        })
    }

    pub(crate) fn push(&mut self, field: Field) -> FieldId {
        let id = FieldId(self.nodes.len());
        self.nodes.push(field);
        id
    }

    pub(crate) fn create_typed(&mut self, condition: &str, real: FieldId) -> FieldId {
        let (kind, repeatable) = {
            let real = self.get(real);
            (real.kind, real.repeatable)
        };
        let id = self.create(condition, kind, repeatable);
        self.nodes[id.0].typed = Some(Typed {
            condition: condition.to_owned(),
            real,
        });
        id
    }

    /// Borrow a field.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by another registry.
    pub fn get(&self, id: FieldId) -> &Field {
        &self.nodes[id.0]
    }

    /// Register a record-root field.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::DuplicateField`] if a root field has the same name.
    pub fn add_field(&mut self, field: FieldId) -> BatchResult<()> {
        let name = self.get(field).name.clone();
        if self.roots.contains_key(&name) {
            return Err(BatchError::DuplicateField { name });
        }
        self.roots.insert(name, field);
        Ok(())
    }

    /// Attach `child` below the object field `parent`.
    ///
    /// # Errors
    ///
    /// Fails if `parent` is not an object, if it already has a child with
    /// the same name, or if `child` is already attached somewhere.
    pub fn add_child(&mut self, parent: FieldId, child: FieldId) -> BatchResult<()> {
        if !self.get(parent).is_object() {
            return Err(BatchError::NotAnObject {
                key: self.key(parent),
            });
        }
        let name = self.get(child).name.clone();
        if self.get(parent).children.contains_key(&name) {
            return Err(BatchError::DuplicateField { name });
        }
        if self.get(child).has_parent() {
            return Err(BatchError::AlreadyHasParent {
                key: self.key(child),
            });
        }
        self.nodes[parent.0].children.insert(name, child);
        self.nodes[child.0].parent = Some(parent);
        Ok(())
    }

    pub fn has_fields(&self) -> bool {
        !self.roots.is_empty()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.roots.contains_key(name)
    }

    /// Look up a root field by name.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::FieldNotFound`] if there is no such field.
    pub fn field(&self, name: &str) -> BatchResult<FieldId> {
        self.roots
            .get(name)
            .copied()
            .ok_or_else(|| BatchError::FieldNotFound {
                name: name.to_owned(),
            })
    }

    pub fn has_child(&self, parent: FieldId, name: &str) -> bool {
        self.get(parent).children.contains_key(name)
    }

    /// Look up a sub-field by name.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::FieldNotFound`] if `parent` has no such child.
    pub fn child(&self, parent: FieldId, name: &str) -> BatchResult<FieldId> {
        self.get(parent)
            .children
            .get(name)
            .copied()
            .ok_or_else(|| BatchError::FieldNotFound {
                name: name.to_owned(),
            })
    }

    /// Root fields, ordered by name.
    pub fn roots(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.roots.values().copied()
    }

    /// Sub-fields of `parent`, ordered by name.
    pub fn children(&self, parent: FieldId) -> impl Iterator<Item = FieldId> + '_ {
        self.get(parent).children.values().copied()
    }

    /// Resolve a dotted key such as `objects.text` or `topic/type.free`.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::UnknownField`] naming the whole key if any
    /// segment does not exist.
    pub fn resolve(&self, key: &str) -> BatchResult<FieldId> {
        let unknown = || BatchError::UnknownField {
            name: key.to_owned(),
        };
        let mut parts = key.split('.');
        let first = parts.next().ok_or_else(unknown)?;
        let mut id = self.roots.get(first).copied().ok_or_else(unknown)?;
        for part in parts {
            id = self
                .get(id)
                .children
                .get(part)
                .copied()
                .ok_or_else(unknown)?;
        }
        Ok(id)
    }

    /// Dot-joined path from the root: `parent.name`, or `name` for a root field.
    pub fn key(&self, id: FieldId) -> String {
        let field = self.get(id);
        match field.parent {
            Some(parent) => format!("{}.{}", self.key(parent), field.name),
            None => field.name.clone(),
        }
    }

    /// Number of ancestors of the field (0 for a root field).
    pub fn depth(&self, id: FieldId) -> usize {
        let mut depth = 0;
        let mut current = self.get(id).parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.get(parent).parent;
        }
        depth
    }

    /// Human label: the key followed by a content/repeatability descriptor.
    pub fn label(&self, id: FieldId) -> String {
        let field = self.get(id);
        let key = self.key(id);
        let descriptor = match (field.kind, field.repeatable) {
            (FieldKind::Object, false) => return key,
            (FieldKind::Object, true) => "repeatable",
            (FieldKind::Text, false) => "text",
            (FieldKind::Text, true) => "texts",
            (FieldKind::Value, false) => "value",
            (FieldKind::Value, true) => "values",
        };
        format!("{key} ({descriptor})")
    }

    /// Whether search/replace can target the field.
    pub(crate) fn is_selectable(&self, id: FieldId) -> bool {
        !self.get(id).is_object() && self.depth(id) <= 1
    }

    /// Fields as picker options, sorted by key at every level.
    ///
    /// Object fields never appear as options themselves and fields below the
    /// second nesting level are left out.
    pub fn select_options(&self, layout: OptionLayout) -> Vec<SelectOption> {
        let mut options = Vec::new();
        for id in self.roots() {
            self.collect_options(id, layout, &mut options);
        }
        options
    }

    fn collect_options(&self, id: FieldId, layout: OptionLayout, out: &mut Vec<SelectOption>) {
        let field = self.get(id);
        if field.has_fields() {
            match layout {
                OptionLayout::Flat => {
                    for child in self.children(id) {
                        self.collect_options(child, layout, out);
                    }
                }
                OptionLayout::Grouped => {
                    let mut options = Vec::new();
                    for child in self.children(id) {
                        self.collect_options(child, layout, &mut options);
                    }
                    if !options.is_empty() {
                        out.push(SelectOption::Group {
                            label: self.label(id),
                            options,
                        });
                    }
                }
            }
            return;
        }
        if !self.is_selectable(id) {
            debug!(field = %self.key(id), "field not offered for search/replace");
            return;
        }
        out.push(SelectOption::Field {
            key: self.key(id),
            label: self.label(id),
        });
    }
}
