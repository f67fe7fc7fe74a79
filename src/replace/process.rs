//! Execution engine: the composed mutation an [`Operation`] applies to a record.
//!
//! A [`Process`] is built once per operation and layered the same way the
//! target field is nested: a member [`Step`] (the atomic edit, broadcast over
//! the occurrences of a repeatable field), optionally wrapped to reach inside
//! a parent object or inside every occurrence of a repeatable parent, itself
//! optionally filtered on the `type` discriminator of each occurrence.
//!
//! Replace, remove and clear never allocate: a missing field or container
//! means there is nothing to do. Injection creates whatever is missing.
//!
//! [`Operation`]: crate::replace::Operation

use crate::record::{Composite, Record, Value};
use crate::replace::field::TYPE_SUBFIELD;

/// Edit applied to a single scalar occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Edit {
    /// Substitute every occurrence of `search` inside the text.
    Substring { search: String, replace: String },
    /// Assign `replace` when the whole value equals `search`.
    WholeValue { search: String, replace: String },
}

impl Edit {
    fn apply(&self, value: &mut Value) -> bool {
        let Value::Text(text) = value else {
            return false;
        };
        match self {
            Self::Substring { search, replace } => {
                if search.is_empty() || !text.contains(search.as_str()) {
                    return false;
                }
                let replaced = text.replace(search.as_str(), replace);
                if replaced == *text {
                    return false;
                }
                *text = replaced;
                true
            }
            Self::WholeValue { search, replace } => {
                if text != search || replace == search {
                    return false;
                }
                text.clone_from(replace);
                true
            }
        }
    }
}

/// Adds a value to a field unless it is already there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Injection {
    pub(crate) name: String,
    pub(crate) value: String,
    pub(crate) repeatable: bool,
}

impl Injection {
    /// Whether `container` already holds the injected value.
    fn exists(&self, container: &Composite) -> bool {
        match container.get(&self.name) {
            None => false,
            Some(Value::List(items)) if self.repeatable => {
                items.iter().any(|item| item.is_text(&self.value))
            }
            Some(value) => !self.repeatable && value.is_text(&self.value),
        }
    }

    fn apply(&self, container: &mut Composite) -> bool {
        if self.exists(container) {
            return false;
        }
        let value = Value::from(self.value.as_str());
        if !self.repeatable {
            container.insert(self.name.clone(), value);
            return true;
        }
        match container
            .entry(self.name.clone())
            .or_insert_with(|| Value::List(Vec::new()))
        {
            Value::List(items) => {
                items.push(value);
                true
            }
            _ => false,
        }
    }
}

/// Mutation of one named member of a container (the record or an object).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    /// Edit the member, or each of its occurrences when it is repeatable.
    Edit {
        name: String,
        repeatable: bool,
        edit: Edit,
    },
    /// Remove the member when it holds anything.
    Clear { name: String },
    Inject(Injection),
}

impl Step {
    fn apply(&self, container: &mut Composite) -> bool {
        match self {
            Self::Edit {
                name,
                repeatable,
                edit,
            } => match container.get_mut(name) {
                None => false,
                Some(Value::List(items)) if *repeatable => {
                    // Visit every occurrence, no short-circuit.
                    items
                        .iter_mut()
                        .fold(false, |changed, item| edit.apply(item) | changed)
                }
                Some(value) if !*repeatable => edit.apply(value),
                Some(_) => false,
            },
            Self::Clear { name } => {
                if container.get(name).is_none_or(Value::is_empty) {
                    return false;
                }
                container.remove(name);
                true
            }
            Self::Inject(injection) => injection.apply(container),
        }
    }
}

/// The full mutation, entered from the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Process {
    /// The target is a record-root field.
    Member(Step),
    /// The target is a sub-field of the non-repeatable object `name`.
    Parent { name: String, step: Step },
    /// The target is a sub-field of each occurrence of the repeatable object
    /// `name`, restricted to the occurrences whose `type` equals `condition`.
    Occurrences {
        name: String,
        condition: Option<String>,
        step: Step,
    },
}

impl Process {
    /// Apply to `record`, returning whether anything changed.
    pub(crate) fn apply(&self, record: &mut Record) -> bool {
        let fields = &mut record.fields;
        match self {
            Self::Member(step) => step.apply(fields),
            Self::Parent {
                name,
                step: Step::Inject(injection),
            } => match fields.entry(name.clone()).or_insert_with(Value::object) {
                Value::Object(parent) => injection.apply(parent),
                _ => false,
            },
            Self::Parent { name, step } => fields
                .get_mut(name)
                .and_then(Value::as_object_mut)
                .is_some_and(|parent| step.apply(parent)),
            Self::Occurrences {
                name,
                condition,
                step: Step::Inject(injection),
            } => match fields
                .entry(name.clone())
                .or_insert_with(|| Value::List(Vec::new()))
            {
                Value::List(items) => inject_occurrence(items, condition.as_deref(), injection),
                _ => false,
            },
            Self::Occurrences {
                name,
                condition,
                step,
            } => {
                let Some(Value::List(items)) = fields.get_mut(name) else {
                    return false;
                };
                items
                    .iter_mut()
                    .filter_map(Value::as_object_mut)
                    .filter(|item| matches_condition(item, condition.as_deref()))
                    .fold(false, |changed, item| step.apply(item) | changed)
            }
        }
    }
}

fn matches_condition(item: &Composite, condition: Option<&str>) -> bool {
    condition.is_none_or(|condition| {
        item.get(TYPE_SUBFIELD)
            .is_some_and(|kind| kind.is_text(condition))
    })
}

/// Inject into a repeatable parent.
///
/// Nothing happens if an eligible occurrence already holds the value. A
/// repeatable payload joins the first occurrence of the right type; anything
/// else gets a new occurrence, pre-typed when a condition is set.
fn inject_occurrence(items: &mut Vec<Value>, condition: Option<&str>, injection: &Injection) -> bool {
    let mut first = None;
    for (index, item) in items.iter().enumerate() {
        let Some(item) = item.as_object() else {
            continue;
        };
        if !matches_condition(item, condition) {
            continue;
        }
        if injection.exists(item) {
            return false;
        }
        first.get_or_insert(index);
    }

    if let (Some(index), Some(_), true) = (first, condition, injection.repeatable) {
        if let Some(item) = items[index].as_object_mut() {
            return injection.apply(item);
        }
    }

    let mut occurrence = Composite::new();
    if let Some(condition) = condition {
        occurrence.insert(TYPE_SUBFIELD.to_owned(), Value::from(condition));
    }
    injection.apply(&mut occurrence);
    items.push(Value::Object(occurrence));
    true
}
