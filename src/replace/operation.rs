//! Operation factory.
//!
//! An [`Operation`] binds one field to a search/replace pair and carries the
//! pre-built [`Process`] that performs it. [`Fields::operation`] picks the
//! [`Behavior`] from the field kind and from which of the two strings are set:
//!
//! | search | replace | behavior |
//! |--------|---------|----------|
//! | empty  | empty   | clear    |
//! | empty  | set     | inject   |
//! | set    | empty   | remove   |
//! | set    | set     | replace  |

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::{BatchError, BatchResult};
use crate::record::Record;
use crate::replace::field::{FieldId, FieldKind, Fields};
use crate::replace::process::{Edit, Injection, Process, Step};

/// What an operation does, independently of the field it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Replace,
    Remove,
    Inject,
    Clear,
}

impl OperationKind {
    /// Select the kind from which strings are non-empty.
    pub fn select(search: &str, replace: &str) -> Self {
        match (search.is_empty(), replace.is_empty()) {
            (true, true) => Self::Clear,
            (true, false) => Self::Inject,
            (false, true) => Self::Remove,
            (false, false) => Self::Replace,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Replace => "replace",
            Self::Remove => "remove",
            Self::Inject => "inject",
            Self::Clear => "clear",
        };
        f.write_str(name)
    }
}

/// One of the eight concrete behaviors: an [`OperationKind`] for a text or a
/// value field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Behavior {
    ClearText,
    InjectText,
    RemoveText,
    ReplaceText,
    ClearValue,
    InjectValue,
    RemoveValue,
    ReplaceValue,
}

impl Behavior {
    /// Behavior for a field of `kind`; object fields have none.
    pub fn select(kind: FieldKind, search: &str, replace: &str) -> Option<Self> {
        let operation = OperationKind::select(search, replace);
        let behavior = match (kind, operation) {
            (FieldKind::Object, _) => return None,
            (FieldKind::Text, OperationKind::Clear) => Self::ClearText,
            (FieldKind::Text, OperationKind::Inject) => Self::InjectText,
            (FieldKind::Text, OperationKind::Remove) => Self::RemoveText,
            (FieldKind::Text, OperationKind::Replace) => Self::ReplaceText,
            (FieldKind::Value, OperationKind::Clear) => Self::ClearValue,
            (FieldKind::Value, OperationKind::Inject) => Self::InjectValue,
            (FieldKind::Value, OperationKind::Remove) => Self::RemoveValue,
            (FieldKind::Value, OperationKind::Replace) => Self::ReplaceValue,
        };
        Some(behavior)
    }

    /// Kind of field the behavior can be built against.
    pub fn field_kind(self) -> FieldKind {
        match self {
            Self::ClearText | Self::InjectText | Self::RemoveText | Self::ReplaceText => {
                FieldKind::Text
            }
            Self::ClearValue | Self::InjectValue | Self::RemoveValue | Self::ReplaceValue => {
                FieldKind::Value
            }
        }
    }

    pub fn kind(self) -> OperationKind {
        match self {
            Self::ClearText | Self::ClearValue => OperationKind::Clear,
            Self::InjectText | Self::InjectValue => OperationKind::Inject,
            Self::RemoveText | Self::RemoveValue => OperationKind::Remove,
            Self::ReplaceText | Self::ReplaceValue => OperationKind::Replace,
        }
    }
}

/// A configured search/replace bound to one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    behavior: Behavior,
    field: String,
    search: String,
    replace: String,
    condition: Option<String>,
    explanation: String,
    process: Process,
}

impl Operation {
    /// Build `behavior` against field `id` of `fields`.
    ///
    /// Strings the behavior ignores are dropped: a clear keeps neither, an
    /// injection has no search string and a removal has no replacement.
    /// Typed fields are resolved to the shared payload field they stand for,
    /// with the discriminator as condition.
    ///
    /// # Errors
    ///
    /// - [`BatchError::InvalidFieldType`] if the field kind does not match the
    ///   behavior.
    /// - [`BatchError::NestingTooDeep`] if the target field sits below its
    ///   parent's parent.
    pub fn new(
        fields: &Fields,
        id: FieldId,
        behavior: Behavior,
        search: &str,
        replace: &str,
    ) -> BatchResult<Self> {
        let field = fields.get(id);
        if field.kind() != behavior.field_kind() {
            return Err(BatchError::InvalidFieldType {
                key: fields.key(id),
            });
        }

        let (search, replace) = match behavior.kind() {
            OperationKind::Clear => (String::new(), String::new()),
            OperationKind::Inject => (String::new(), replace.to_owned()),
            OperationKind::Remove => (search.to_owned(), String::new()),
            OperationKind::Replace => (search.to_owned(), replace.to_owned()),
        };

        let (target, condition) = match &field.typed {
            Some(typed) => (typed.real, Some(typed.condition.clone())),
            None => (id, None),
        };
        let process = build_process(fields, target, behavior, &search, &replace, condition.clone())?;
        let explanation = explain(behavior.kind(), &search, &replace, &fields.label(id));
        debug!(field = %fields.key(id), ?behavior, "operation built");

        Ok(Self {
            behavior,
            field: fields.key(id),
            search,
            replace,
            condition,
            explanation,
            process,
        })
    }

    /// Replace the default explanation.
    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    pub fn kind(&self) -> OperationKind {
        self.behavior.kind()
    }

    /// Key of the field the operation was built for.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn replace(&self) -> &str {
        &self.replace
    }

    /// Discriminator restricting the visited occurrences, for typed fields.
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Apply to `record`; returns whether the record was modified.
    pub fn process(&self, record: &mut Record) -> bool {
        self.process.apply(record)
    }
}

impl Fields {
    /// Build the operation matching `search` and `replace` for field `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::SearchReplaceNotAllowed`] for object fields, and
    /// the errors of [`Operation::new`].
    pub fn operation(&self, id: FieldId, search: &str, replace: &str) -> BatchResult<Operation> {
        let behavior = Behavior::select(self.get(id).kind(), search, replace).ok_or_else(|| {
            BatchError::SearchReplaceNotAllowed { key: self.key(id) }
        })?;
        Operation::new(self, id, behavior, search, replace)
    }
}

fn build_process(
    fields: &Fields,
    id: FieldId,
    behavior: Behavior,
    search: &str,
    replace: &str,
    condition: Option<String>,
) -> BatchResult<Process> {
    if fields.depth(id) > 1 {
        return Err(BatchError::NestingTooDeep {
            key: fields.key(id),
        });
    }

    let field = fields.get(id);
    let name = field.name().to_owned();
    let repeatable = field.is_repeatable();
    let step = match behavior {
        Behavior::ClearText | Behavior::ClearValue => Step::Clear { name },
        Behavior::InjectText | Behavior::InjectValue => Step::Inject(Injection {
            name,
            value: replace.to_owned(),
            repeatable,
        }),
        Behavior::RemoveText | Behavior::ReplaceText => Step::Edit {
            name,
            repeatable,
            edit: Edit::Substring {
                search: search.to_owned(),
                replace: replace.to_owned(),
            },
        },
        Behavior::RemoveValue | Behavior::ReplaceValue => Step::Edit {
            name,
            repeatable,
            edit: Edit::WholeValue {
                search: search.to_owned(),
                replace: replace.to_owned(),
            },
        },
    };

    let Some(parent) = field.parent() else {
        return Ok(Process::Member(step));
    };
    let parent = fields.get(parent);
    let name = parent.name().to_owned();
    if parent.is_repeatable() {
        Ok(Process::Occurrences {
            name,
            condition,
            step,
        })
    } else {
        Ok(Process::Parent { name, step })
    }
}

/// Default wording shown to the user before running an operation.
fn explain(kind: OperationKind, search: &str, replace: &str, label: &str) -> String {
    match kind {
        OperationKind::Replace => {
            format!("Replace \"{search}\" with \"{replace}\" in field {label}.")
        }
        OperationKind::Remove => format!("Remove \"{search}\" from field {label}."),
        OperationKind::Inject => format!("Inject \"{replace}\" into field {label}."),
        OperationKind::Clear => format!("Clear field {label}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replace::testing::{test_fields, typed_builder};

    #[test]
    fn test_dispatch_table() {
        let fields = test_fields();
        let text = fields.field("text").expect("text");
        let values = fields.field("values").expect("values");

        let cases = [
            (text, "", "", Behavior::ClearText),
            (text, "", "x", Behavior::InjectText),
            (text, "x", "", Behavior::RemoveText),
            (text, "x", "y", Behavior::ReplaceText),
            (values, "", "", Behavior::ClearValue),
            (values, "", "x", Behavior::InjectValue),
            (values, "x", "", Behavior::RemoveValue),
            (values, "x", "y", Behavior::ReplaceValue),
        ];
        for (id, search, replace, expected) in cases {
            let operation = fields.operation(id, search, replace).expect("operation");
            assert_eq!(operation.behavior(), expected, "{search:?} {replace:?}");
        }
    }

    #[test]
    fn test_object_field_is_rejected() {
        let fields = test_fields();
        let objects = fields.field("objects").expect("objects");

        let err = fields.operation(objects, "a", "b").expect_err("error");
        assert!(matches!(err, BatchError::SearchReplaceNotAllowed { ref key } if key == "objects"));
    }

    #[test]
    fn test_behavior_field_kind_guard() {
        let fields = test_fields();
        let value = fields.field("value").expect("value");

        let err = Operation::new(&fields, value, Behavior::ReplaceText, "a", "b").expect_err("error");
        assert_eq!(err.to_string(), "invalid field type for operation on \"value\"");
    }

    #[test]
    fn test_strings_are_normalized() {
        let fields = test_fields();
        let text = fields.field("text").expect("text");

        let clear = Operation::new(&fields, text, Behavior::ClearText, "a", "b").expect("clear");
        assert_eq!((clear.search(), clear.replace()), ("", ""));

        let inject = Operation::new(&fields, text, Behavior::InjectText, "a", "b").expect("inject");
        assert_eq!((inject.search(), inject.replace()), ("", "b"));

        let remove = Operation::new(&fields, text, Behavior::RemoveText, "a", "b").expect("remove");
        assert_eq!((remove.search(), remove.replace()), ("a", ""));
    }

    #[test]
    fn test_explanations() {
        let fields = test_fields();
        let text = fields.field("text").expect("text");
        let values = fields.resolve("objects.values").expect("objects.values");

        let explain = |id, search, replace| {
            fields
                .operation(id, search, replace)
                .expect("operation")
                .explanation()
                .to_owned()
        };
        assert_eq!(explain(text, "", ""), "Clear field text (text).");
        assert_eq!(explain(text, "", "ES"), "Inject \"ES\" into field text (text).");
        assert_eq!(explain(text, "es", ""), "Remove \"es\" from field text (text).");
        assert_eq!(
            explain(values, "a", "b"),
            "Replace \"a\" with \"b\" in field objects.values (values)."
        );

        let custom = fields
            .operation(text, "", "")
            .expect("operation")
            .with_explanation("custom");
        assert_eq!(custom.explanation(), "custom");
    }

    #[test]
    fn test_typed_operation_targets_real_field() {
        let builder = typed_builder("typedText");
        let fields = builder.fields();
        let one = fields.resolve("typedText/type.one").expect("typed");

        let operation = fields.operation(one, "a", "b").expect("operation");
        assert_eq!(operation.condition(), Some("one"));
        assert_eq!(operation.field(), "typedText/type.one");
        assert_eq!(
            operation.explanation(),
            "Replace \"a\" with \"b\" in field typedText/type.one (text)."
        );
    }

    #[test]
    fn test_nesting_too_deep() {
        let mut fields = Fields::new();
        let address = fields.create("address", FieldKind::Object, false);
        fields.add_field(address).expect("add");
        let street = fields.create("street", FieldKind::Object, false);
        fields.add_child(address, street).expect("attach");
        let name = fields.create("name", FieldKind::Text, false);
        fields.add_child(street, name).expect("attach");

        let err = fields.operation(name, "a", "b").expect_err("error");
        assert!(matches!(err, BatchError::NestingTooDeep { ref key } if key == "address.street.name"));
    }
}
