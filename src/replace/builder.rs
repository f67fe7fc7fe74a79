//! Builds the field registry by reflecting over record schemas.

use tracing::debug;

use crate::error::{BatchError, BatchResult};
use crate::record::Record;
use crate::replace::field::{FieldId, FieldKind, Fields, TYPE_SUBFIELD, VALUE_SUBFIELD};
use crate::schema::{Schema, SchemaField, SchemaKind, SchemaSource};

/// Accumulates the fields of one or more record schemas.
///
/// A field already present by name at the same level is skipped along with
/// its sub-fields, so the first schema declaring a field defines it.
#[derive(Debug, Clone, Default)]
pub struct FieldsBuilder {
    fields: Fields,
}

impl FieldsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }

    /// Add the fields of `schema`.
    ///
    /// # Errors
    ///
    /// Fails if the schema declares sub-fields below a non-composite field.
    pub fn add_fields_from_schema(&mut self, schema: &Schema) -> BatchResult<()> {
        debug!(schema = schema.name, "adding schema fields");
        self.add_fields(&schema.fields, None)
    }

    /// Add the fields of the schema of `record`'s type.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::UnknownRecordType`] if the record has no type
    /// or `source` has no schema for it.
    pub fn add_fields_from_record<S>(&mut self, record: &Record, source: &S) -> BatchResult<()>
    where
        S: SchemaSource + ?Sized,
    {
        let record_type = record.record_type().unwrap_or_default();
        let schema = source
            .schema(record_type)
            .ok_or_else(|| BatchError::UnknownRecordType(record_type.to_owned()))?;
        self.add_fields_from_schema(schema)
    }

    fn add_fields(&mut self, schema_fields: &[SchemaField], parent: Option<FieldId>) -> BatchResult<()> {
        for schema_field in schema_fields {
            let exists = match parent {
                Some(parent) => self.fields.has_child(parent, &schema_field.name),
                None => self.fields.has_field(&schema_field.name),
            };
            if exists {
                continue;
            }

            let field = self.fields.create(
                &schema_field.name,
                kind_of(schema_field.kind),
                schema_field.collection,
            );
            match parent {
                Some(parent) => self.fields.add_child(parent, field)?,
                None => self.fields.add_field(field)?,
            }

            if schema_field.has_fields() {
                self.add_fields(&schema_field.fields, Some(field))?;
            }
        }
        Ok(())
    }

    /// Register one typed field per discriminator code under `<base>/type`.
    ///
    /// `base` must be a repeatable object field with a `type` and a `value`
    /// sub-field. Each typed field addresses the `value` sub-field of the
    /// occurrences whose `type` equals its code.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::TypedFields`] describing the first unmet
    /// precondition.
    pub fn add_typed_fields<I, S>(&mut self, base: &str, codes: I) -> BatchResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let invalid = |reason: &str| BatchError::TypedFields {
            field: base.to_owned(),
            reason: reason.to_owned(),
        };

        let base_id = self
            .fields
            .field(base)
            .map_err(|_| invalid("field not found"))?;
        let base_field = self.fields.get(base_id);
        if !base_field.is_repeatable() {
            return Err(invalid("field is not repeatable"));
        }
        if !base_field.is_object() {
            return Err(invalid("field is not an object"));
        }
        if !self.fields.has_child(base_id, TYPE_SUBFIELD) {
            return Err(invalid("field has no \"type\" sub-field"));
        }
        let real = self
            .fields
            .child(base_id, VALUE_SUBFIELD)
            .map_err(|_| invalid("field has no \"value\" sub-field"))?;

        let group_name = format!("{base}/{TYPE_SUBFIELD}");
        let group = if let Ok(group) = self.fields.field(&group_name) {
            group
        } else {
            let group = self.fields.create(&group_name, FieldKind::Object, false);
            self.fields.add_field(group)?;
            group
        };

        for code in codes {
            let code = code.as_ref();
            if self.fields.has_child(group, code) {
                continue;
            }
            let typed = self.fields.create_typed(code, real);
            self.fields.add_child(group, typed)?;
            debug!(field = group_name, code, "typed field added");
        }
        Ok(())
    }
}

/// Map a declared schema kind to a field content kind.
fn kind_of(kind: SchemaKind) -> FieldKind {
    match kind {
        SchemaKind::Composite => FieldKind::Object,
        SchemaKind::Text => FieldKind::Text,
        SchemaKind::Enumerated | SchemaKind::Date | SchemaKind::Other => FieldKind::Value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replace::testing::{test_schema, typed_builder};

    fn check(fields: &Fields, parent: Option<FieldId>, name: &str, kind: FieldKind, repeatable: bool) {
        let id = match parent {
            Some(parent) => fields.child(parent, name).expect("child"),
            None => fields.field(name).expect("field"),
        };
        let field = fields.get(id);
        assert_eq!(field.kind(), kind, "{name}");
        assert_eq!(field.is_repeatable(), repeatable, "{name}");
        assert_eq!(field.parent(), parent, "{name}");
    }

    #[test]
    fn test_add_fields_from_schema() {
        let mut builder = FieldsBuilder::new();
        builder.add_fields_from_schema(&test_schema()).expect("build");
        let fields = builder.fields();

        check(fields, None, "text", FieldKind::Text, false);
        check(fields, None, "texts", FieldKind::Text, true);
        check(fields, None, "value", FieldKind::Value, false);
        check(fields, None, "values", FieldKind::Value, true);
        check(fields, None, "object", FieldKind::Object, false);
        check(fields, None, "objects", FieldKind::Object, true);

        for (parent, repeatable) in [("object", false), ("objects", true)] {
            let parent = fields.field(parent).expect("parent");
            assert_eq!(fields.get(parent).is_repeatable(), repeatable);
            check(fields, Some(parent), "text", FieldKind::Text, false);
            check(fields, Some(parent), "texts", FieldKind::Text, true);
            check(fields, Some(parent), "value", FieldKind::Value, false);
            check(fields, Some(parent), "values", FieldKind::Value, true);
        }
    }

    #[test]
    fn test_date_and_other_kinds_are_values() {
        let schema = Schema::new("t")
            .with_field(SchemaField::new("creation", SchemaKind::Date))
            .with_field(SchemaField::new("misc", SchemaKind::Other));
        let mut builder = FieldsBuilder::new();
        builder.add_fields_from_schema(&schema).expect("build");

        check(builder.fields(), None, "creation", FieldKind::Value, false);
        check(builder.fields(), None, "misc", FieldKind::Value, false);
    }

    #[test]
    fn test_duplicate_fields_are_skipped() {
        let mut builder = FieldsBuilder::new();
        builder.add_fields_from_schema(&test_schema()).expect("build");
        let before = builder.fields().field("objects").expect("objects");
        let text_before = builder.fields().resolve("objects.text").expect("objects.text");

        let other = Schema::new("other")
            .with_field(SchemaField::new("text", SchemaKind::Text))
            .with_field(
                SchemaField::new("objects", SchemaKind::Composite)
                    .repeatable()
                    .with_field(SchemaField::new("extra", SchemaKind::Text)),
            );
        builder.add_fields_from_schema(&test_schema()).expect("rebuild");
        builder.add_fields_from_schema(&other).expect("merge");

        let fields = builder.fields();
        assert_eq!(fields.field("objects").expect("objects"), before);
        assert_eq!(fields.resolve("objects.text").expect("objects.text"), text_before);
        assert!(fields.resolve("objects.extra").is_err());
        assert_eq!(fields.children(before).count(), 4);
    }

    #[test]
    fn test_sub_fields_below_non_composite_fail() {
        let schema = Schema::new("bad").with_field(
            SchemaField::new("title", SchemaKind::Text)
                .with_field(SchemaField::new("lang", SchemaKind::Enumerated)),
        );
        let err = FieldsBuilder::new().add_fields_from_schema(&schema).expect_err("error");
        assert!(err.to_string().contains("\"title\" is not an object"));
    }

    #[test]
    fn test_add_typed_fields() {
        let builder = typed_builder("typedText");
        let fields = builder.fields();

        let group = fields.field("typedText/type").expect("group");
        assert!(fields.get(group).is_object());
        let one = fields.child(group, "one").expect("one");
        assert_eq!(fields.key(one), "typedText/type.one");
        assert_eq!(fields.label(one), "typedText/type.one (text)");
        assert_eq!(fields.get(one).condition(), Some("one"));
        assert_eq!(fields.children(group).count(), 3);
    }

    #[test]
    fn test_add_typed_fields_is_idempotent() {
        let mut builder = typed_builder("typedValues");
        builder
            .add_typed_fields("typedValues", ["two", "four"])
            .expect("merge codes");

        let fields = builder.fields();
        let group = fields.field("typedValues/type").expect("group");
        let names: Vec<&str> = fields.children(group).map(|id| fields.get(id).name()).collect();
        assert_eq!(names, ["four", "one", "three", "two"]);
        let four = fields.child(group, "four").expect("four");
        assert_eq!(fields.get(four).kind(), FieldKind::Value);
        assert!(fields.get(four).is_repeatable());
    }

    #[test]
    fn test_add_typed_fields_preconditions() {
        let mut builder = FieldsBuilder::new();
        builder.add_fields_from_schema(&test_schema()).expect("build");
        builder
            .add_fields_from_schema(
                &Schema::new("extra").with_field(
                    SchemaField::new("untyped", SchemaKind::Composite)
                        .repeatable()
                        .with_field(SchemaField::new("type", SchemaKind::Enumerated)),
                ),
            )
            .expect("extra");

        let reason = |base: &str| {
            builder
                .clone()
                .add_typed_fields(base, ["a"])
                .expect_err("error")
                .to_string()
        };
        assert!(reason("missing").contains("field not found"));
        assert!(reason("text").contains("not repeatable"));
        assert!(reason("texts").contains("not an object"));
        assert!(reason("objects").contains("no \"type\" sub-field"));
        assert!(reason("untyped").contains("no \"value\" sub-field"));
    }
}
