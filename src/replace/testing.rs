//! Shared fixtures for the engine unit tests.

use crate::replace::builder::FieldsBuilder;
use crate::replace::field::Fields;
use crate::schema::{Schema, SchemaField, SchemaKind};

fn leaves() -> Vec<SchemaField> {
    vec![
        SchemaField::new("text", SchemaKind::Text),
        SchemaField::new("texts", SchemaKind::Text).repeatable(),
        SchemaField::new("value", SchemaKind::Enumerated),
        SchemaField::new("values", SchemaKind::Enumerated).repeatable(),
    ]
}

/// Every combination of text/value, single/repeatable, at the root, below
/// an object and below a repeatable object.
pub(crate) fn test_schema() -> Schema {
    let mut object = SchemaField::new("object", SchemaKind::Composite);
    let mut objects = SchemaField::new("objects", SchemaKind::Composite).repeatable();
    let mut schema = Schema::new("test");
    for leaf in leaves() {
        object = object.with_field(leaf.clone());
        objects = objects.with_field(leaf.clone());
        schema = schema.with_field(leaf);
    }
    schema.with_field(object).with_field(objects)
}

pub(crate) fn test_fields() -> Fields {
    let mut builder = FieldsBuilder::new();
    builder
        .add_fields_from_schema(&test_schema())
        .expect("test schema");
    builder.into_fields()
}

/// Registry with the typed containers `typedText` and `typedValues`, the
/// given one carrying typed fields `one`, `two` and `three`.
pub(crate) fn typed_builder(base: &str) -> FieldsBuilder {
    let schema = Schema::new("typed")
        .with_field(
            SchemaField::new("typedText", SchemaKind::Composite)
                .repeatable()
                .with_field(SchemaField::new("type", SchemaKind::Enumerated))
                .with_field(SchemaField::new("value", SchemaKind::Text)),
        )
        .with_field(
            SchemaField::new("typedValues", SchemaKind::Composite)
                .repeatable()
                .with_field(SchemaField::new("type", SchemaKind::Enumerated))
                .with_field(SchemaField::new("value", SchemaKind::Enumerated).repeatable()),
        );
    let mut builder = FieldsBuilder::new();
    builder.add_fields_from_schema(&schema).expect("typed schema");
    builder
        .add_typed_fields(base, ["one", "two", "three"])
        .expect("typed fields");
    builder
}
