//! Record previews using the `similar` crate.
//!
//! A record is rendered as pretty JSON so that a unified line diff shows
//! exactly which fields an operation touched.

use similar::{Algorithm, TextDiff};

use crate::record::Record;

fn render(record: Option<&Record>) -> String {
    record
        .and_then(|record| serde_json::to_string_pretty(&record.fields).ok())
        .map(|mut text| {
            text.push('\n');
            text
        })
        .unwrap_or_default()
}

/// Unified diff of a record before and after a batch.
///
/// `None` stands for a record that does not exist on that side (deleted or
/// moved away). Returns an empty string when nothing changed.
pub fn record_diff(name: &str, before: Option<&Record>, after: Option<&Record>) -> String {
    let old = render(before);
    let new = render(after);
    if old == new {
        return String::new();
    }

    TextDiff::configure()
        .algorithm(Algorithm::Patience)
        .diff_lines(&old, &new)
        .unified_diff()
        .header(&format!("a/{name}"), &format!("b/{name}"))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unchanged_record() {
        let record = Record::new(1).with("title", "Same");
        assert!(record_diff("1", Some(&record), Some(&record)).is_empty());
    }

    #[test]
    fn test_changed_field() {
        let before = Record::new(1).with("title", "Test");
        let after = Record::new(1).with("title", "TESt");

        let diff = record_diff("1", Some(&before), Some(&after));
        assert!(diff.contains("a/1"));
        assert!(diff.contains("-  \"title\": \"Test\""));
        assert!(diff.contains("+  \"title\": \"TESt\""));
    }

    #[test]
    fn test_deleted_record() {
        let before = Record::new(1).with("title", "Gone");
        let diff = record_diff("1", Some(&before), None);
        assert!(diff.contains("-  \"title\": \"Gone\""));
        assert!(!diff.contains("+  \"title\""));
    }
}
