//! Rebuild imported notes and tasks into their canonical shape.
//!
//! Imported records come from older builds, hand edits and foreign tools.
//! Every record is rebuilt field by field: known fields of the right type are
//! kept, everything else is defaulted or dropped.

use grayframe_id::{NoteId, TaskId};
use serde_json::{Map, Value};

/// Fold a raw status to `todo`, `doing` or `done`.
///
/// Matching is case-insensitive and `inprogress` means `doing`. Anything
/// else, including a missing or non-string status, is `todo`.
pub fn normalize_status(raw: Option<&Value>) -> &'static str {
    let folded = raw.and_then(Value::as_str).map(str::to_ascii_lowercase);
    match folded.as_deref() {
        Some("doing" | "inprogress") => "doing",
        Some("done") => "done",
        _ => "todo",
    }
}

/// Epoch-millisecond timestamp, if `raw` is a finite number.
fn timestamp(raw: Option<&Value>) -> Option<i64> {
    let raw = raw?;
    raw.as_i64().or_else(|| {
        raw.as_f64()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    })
}

fn string_or(raw: Option<&Value>, default: impl FnOnce() -> String) -> String {
    raw.and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(default)
}

/// Canonical task: `{id, title, status, dueAt?, createdAt, updatedAt}`.
///
/// Returns `None` when `raw` is not an object.
pub fn normalize_task(raw: &Value, now_ms: i64) -> Option<Value> {
    let fields = raw.as_object()?;

    let mut task = Map::new();
    task.insert(
        "id".into(),
        string_or(fields.get("id"), || TaskId::new().to_string()).into(),
    );
    task.insert("title".into(), string_or(fields.get("title"), String::new).into());
    task.insert("status".into(), normalize_status(fields.get("status")).into());
    if let Some(due_at) = timestamp(fields.get("dueAt")) {
        task.insert("dueAt".into(), due_at.into());
    }
    task.insert(
        "createdAt".into(),
        timestamp(fields.get("createdAt")).unwrap_or(now_ms).into(),
    );
    task.insert(
        "updatedAt".into(),
        timestamp(fields.get("updatedAt")).unwrap_or(now_ms).into(),
    );
    Some(Value::Object(task))
}

/// Canonical note: `{id, title, body, createdAt, updatedAt}`.
///
/// Returns `None` when `raw` is not an object.
pub fn normalize_note(raw: &Value, now_ms: i64) -> Option<Value> {
    let fields = raw.as_object()?;

    let mut note = Map::new();
    note.insert(
        "id".into(),
        string_or(fields.get("id"), || NoteId::new().to_string()).into(),
    );
    note.insert("title".into(), string_or(fields.get("title"), String::new).into());
    note.insert("body".into(), string_or(fields.get("body"), String::new).into());
    note.insert(
        "createdAt".into(),
        timestamp(fields.get("createdAt")).unwrap_or(now_ms).into(),
    );
    note.insert(
        "updatedAt".into(),
        timestamp(fields.get("updatedAt")).unwrap_or(now_ms).into(),
    );
    Some(Value::Object(note))
}

/// Records of a module payload: either a bare array or `{"items": [...]}`.
pub(crate) fn module_items(payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.get("items").and_then(Value::as_array),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;

    #[rstest]
    #[case(json!("todo"), "todo")]
    #[case(json!("doing"), "doing")]
    #[case(json!("done"), "done")]
    #[case(json!("InProgress"), "doing")]
    #[case(json!("INPROGRESS"), "doing")]
    #[case(json!("Done"), "done")]
    #[case(json!("in-progress"), "todo")]
    #[case(json!("bogus"), "todo")]
    #[case(json!(3), "todo")]
    #[case(json!(null), "todo")]
    fn test_normalize_status(#[case] raw: Value, #[case] expected: &str) {
        assert_eq!(normalize_status(Some(&raw)), expected);
    }

    #[test]
    fn test_missing_status_is_todo() {
        assert_eq!(normalize_status(None), "todo");
    }

    #[test]
    fn test_task_keeps_canonical_fields_only() {
        let raw = json!({
            "id": "t1",
            "title": "Ship",
            "status": "InProgress",
            "dueAt": 5.0,
            "createdAt": 1,
            "updatedAt": 2,
            "notes": "foo"
        });
        assert_eq!(
            normalize_task(&raw, NOW).unwrap(),
            json!({
                "id": "t1",
                "title": "Ship",
                "status": "doing",
                "dueAt": 5,
                "createdAt": 1,
                "updatedAt": 2
            })
        );
    }

    #[test]
    fn test_task_defaults() {
        let task = normalize_task(&json!({"title": 7, "dueAt": "tomorrow"}), NOW).unwrap();
        assert!(task["id"].as_str().unwrap().starts_with("task_"));
        assert_eq!(task["title"], "");
        assert_eq!(task["status"], "todo");
        assert!(task.get("dueAt").is_none());
        assert_eq!(task["createdAt"], NOW);
        assert_eq!(task["updatedAt"], NOW);
    }

    #[test]
    fn test_non_objects_are_rejected() {
        assert!(normalize_task(&json!("task"), NOW).is_none());
        assert!(normalize_note(&json!([1]), NOW).is_none());
    }

    #[test]
    fn test_note_defaults() {
        let note = normalize_note(&json!({"id": "n1", "pinned": true}), NOW).unwrap();
        assert_eq!(
            note,
            json!({"id": "n1", "title": "", "body": "", "createdAt": NOW, "updatedAt": NOW})
        );
    }

    #[test]
    fn test_module_items_shapes() {
        assert_eq!(module_items(&json!([1, 2])).map(Vec::len), Some(2));
        assert_eq!(module_items(&json!({"items": []})).map(Vec::len), Some(0));
        assert!(module_items(&json!({"items": 3})).is_none());
        assert!(module_items(&json!("x")).is_none());
    }

    proptest! {
        #[test]
        fn prop_status_is_always_canonical(raw in ".*") {
            let status = normalize_status(Some(&Value::String(raw)));
            prop_assert!(matches!(status, "todo" | "doing" | "done"));
        }

        #[test]
        fn prop_task_has_exactly_known_fields(
            extra in "[a-z]{1,8}",
            due in proptest::option::of(any::<i32>()),
        ) {
            let mut raw = json!({"title": "t"});
            raw[extra.as_str()] = json!("x");
            if let Some(due) = due {
                raw["dueAt"] = due.into();
            }
            let task = normalize_task(&raw, NOW).unwrap();
            let known = ["id", "title", "status", "dueAt", "createdAt", "updatedAt"];
            for key in task.as_object().unwrap().keys() {
                prop_assert!(known.contains(&key.as_str()));
            }
            prop_assert_eq!(task.get("dueAt").is_some(), due.is_some());
        }
    }
}
