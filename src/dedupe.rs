use std::collections::HashSet;

use crate::record::RawRecord;

/// Keep the first record seen for each identifier, in first-seen order.
/// Records without an id share the `null` key, so at most one of them survives.
pub fn deduplicate(records: Vec<RawRecord>) -> Vec<RawRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: serde_json::Value) -> RawRecord {
        RawRecord::new(v)
    }

    #[test]
    fn keeps_first_occurrence_in_order() {
        let input = vec![
            rec(json!({"id": 2, "v": "first"})),
            rec(json!({"id": 1})),
            rec(json!({"id": 2, "v": "second"})),
            rec(json!({"id": 3})),
            rec(json!({"id": 1})),
        ];
        let out = deduplicate(input);
        let ids: Vec<_> = out.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![json!(2), json!(1), json!(3)]);
        assert_eq!(out[0].field("v"), Some(&json!("first")));
    }

    #[test]
    fn output_ids_are_unique_and_never_longer() {
        let input: Vec<RawRecord> = (0..50).map(|i| rec(json!({"id": i % 7}))).collect();
        let len = input.len();
        let out = deduplicate(input);
        assert!(out.len() <= len);
        let keys: HashSet<_> = out.iter().map(|r| r.key()).collect();
        assert_eq!(keys.len(), out.len());
        assert_eq!(out.len(), 7);
    }

    #[test]
    fn idempotent() {
        let input = vec![
            rec(json!({"id": "a"})),
            rec(json!({"id": "b"})),
            rec(json!({"id": "a"})),
            rec(json!({})),
            rec(json!({"id": null})),
        ];
        let once = deduplicate(input);
        let twice = deduplicate(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn null_ids_collapse_to_one() {
        let input = vec![
            rec(json!({"title": "no id"})),
            rec(json!({"id": null, "title": "explicit null"})),
            rec(json!("not even an object")),
        ];
        let out = deduplicate(input);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].field("title"), Some(&json!("no id")));
    }

    #[test]
    fn empty_input() {
        assert!(deduplicate(Vec::new()).is_empty());
    }
}
