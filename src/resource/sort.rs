//! Table ordering
//!
//! FortiOS may return table rows in a different order than they were
//! configured. The `dynamic_sort_subtable` setting orders flattened rows by the
//! table's sort key so repeated reads produce identical state.

use serde_json::Value;
use std::cmp::Ordering;

/// Ordering applied to flattened table rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Keep the order the device returned
    #[default]
    Off,
    /// Plain string order
    Lexical,
    /// Digit runs compared by value, so `port2` sorts before `port10`
    Natural,
}

impl SortMode {
    /// Parse the `dynamic_sort_subtable` attribute value
    pub fn from_setting(setting: Option<&str>) -> Self {
        match setting {
            Some("true") => SortMode::Lexical,
            Some("natural") => SortMode::Natural,
            _ => SortMode::Off,
        }
    }
}

fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn next_chunk(s: &str) -> (&str, &str) {
    let digits = s.starts_with(|c: char| c.is_ascii_digit());
    let end = s
        .find(|c: char| c.is_ascii_digit() != digits)
        .unwrap_or(s.len());
    s.split_at(end)
}

/// Compare two strings treating runs of ASCII digits as numbers
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a_rest, mut b_rest) = (a, b);

    while !a_rest.is_empty() && !b_rest.is_empty() {
        let (a_chunk, a_tail) = next_chunk(a_rest);
        let (b_chunk, b_tail) = next_chunk(b_rest);

        let both_digits = a_chunk.starts_with(|c: char| c.is_ascii_digit())
            && b_chunk.starts_with(|c: char| c.is_ascii_digit());

        let ord = if both_digits {
            let a_num = a_chunk.trim_start_matches('0');
            let b_num = b_chunk.trim_start_matches('0');
            a_num
                .len()
                .cmp(&b_num.len())
                .then_with(|| a_num.cmp(b_num))
                .then_with(|| a_chunk.len().cmp(&b_chunk.len()))
        } else {
            a_chunk.cmp(b_chunk)
        };

        if ord != Ordering::Equal {
            return ord;
        }
        a_rest = a_tail;
        b_rest = b_tail;
    }

    a_rest.len().cmp(&b_rest.len())
}

fn compare_keys(a: Option<&Value>, b: Option<&Value>, mode: SortMode) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x.to_string().cmp(&y.to_string()),
        },
        (Some(x), Some(y)) => {
            let (x, y) = (key_string(x), key_string(y));
            match mode {
                SortMode::Natural => natural_cmp(&x, &y),
                _ => x.cmp(&y),
            }
        }
    }
}

/// Sort table rows in place by `key`. Rows with equal keys are ordered by
/// their serialized form, so the result never depends on device order.
pub fn sort_table(rows: &mut [Value], key: &str, mode: SortMode) {
    if mode == SortMode::Off {
        return;
    }
    rows.sort_by(|a, b| {
        compare_keys(a.get(key), b.get(key), mode).then_with(|| a.to_string().cmp(&b.to_string()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(rows: &[Value]) -> Vec<&str> {
        rows.iter().map(|r| r["name"].as_str().unwrap()).collect()
    }

    #[test]
    fn test_mode_from_setting() {
        assert_eq!(SortMode::from_setting(Some("true")), SortMode::Lexical);
        assert_eq!(SortMode::from_setting(Some("natural")), SortMode::Natural);
        assert_eq!(SortMode::from_setting(Some("false")), SortMode::Off);
        assert_eq!(SortMode::from_setting(None), SortMode::Off);
    }

    #[test]
    fn test_off_keeps_device_order() {
        let mut rows = vec![json!({"name": "b"}), json!({"name": "a"})];
        sort_table(&mut rows, "name", SortMode::Off);
        assert_eq!(names(&rows), vec!["b", "a"]);
    }

    #[test]
    fn test_lexical_vs_natural() {
        let rows = vec![
            json!({"name": "port10"}),
            json!({"name": "port2"}),
            json!({"name": "port1"}),
        ];

        let mut lexical = rows.clone();
        sort_table(&mut lexical, "name", SortMode::Lexical);
        assert_eq!(names(&lexical), vec!["port1", "port10", "port2"]);

        let mut natural = rows;
        sort_table(&mut natural, "name", SortMode::Natural);
        assert_eq!(names(&natural), vec!["port1", "port2", "port10"]);
    }

    #[test]
    fn test_numeric_keys_compare_by_value() {
        let mut rows = vec![json!({"id": 10}), json!({"id": 9}), json!({"id": 100})];
        sort_table(&mut rows, "id", SortMode::Lexical);
        let ids: Vec<i64> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![9, 10, 100]);
    }

    #[test]
    fn test_rows_without_key_sort_first() {
        let mut rows = vec![json!({"name": "a"}), json!({})];
        sort_table(&mut rows, "name", SortMode::Lexical);
        assert_eq!(rows[0], json!({}));
    }

    #[test]
    fn test_equal_keys_ordered_by_whole_row() {
        let a = json!({"name": "env", "category": "prod"});
        let b = json!({"name": "env", "category": "dev"});

        let mut one = vec![a.clone(), b.clone()];
        let mut two = vec![b.clone(), a.clone()];
        sort_table(&mut one, "name", SortMode::Natural);
        sort_table(&mut two, "name", SortMode::Natural);

        assert_eq!(one, two);
        assert_eq!(one[0], b);
    }

    #[test]
    fn test_natural_cmp_leading_zeros() {
        assert_eq!(natural_cmp("a01", "a1"), Ordering::Greater);
        assert_eq!(natural_cmp("a1", "a1b"), Ordering::Less);
        assert_eq!(natural_cmp("wan", "wan"), Ordering::Equal);
    }
}
