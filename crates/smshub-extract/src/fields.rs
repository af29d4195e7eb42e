//! Canonical field resolution over heterogeneous client payloads.
//!
//! Forwarder apps disagree on field names ("phone" vs "sender" vs
//! "msisdn"), so each canonical field has an ordered alias list and the
//! first alias present with a non-empty trimmed value wins.

use serde_json::Value;

pub const PHONE_ALIASES: &[&str] = &["phone", "sender", "from", "mobile", "msisdn"];
pub const CONTENT_ALIASES: &[&str] = &["content", "text", "message", "body", "msg"];
pub const TIME_ALIASES: &[&str] = &[
    "time",
    "timestamp",
    "receive_time",
    "received_at",
    "date",
    "datetime",
];
pub const DEVICE_ALIASES: &[&str] = &["device", "sim", "sim_slot", "sim_name", "device_name"];

/// A parsed request body. JSON is authoritative when a request could carry
/// both encodings; the caller picks the variant from the Content-Type.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(serde_json::Map<String, Value>),
    Form(Vec<(String, String)>),
}

impl Payload {
    /// Look up a single key, returning its trimmed value if non-empty.
    /// JSON scalars are stringified the way lenient intake clients expect
    /// (numbers and bools as their literal text); null, arrays, and
    /// objects never match.
    pub fn get(&self, key: &str) -> Option<String> {
        let raw = match self {
            Payload::Json(map) => map.get(key).and_then(stringify),
            Payload::Form(pairs) => pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
        }?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// All keys present in the payload, for the missing-params debug info.
    pub fn keys(&self) -> Vec<String> {
        match self {
            Payload::Json(map) => map.keys().cloned().collect(),
            Payload::Form(pairs) => pairs.iter().map(|(k, _)| k.clone()).collect(),
        }
    }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Resolve a canonical field through its ordered alias list: the first
/// alias with a non-empty value wins, later aliases are ignored.
pub fn resolve_field(payload: &Payload, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| payload.get(alias))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => Payload::Json(map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn first_alias_wins() {
        let p = json_payload(json!({"sender": "10086", "phone": "10010"}));
        assert_eq!(resolve_field(&p, PHONE_ALIASES), Some("10010".into()));
    }

    #[test]
    fn blank_values_fall_through_to_later_aliases() {
        let p = json_payload(json!({"phone": "   ", "from": "+8613900001111"}));
        assert_eq!(
            resolve_field(&p, PHONE_ALIASES),
            Some("+8613900001111".into())
        );
    }

    #[test]
    fn absent_everywhere_is_none() {
        let p = json_payload(json!({"text": "hello"}));
        assert_eq!(resolve_field(&p, PHONE_ALIASES), None);
        assert_eq!(resolve_field(&p, CONTENT_ALIASES), Some("hello".into()));
    }

    #[test]
    fn json_numbers_stringify() {
        let p = json_payload(json!({"timestamp": 1700000000}));
        assert_eq!(resolve_field(&p, TIME_ALIASES), Some("1700000000".into()));
    }

    #[test]
    fn json_null_and_compound_values_do_not_match() {
        let p = json_payload(json!({"time": null, "date": ["2024-05-01"], "datetime": "2024-05-01"}));
        assert_eq!(resolve_field(&p, TIME_ALIASES), Some("2024-05-01".into()));
    }

    #[test]
    fn form_pairs_resolve_in_alias_order() {
        let p = Payload::Form(vec![
            ("msg".into(), "your code is 1234".into()),
            ("sim".into(), "SIM1".into()),
        ]);
        assert_eq!(
            resolve_field(&p, CONTENT_ALIASES),
            Some("your code is 1234".into())
        );
        assert_eq!(resolve_field(&p, DEVICE_ALIASES), Some("SIM1".into()));
    }

    #[test]
    fn values_are_trimmed() {
        let p = Payload::Form(vec![("phone".into(), "  10086  ".into())]);
        assert_eq!(resolve_field(&p, PHONE_ALIASES), Some("10086".into()));
    }

    #[test]
    fn keys_reports_everything_present() {
        let p = json_payload(json!({"foo": 1, "msg": "x"}));
        let mut keys = p.keys();
        keys.sort();
        assert_eq!(keys, vec!["foo".to_string(), "msg".to_string()]);
    }
}
