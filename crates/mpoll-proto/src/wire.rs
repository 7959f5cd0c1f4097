// SPDX-License-Identifier: MIT

//! Line-based wire format for [`crate::TcpProtocolClient`].
//!
//! Request: `GET <objectName> <attr1>,<attr2>,...\n`
//! Reply: one line of JSON, `{"values": {"attr": <number|string|bool>}}`.

use std::collections::BTreeMap;

use mpoll_core::{AttributeValue, QueryResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use mpoll_core::Query;

#[derive(Debug, Serialize, Deserialize)]
pub struct WireReply {
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
}

pub fn encode_request(query: &Query) -> String {
    format!("GET {} {}\n", query.object_name, query.attributes.join(","))
}

pub fn decode_reply(line: &str, query: &Query) -> Result<Vec<QueryResult>, String> {
    let trimmed = line.trim_end();
    if trimmed.is_empty() {
        return Err("empty reply".to_string());
    }
    let reply: WireReply = serde_json::from_str(trimmed).map_err(|e| e.to_string())?;

    let mut values = BTreeMap::new();
    for attr in &query.attributes {
        if let Some(raw) = reply.values.get(attr) {
            values.insert(attr.clone(), to_attribute_value(raw));
        }
    }
    // Also surface attributes the server returned outside the requested set,
    // rather than silently dropping them.
    for (k, raw) in &reply.values {
        values.entry(k.clone()).or_insert_with(|| to_attribute_value(raw));
    }

    let timestamp_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;

    Ok(vec![QueryResult {
        object_name: query.object_name.clone(),
        values,
        tags: query.key_tags.clone(),
        timestamp_ms,
    }])
}

fn to_attribute_value(v: &Value) -> AttributeValue {
    match v {
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        other => AttributeValue::Text(other.to_string().trim_matches('"').to_string()),
    }
}
