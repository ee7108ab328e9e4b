//! Projection of stored activation documents into response bodies.
//!
//! Every projection is a pure function of the decoded record.

use actlog_storage::ActivationRecord;
use serde_json::{json, Map, Value};

use crate::error::QueryError;
use crate::spec::SubResource;

/// Decode a stored document. Decoding failures become `CorruptedRecord`; the
/// detail is logged and not returned.
pub fn decode(document: Value) -> Result<ActivationRecord, QueryError> {
    let activation_id = document
        .get("activationId")
        .and_then(Value::as_str)
        .unwrap_or("?")
        .to_string();
    serde_json::from_value(document).map_err(|err| {
        tracing::warn!(activation_id = %activation_id, error = %err, "corrupted activation document");
        QueryError::CorruptedRecord
    })
}

fn annotations(record: &ActivationRecord) -> Value {
    Value::Array(
        record
            .annotations
            .iter()
            .map(|a| json!({"key": a.key, "value": a.value}))
            .collect(),
    )
}

fn response(record: &ActivationRecord) -> Value {
    json!({
        "status": record.response.status.as_str(),
        "statusCode": record.response.status.code(),
        "success": record.response.is_success(),
        "result": record.response.result.clone().unwrap_or_else(|| json!({})),
    })
}

/// Listing entry without logs or result payload.
pub fn summary(record: &ActivationRecord) -> Value {
    let mut body = Map::new();
    body.insert("namespace".into(), json!(record.namespace.to_string()));
    body.insert("name".into(), json!(record.name));
    body.insert("version".into(), json!(record.version));
    body.insert("subject".into(), json!(record.subject));
    body.insert("activationId".into(), json!(record.activation_id.as_str()));
    body.insert("start".into(), json!(record.start));
    body.insert("end".into(), json!(record.end));
    if let Some(duration) = record.duration() {
        body.insert("duration".into(), json!(duration));
    }
    body.insert("statusCode".into(), json!(record.response.status.code()));
    body.insert("annotations".into(), annotations(record));
    body.insert("publish".into(), json!(record.publish));
    Value::Object(body)
}

/// Complete representation, including response and logs.
pub fn full(record: &ActivationRecord) -> Value {
    let mut body = summary(record);
    if let Value::Object(fields) = &mut body {
        fields.remove("statusCode");
        fields.insert("response".into(), response(record));
        fields.insert("logs".into(), json!(record.logs));
    }
    body
}

pub fn result(record: &ActivationRecord) -> Value {
    response(record)
}

pub fn logs(record: &ActivationRecord) -> Value {
    json!({ "logs": record.logs })
}

/// Project a single record, optionally onto a sub-resource.
pub fn project(record: &ActivationRecord, sub_resource: Option<&SubResource>) -> Result<Value, QueryError> {
    match sub_resource {
        None => Ok(full(record)),
        Some(SubResource::Result) => Ok(result(record)),
        Some(SubResource::Logs) => Ok(logs(record)),
        Some(SubResource::Unknown(segment)) => Err(QueryError::NotFound(format!(
            "unknown sub-resource '{segment}'"
        ))),
    }
}
