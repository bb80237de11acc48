//! API Handler for shardlog
//!
//! Parses one JSON request, runs it against a registry and renders the
//! outcome. The registry does its own locking, so requests may be handled
//! from several threads at once.

use serde::Serialize;
use serde_json::{json, Value};

use super::errors::{ApiError, ApiResult};
use super::request::Request;
use super::response::Response;
use crate::observability::{log_event_with_fields, Event};
use crate::registry::Registry;

pub struct ApiHandler<'a> {
    registry: &'a Registry,
}

fn to_value<T: Serialize>(output: &T) -> ApiResult<Value> {
    serde_json::to_value(output)
        .map_err(|e| ApiError::invalid_request(format!("Failed to encode response: {}", e)))
}

impl<'a> ApiHandler<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Handle a raw JSON request string
    pub fn handle(&self, json_request: &str) -> Response {
        let request = match Request::parse(json_request) {
            Ok(r) => r,
            Err(e) => {
                log_event_with_fields(
                    Event::RequestFailed,
                    &[("code", e.code()), ("reason", e.message())],
                );
                return Response::error(&e);
            }
        };

        let op = request.op();
        match self.execute(request) {
            Ok(data) => Response::success(data),
            Err(e) => {
                log_event_with_fields(
                    Event::RequestFailed,
                    &[("code", e.code()), ("op", op), ("reason", e.message())],
                );
                Response::error(&e)
            }
        }
    }

    /// Run a parsed request
    pub fn execute(&self, request: Request) -> ApiResult<Value> {
        let registry = self.registry;
        match request {
            Request::CreateStream(r) => {
                let description = if r.exclusive {
                    registry.try_create_stream(&r.stream_name, r.shard_count, r.encryption)?
                } else {
                    registry.create_stream(&r.stream_name, r.shard_count, r.encryption)?
                };
                to_value(&description)
            }
            Request::DeleteStream { stream_name } => {
                registry.delete_stream(&stream_name)?;
                Ok(json!({ "deleted": stream_name }))
            }
            Request::ListStreams(r) => to_value(
                &registry.list_streams(r.limit, r.exclusive_start_stream_name.as_deref())?,
            ),
            Request::DescribeStream { stream_name } => {
                to_value(&registry.describe_stream(&stream_name)?)
            }
            Request::StreamStatus { stream_name } => {
                let status = registry.stream_status(&stream_name)?;
                Ok(json!({ "stream_name": stream_name, "stream_status": status }))
            }
            Request::PutRecord(r) => {
                to_value(&registry.put_record(&r.stream_name, &r.partition_key, &r.data)?)
            }
            Request::GetShardIterator(r) => {
                let token = registry.get_shard_iterator(&r.stream_name, &r.shard_id, &r.position)?;
                Ok(json!({ "shard_iterator": token }))
            }
            Request::GetRecords(r) => to_value(&registry.get_records(&r.shard_iterator, r.limit)?),
            Request::SplitShard(r) => to_value(&registry.split_shard(
                &r.stream_name,
                &r.shard_id,
                r.new_starting_hash_key,
            )?),
            Request::MergeShards(r) => to_value(&registry.merge_shards(
                &r.stream_name,
                &r.shard_id,
                &r.adjacent_shard_id,
            )?),
            Request::StartStreamEncryption {
                stream_name,
                key_id,
            } => {
                registry.start_stream_encryption(&stream_name, key_id.as_deref())?;
                Ok(Value::Null)
            }
            Request::StopStreamEncryption { stream_name } => {
                registry.stop_stream_encryption(&stream_name)?;
                Ok(Value::Null)
            }
            Request::SetRetentionPeriod {
                stream_name,
                retention_period_hours,
            } => {
                registry.set_retention_period(&stream_name, retention_period_hours)?;
                Ok(Value::Null)
            }
            Request::Sweep => to_value(&registry.sweep()),
            Request::Metrics => to_value(&registry.metrics()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::clock::MockClock;

    fn registry() -> Registry {
        Registry::with_clock(Arc::new(MockClock::new()))
    }

    #[test]
    fn test_create_and_describe() {
        let registry = registry();
        let handler = ApiHandler::new(&registry);

        let resp = handler.handle(r#"{"op": "create_stream", "stream_name": "orders", "shard_count": 2}"#);
        assert!(resp.is_success());
        assert_eq!(resp.data().unwrap()["stream_name"], "orders");

        let resp = handler.handle(r#"{"op": "describe_stream", "stream_name": "orders"}"#);
        assert_eq!(resp.data().unwrap()["shards"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_exclusive_create_conflicts() {
        let registry = registry();
        let handler = ApiHandler::new(&registry);
        let create = r#"{"op": "create_stream", "stream_name": "s", "shard_count": 1, "exclusive": true}"#;
        assert!(handler.handle(create).is_success());
        assert_eq!(handler.handle(create).error_code(), Some("ALREADY_EXISTS"));
    }

    #[test]
    fn test_put_and_read_back() {
        let registry = registry();
        let handler = ApiHandler::new(&registry);
        handler.handle(r#"{"op": "create_stream", "stream_name": "s", "shard_count": 1}"#);

        let put = handler.handle(r#"{"op": "put_record", "stream_name": "s", "partition_key": "k", "text": "hello"}"#);
        let shard_id = put.data().unwrap()["shard_id"].as_str().unwrap().to_string();

        let request = json!({
            "op": "get_shard_iterator",
            "stream_name": "s",
            "shard_id": shard_id,
            "shard_iterator_type": "TRIM_HORIZON",
        });
        let resp = handler.handle(&request.to_string());
        let token = resp.data().unwrap()["shard_iterator"].as_str().unwrap().to_string();

        let request = json!({ "op": "get_records", "shard_iterator": token });
        let resp = handler.handle(&request.to_string());
        let data = resp.data().unwrap();
        assert_eq!(data["records"][0]["data"], "aGVsbG8=");
        assert!(data["next_shard_iterator"].is_string());
    }

    #[test]
    fn test_errors_carry_codes() {
        let registry = registry();
        let handler = ApiHandler::new(&registry);

        let resp = handler.handle(r#"{"op": "describe_stream", "stream_name": "nope"}"#);
        assert_eq!(resp.error_code(), Some("NOT_FOUND"));

        let resp = handler.handle(r#"{"op": "explode"}"#);
        assert_eq!(resp.error_code(), Some("UNKNOWN_OPERATION"));

        let resp = handler.handle("not json");
        assert_eq!(resp.error_code(), Some("INVALID_REQUEST"));
    }

    #[test]
    fn test_metrics_op() {
        let registry = registry();
        let handler = ApiHandler::new(&registry);
        handler.handle(r#"{"op": "create_stream", "stream_name": "s", "shard_count": 1}"#);
        let resp = handler.handle(r#"{"op": "metrics"}"#);
        assert_eq!(resp.data().unwrap()["streams_created"], 1);
    }
}
