//! The `geo/zips` request contract, independent of any HTTP framework.
//!
//! A POST body `{ "geometry": <Feature | Geometry | FeatureCollection> }` is answered with
//! `{ "zips": [...] }` and status 200, or `{ "zips": [], "error": "..." }` and status 500. The
//! `zips` array is always present so callers can read both outcomes the same way.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ZipMatchError};
use crate::geofile::geojson::ShapeInput;
use crate::geozip::resolver::{Resolution, ZipResolver};

pub const STATUS_OK: u16 = 200;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ZipsResponse {
    pub zips: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipsReply {
    pub status: u16,
    pub response: ZipsResponse,
}

impl ZipsReply {
    fn success(zips: Vec<String>) -> Self {
        Self {
            status: STATUS_OK,
            response: ZipsResponse { zips, error: None },
        }
    }

    fn failure(err: &ZipMatchError) -> Self {
        Self {
            status: STATUS_INTERNAL_ERROR,
            response: ZipsResponse {
                zips: vec![],
                error: Some(err.to_string()),
            },
        }
    }
}

/// Answer one request body. Never fails: every error becomes a 500 reply.
pub fn handle_zips_request(body: &str, resolver: &ZipResolver) -> ZipsReply {
    resolve_request_body(body, resolver).0
}

/// Like `handle_zips_request`, also returning the resolution for callers that want the coverage
/// geometry or the skip counts.
pub fn resolve_request_body(body: &str, resolver: &ZipResolver) -> (ZipsReply, Option<Resolution>) {
    let result = parse_request_body(body).and_then(|input| match input {
        Some(input) => resolver.resolve(input).map(Some),
        None => Ok(None),
    });
    match result {
        Ok(Some(resolution)) => (ZipsReply::success(resolution.zips.clone()), Some(resolution)),
        Ok(None) => (ZipsReply::success(vec![]), None),
        Err(err) => {
            log::warn!("Could not resolve postal codes: {}", err);
            (ZipsReply::failure(&err), None)
        }
    }
}

/// `None` when the body has no `geometry`, or a `null` one.
fn parse_request_body(body: &str) -> Result<Option<ShapeInput>> {
    let request: serde_json::Value = serde_json::from_str(body)
        .map_err(|err| ZipMatchError::InvalidRequest(format!("body is not JSON, {}", err)))?;
    let mut request = match request {
        serde_json::Value::Object(request) => request,
        _ => {
            return Err(ZipMatchError::InvalidRequest(
                "body must be a JSON object".to_string(),
            ))
        }
    };
    match request.remove("geometry") {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(geometry) => ShapeInput::from_json_value(geometry).map(Some),
    }
}
