//! Column encoding for structured message fields.
//!
//! Lists are stored as `{"v":1,"list":[...]}` and header maps as
//! `{"v":1,"map":{...}}`. A `NULL` or empty column decodes to the empty value.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TermailError};
use crate::model::{Flags, Headers};

pub const CODEC_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct ListEnvelope<T> {
    v: u32,
    list: Vec<T>,
}

#[derive(Serialize, Deserialize)]
struct MapEnvelope {
    v: u32,
    map: Headers,
}

pub fn encode_list(items: &[String]) -> Result<String> {
    let envelope = ListEnvelope {
        v: CODEC_VERSION,
        list: items.to_vec(),
    };
    serde_json::to_string(&envelope).map_err(|e| TermailError::Codec(e.to_string()))
}

pub fn decode_list(raw: Option<&str>) -> Result<Vec<String>> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(Vec::new());
    };
    let envelope: ListEnvelope<String> =
        serde_json::from_str(raw).map_err(|e| TermailError::Codec(format!("list: {}", e)))?;
    check_version(envelope.v)?;
    Ok(envelope.list)
}

pub fn encode_flags(flags: &Flags) -> Result<String> {
    encode_list(&flags.tokens())
}

pub fn decode_flags(raw: Option<&str>) -> Result<Flags> {
    Ok(decode_list(raw)?.into_iter().collect())
}

pub fn encode_headers(headers: &Headers) -> Result<String> {
    let envelope = MapEnvelope {
        v: CODEC_VERSION,
        map: headers.clone(),
    };
    serde_json::to_string(&envelope).map_err(|e| TermailError::Codec(e.to_string()))
}

pub fn decode_headers(raw: Option<&str>) -> Result<Headers> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(Headers::new());
    };
    let envelope: MapEnvelope =
        serde_json::from_str(raw).map_err(|e| TermailError::Codec(format!("headers: {}", e)))?;
    check_version(envelope.v)?;
    Ok(envelope.map)
}

fn check_version(v: u32) -> Result<()> {
    if v != CODEC_VERSION {
        return Err(TermailError::Codec(format!(
            "unsupported encoding version {}",
            v
        )));
    }
    Ok(())
}
