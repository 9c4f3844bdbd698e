//! Content-negotiated response decoding (§4.E).
//!
//! Only `application/x-protobuf` is implemented; every other content type
//! listed in the configuration surface (`json`, `pickle`, `msgpack`,
//! `v3-pb`) is accepted as a configuration value but produces
//! [`ZipperError::Decode`] at runtime (§9 open question, resolved: stub
//! rather than guess an unspecified format).

use carbon_zipper_core::ZipperError;
use carbon_zipper_types::wire;
use carbon_zipper_types::{FetchResponse, Match, MultiFetchResponse, ZipperInfoResponse};
use prost::Message;

const PROTOBUF: &str = "application/x-protobuf";

fn check_content_type(content_type: &str) -> Result<(), ZipperError> {
    if content_type.starts_with(PROTOBUF) {
        Ok(())
    } else {
        Err(ZipperError::Decode(format!("unknown content type: {content_type}")))
    }
}

pub fn decode_find(content_type: &str, body: &[u8]) -> Result<Vec<Match>, ZipperError> {
    check_content_type(content_type)?;
    let response = wire::MultiGlobResponse::decode(body)
        .map_err(|e| ZipperError::Decode(e.to_string()))?;
    let matches = response
        .metrics
        .into_iter()
        .flat_map(|glob| glob.matches.into_iter().map(Match::from))
        .collect();
    Ok(matches)
}

pub fn decode_render(content_type: &str, body: &[u8]) -> Result<MultiFetchResponse, ZipperError> {
    check_content_type(content_type)?;
    let response = wire::MultiFetchResponse::decode(body)
        .map_err(|e| ZipperError::Decode(e.to_string()))?;
    MultiFetchResponse::try_from(response).map_err(|e| ZipperError::Decode(e.to_string()))
}

/// Decodes `/info`, discriminating between a single `InfoResponse` (a plain
/// backend) and a `ZipperInfoResponse` map (a nested `BroadcastGroup`
/// composed as a backend, per the glossary). The multi shape is tried
/// first; an empty or unparsable result falls back to the single shape,
/// wrapped under `backend_addr`.
pub fn decode_info(
    content_type: &str,
    body: &[u8],
    backend_addr: &str,
) -> Result<ZipperInfoResponse, ZipperError> {
    check_content_type(content_type)?;

    if let Ok(multi) = wire::ZipperInfoResponse::decode(body) {
        if !multi.info.is_empty() {
            return Ok(multi.into());
        }
    }

    let single = wire::InfoResponse::decode(body).map_err(|e| ZipperError::Decode(e.to_string()))?;
    if single.name.is_empty() {
        return Err(ZipperError::Decode("empty info response".to_string()));
    }
    Ok(ZipperInfoResponse::single(backend_addr, single.into()))
}

/// `FetchResponse`s pulled out of a decoded `/render` call, used to record
/// learned paths.
pub fn leaf_names(responses: &[FetchResponse]) -> impl Iterator<Item = &str> {
    responses.iter().map(|r| r.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_protobuf_content_type_is_decode_error() {
        let err = decode_find("application/json", b"{}").unwrap_err();
        assert!(matches!(err, ZipperError::Decode(_)));
    }
}
