//! Launch payload carried in the `startapp` parameter: base64-encoded JSON
//! with an optional referrer id and an optional traffic-source tag.
//!
//! Share links are generated by the mini-app itself, but the payload also
//! arrives from ad campaigns, so decoding is lenient: any malformed payload
//! is ignored rather than failing the launch.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde::{Deserialize, Deserializer};

#[derive(Debug, Default, PartialEq, Deserialize)]
pub struct StartPayload {
  #[serde(default, deserialize_with = "lenient_id")]
  pub referrer_id: Option<i64>,
  #[serde(default)]
  pub source: Option<String>,
}

/// Referrer ids appear both as JSON numbers and as strings in the wild.
fn lenient_id<'de, D>(de: D) -> Result<Option<i64>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Int(i64),
    Str(String),
  }

  Ok(match Option::<Raw>::deserialize(de)? {
    Some(Raw::Int(id)) => Some(id),
    Some(Raw::Str(s)) => s.trim().parse().ok(),
    None => None,
  })
}

pub fn decode(raw: &str) -> Option<StartPayload> {
  let raw = raw.trim();
  let bytes = STANDARD
    .decode(raw)
    .or_else(|_| URL_SAFE_NO_PAD.decode(raw))
    .ok()?;
  json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn encode(payload: &str) -> String {
    STANDARD.encode(payload)
  }

  #[test]
  fn decodes_referrer_and_source() {
    let payload = decode(&encode(r#"{"referrer_id": 42, "source": "vk"}"#))
      .expect("valid payload");
    assert_eq!(payload.referrer_id, Some(42));
    assert_eq!(payload.source.as_deref(), Some("vk"));
  }

  #[test]
  fn decodes_string_referrer_id() {
    let payload =
      decode(&encode(r#"{"referrer_id": "1337"}"#)).expect("valid payload");
    assert_eq!(payload.referrer_id, Some(1337));
    assert_eq!(payload.source, None);
  }

  #[test]
  fn decodes_source_only() {
    let payload =
      decode(&encode(r#"{"source": "ads"}"#)).expect("valid payload");
    assert_eq!(payload.referrer_id, None);
    assert_eq!(payload.source.as_deref(), Some("ads"));
  }

  #[test]
  fn rejects_garbage() {
    assert_eq!(decode("%%% not base64 %%%"), None);
    assert_eq!(decode(&encode("not json at all")), None);
  }

  #[test]
  fn unparseable_referrer_string_is_dropped() {
    let payload = decode(&encode(r#"{"referrer_id": "abc", "source": "x"}"#))
      .expect("payload itself is valid");
    assert_eq!(payload.referrer_id, None);
    assert_eq!(payload.source.as_deref(), Some("x"));
  }
}
