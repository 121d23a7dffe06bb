//! Telegram WebApp `initData` verification.
//!
//! Every API request carries the raw `initData` string from the host
//! runtime. The signature scheme is the one documented for Web Apps:
//! `secret = HMAC_SHA256("WebAppData", bot_token)`, then the hash field
//! must equal `HMAC_SHA256(secret, data_check_string)` where the check
//! string is all other fields sorted by key and joined with newlines.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::prelude::*;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Deserialize)]
pub struct WebAppUser {
  pub id: i64,
  pub first_name: String,
  #[serde(default)]
  pub username: Option<String>,
  #[serde(default)]
  pub photo_url: Option<String>,
}

#[derive(Debug)]
pub struct InitData {
  pub user: WebAppUser,
  pub start_param: Option<String>,
  pub auth_date: i64,
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> HmacSha256 {
  let mut mac =
    HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
  mac.update(data);
  mac
}

pub fn verify(init_data: &str, bot_token: &str) -> Result<InitData> {
  let mut pairs = Vec::new();
  let mut hash = None;

  for part in init_data.split('&').filter(|part| !part.is_empty()) {
    let (key, value) = part.split_once('=').ok_or(Error::Unauthorized)?;
    let value = urlencoding::decode(value)
      .map_err(|_| Error::Unauthorized)?
      .into_owned();

    if key == "hash" {
      hash = Some(value);
    } else {
      pairs.push((key.to_string(), value));
    }
  }

  let hash = hash.ok_or(Error::Unauthorized)?;
  let given = hex::decode(hash.as_bytes()).map_err(|_| Error::Unauthorized)?;

  pairs.sort();
  let check_string = pairs
    .iter()
    .map(|(key, value)| format!("{key}={value}"))
    .collect::<Vec<_>>()
    .join("\n");

  let secret =
    hmac_sha256(b"WebAppData", bot_token.as_bytes()).finalize().into_bytes();
  hmac_sha256(&secret, check_string.as_bytes())
    .verify_slice(&given)
    .map_err(|_| Error::Unauthorized)?;

  let mut user = None;
  let mut start_param = None;
  let mut auth_date = 0;

  for (key, value) in pairs {
    match key.as_str() {
      "user" => user = json::from_str(&value).ok(),
      "start_param" => start_param = Some(value),
      "auth_date" => auth_date = value.parse().unwrap_or(0),
      _ => {}
    }
  }

  Ok(InitData { user: user.ok_or(Error::Unauthorized)?, start_param, auth_date })
}

#[cfg(test)]
mod tests {
  use super::*;

  const TOKEN: &str = "12345:TEST_TOKEN";

  fn sign(fields: &[(&str, &str)]) -> String {
    let mut sorted: Vec<_> = fields.to_vec();
    sorted.sort();
    let check_string = sorted
      .iter()
      .map(|(key, value)| format!("{key}={value}"))
      .collect::<Vec<_>>()
      .join("\n");

    let secret =
      hmac_sha256(b"WebAppData", TOKEN.as_bytes()).finalize().into_bytes();
    let hash = hex::encode(
      hmac_sha256(&secret, check_string.as_bytes()).finalize().into_bytes(),
    );

    let mut query: Vec<_> = fields
      .iter()
      .map(|(key, value)| {
        format!("{key}={}", urlencoding::encode(value))
      })
      .collect();
    query.push(format!("hash={hash}"));
    query.join("&")
  }

  #[test]
  fn accepts_signed_init_data() {
    let init_data = sign(&[
      ("user", r#"{"id":99,"first_name":"Test","username":"tester"}"#),
      ("auth_date", "1743500000"),
      ("start_param", "eyJzb3VyY2UiOiJ2ayJ9"),
    ]);

    let init = verify(&init_data, TOKEN).expect("valid signature");
    assert_eq!(init.user.id, 99);
    assert_eq!(init.user.username.as_deref(), Some("tester"));
    assert_eq!(init.start_param.as_deref(), Some("eyJzb3VyY2UiOiJ2ayJ9"));
    assert_eq!(init.auth_date, 1743500000);
  }

  #[test]
  fn rejects_tampered_data() {
    let init_data = sign(&[
      ("user", r#"{"id":99,"first_name":"Test"}"#),
      ("auth_date", "1743500000"),
    ]);
    let tampered = init_data.replace("99", "100");

    assert!(matches!(verify(&tampered, TOKEN), Err(Error::Unauthorized)));
  }

  #[test]
  fn rejects_missing_hash() {
    let init_data = "user=%7B%22id%22%3A99%7D&auth_date=1743500000";
    assert!(matches!(verify(init_data, TOKEN), Err(Error::Unauthorized)));
  }

  #[test]
  fn rejects_wrong_token() {
    let init_data = sign(&[
      ("user", r#"{"id":99,"first_name":"Test"}"#),
      ("auth_date", "1743500000"),
    ]);
    assert!(matches!(
      verify(&init_data, "54321:OTHER_TOKEN"),
      Err(Error::Unauthorized)
    ));
  }
}
