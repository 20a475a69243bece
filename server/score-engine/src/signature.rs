//! GitHub webhook signature verification (`X-Hub-Signature-256`).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::error::ScoreError;

type HmacSha256 = Hmac<Sha256>;

const PREFIX: &str = "sha256=";

/// Verify `sha256=<hex>` against an HMAC-SHA256 of the raw body.
///
/// With no secret configured verification is skipped; this mirrors the
/// club deployment where a missing secret only warns.
pub fn verify(secret: Option<&str>, body: &[u8], header: Option<&str>) -> Result<(), ScoreError> {
  let Some(secret) = secret else {
    warn!("GITHUB_WEBHOOK_SECRET not set, skipping signature verification");
    return Ok(());
  };

  let signature_hex = header
    .and_then(|h| h.strip_prefix(PREFIX))
    .ok_or(ScoreError::SignatureInvalid)?;
  let signature = hex::decode(signature_hex).map_err(|_| ScoreError::SignatureInvalid)?;

  let mut mac =
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| ScoreError::SignatureInvalid)?;
  mac.update(body);
  mac
    .verify_slice(&signature)
    .map_err(|_| ScoreError::SignatureInvalid)
}

/// Compute the header value GitHub would send for `body`.
pub fn sign(secret: &str, body: &[u8]) -> String {
  let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
    Ok(mac) => mac,
    Err(_) => unreachable!("hmac accepts any key length"),
  };
  mac.update(body);
  format!("{}{}", PREFIX, hex::encode(mac.finalize().into_bytes()))
}
