//! Expiry of the bearer token. The signature is never checked here.

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;
use time::OffsetDateTime;

#[derive(Deserialize)]
struct Claims {
    exp: Option<f64>,
}

/// `exp` claim of a JWT, `None` if the token is not a JWT or carries no expiry.
pub fn expiry(token: &str) -> Option<OffsetDateTime> {
    let payload = token.split('.').nth(1)?;
    let raw = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&raw).ok()?;
    let exp = claims.exp.filter(|e| e.is_finite() && *e > 0.0)?;
    OffsetDateTime::from_unix_timestamp(exp as i64).ok()
}

/// `max(min_delay, (exp - now) - margin)`.
pub fn refresh_delay(exp: OffsetDateTime, now: OffsetDateTime, margin: Duration, min_delay: Duration) -> Duration {
    let until = exp - now - margin;
    Duration::try_from(until).unwrap_or(Duration::ZERO).max(min_delay)
}

#[cfg(test)]
pub(crate) fn token_with_exp(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"drone","exp":{exp}}}"#));
    format!("{header}.{claims}.c2ln")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_exp_claim() {
        let tok = token_with_exp(1_900_000_000);
        assert_eq!(expiry(&tok).unwrap().unix_timestamp(), 1_900_000_000);
    }

    #[test]
    fn opaque_tokens_have_no_expiry() {
        assert!(expiry("not-a-jwt").is_none());
        assert!(expiry("a.%%%.c").is_none());
        let no_exp = format!("h.{}.s", URL_SAFE_NO_PAD.encode(br#"{"sub":"x"}"#));
        assert!(expiry(&no_exp).is_none());
    }

    #[test]
    fn delay_is_margin_before_expiry() {
        let now = OffsetDateTime::from_unix_timestamp(1_000_000).unwrap();
        let exp = now + time::Duration::minutes(15);
        let d = refresh_delay(exp, now, Duration::from_secs(60), Duration::from_secs(5));
        assert_eq!(d, Duration::from_secs(14 * 60));
    }

    #[test]
    fn delay_never_below_minimum() {
        let now = OffsetDateTime::from_unix_timestamp(1_000_000).unwrap();
        for exp in [now + time::Duration::seconds(30), now - time::Duration::hours(1)] {
            let d = refresh_delay(exp, now, Duration::from_secs(60), Duration::from_secs(5));
            assert_eq!(d, Duration::from_secs(5));
        }
    }
}
