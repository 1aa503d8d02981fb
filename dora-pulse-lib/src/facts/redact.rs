//! Credential scrubbing for anything that ends up in logs or reports.

use regex::{Captures, Regex};
use std::sync::LazyLock;

pub const REDACTED: &str = "[REDACTED]";

/// Secrets shorter than this are not scrubbed verbatim; they would match ordinary words.
const MIN_SECRET_LEN: usize = 8;

/// GitHub personal, OAuth, app and fine-grained token formats.
static GITHUB_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:gh[pousr]_[A-Za-z0-9]{16,}|github_pat_[A-Za-z0-9_]{20,})").expect("invalid regex"));

/// `Authorization`-style values such as `Bearer abc...` or `token abc...`.
static SCHEME_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(bearer|token)\s+([A-Za-z0-9._~+/=\-]+)").expect("invalid regex"));

/// Shortest value after a scheme word that is treated as a credential.
const MIN_SCHEME_VALUE_LEN: usize = 16;

/// Prose such as "token validation" follows the scheme word too; credentials are long and carry digits.
fn looks_like_credential(value: &str) -> bool {
    value.len() >= MIN_SCHEME_VALUE_LEN && value.bytes().any(|b| b.is_ascii_digit())
}

/// Query-string credentials.
static QUERY_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(access_token|client_secret)=[^&\s]+").expect("invalid regex"));

/// Replace known secrets and anything that looks like a credential with [`REDACTED`].
#[must_use]
pub fn redact(text: &str, secrets: &[&str]) -> String {
    let mut scrubbed = text.to_string();
    for secret in secrets.iter().filter(|s| s.len() >= MIN_SECRET_LEN) {
        scrubbed = scrubbed.replace(secret, REDACTED);
    }

    let scrubbed = GITHUB_TOKEN.replace_all(&scrubbed, REDACTED);
    let scrubbed = SCHEME_TOKEN.replace_all(&scrubbed, |caps: &Captures<'_>| {
        if looks_like_credential(&caps[2]) {
            format!("{} {REDACTED}", &caps[1])
        } else {
            caps[0].to_string()
        }
    });
    QUERY_TOKEN
        .replace_all(&scrubbed, |caps: &Captures<'_>| format!("{}={REDACTED}", &caps[1]))
        .into_owned()
}
