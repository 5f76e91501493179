//! The process-wide legacy charset used to decode form bodies.
//!
//! The charset is resolved once at startup through [`install`]; every decode
//! afterwards reads it through [`pinned`]. When nothing has been installed the
//! pinned charset is EUC-KR.

use std::borrow::Cow;

use encoding_rs::Encoding;
use once_cell::sync::OnceCell;

use crate::error::{ConfigError, DecodeError};

/// Canonical name of the charset pinned when no other is configured
pub const DEFAULT_CHARSET_NAME: &str = "EUC-KR";

static PINNED_CHARSET: OnceCell<&'static Encoding> = OnceCell::new();

/// Resolve a charset label (WHATWG labels, case-insensitive, surrounding
/// whitespace ignored).
pub fn resolve(label: &str) -> Result<&'static Encoding, ConfigError> {
    let encoding = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| ConfigError::UnknownCharset(label.trim().to_string()))?;
    if !encoding.is_ascii_compatible() {
        return Err(ConfigError::IncompatibleCharset(encoding.name()));
    }
    Ok(encoding)
}

/// Pin the process-wide charset. Only the first successful call takes effect.
pub fn install(label: &str) -> Result<&'static Encoding, ConfigError> {
    let encoding = resolve(label)?;
    let pinned = *PINNED_CHARSET.get_or_init(|| encoding);
    if pinned != encoding {
        tracing::warn!(requested = encoding.name(), pinned = pinned.name(), "Charset already pinned; ignoring");
    }
    Ok(pinned)
}

pub fn pinned() -> &'static Encoding {
    PINNED_CHARSET.get().copied().unwrap_or(encoding_rs::EUC_KR)
}

/// Decode bytes without replacement characters; any invalid sequence fails.
pub fn decode<'a>(bytes: &'a [u8], charset: &'static Encoding) -> Result<Cow<'a, str>, DecodeError> {
    charset
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or(DecodeError::InvalidSequence { charset: charset.name() })
}
