use std::env;
use std::path::Path;

use crate::charset::DEFAULT_CHARSET_NAME;
use crate::error::ConfigError;
use crate::reader::DEFAULT_MAX_IN_MEMORY_SIZE;

// Default configuration constants
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CHARSET: &str = DEFAULT_CHARSET_NAME;
pub const DEFAULT_MAX_BODY_SIZE: usize = DEFAULT_MAX_IN_MEMORY_SIZE;

pub fn load_env_file(env_file: Option<&str>) {
    if let Some(path) = env_file {
        dotenvy::from_path(Path::new(path)).ok();
    } else {
        dotenvy::dotenv().ok();
    }
}

/// Label of the charset pinned for form decoding (`FORM_CHARSET`)
pub fn get_charset_label() -> String {
    env::var("FORM_CHARSET")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_CHARSET.to_string())
}

/// Maximum buffered body size in bytes (`MAX_FORM_BODY_SIZE`)
pub fn get_max_body_size() -> Result<usize, ConfigError> {
    match env::var("MAX_FORM_BODY_SIZE") {
        Ok(raw) if !raw.trim().is_empty() => parse_size(&raw).ok_or(ConfigError::InvalidValue {
            name: "MAX_FORM_BODY_SIZE",
            value: raw,
        }),
        _ => Ok(DEFAULT_MAX_BODY_SIZE),
    }
}

/// Parse a byte size, accepting an optional `k`/`kb`/`m`/`mb` suffix
/// (binary multiples). Zero is rejected.
pub fn parse_size(raw: &str) -> Option<usize> {
    let lower = raw.trim().to_ascii_lowercase();
    let (digits, multiplier) = if let Some(n) = lower.strip_suffix("kb").or_else(|| lower.strip_suffix('k')) {
        (n, 1024)
    } else if let Some(n) = lower.strip_suffix("mb").or_else(|| lower.strip_suffix('m')) {
        (n, 1024 * 1024)
    } else {
        (lower.as_str(), 1)
    };
    let value = digits.trim().parse::<usize>().ok()?.checked_mul(multiplier)?;
    (value > 0).then_some(value)
}
