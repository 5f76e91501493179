use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use mime::Mime;

/// Parsed `Content-Type`; a missing or unparseable header counts as absent.
pub fn content_type(headers: &HeaderMap) -> Option<Mime> {
    headers
        .get(CONTENT_TYPE)?
        .to_str()
        .ok()?
        .parse::<Mime>()
        .ok()
}

/// Type and subtype match, with `*` on either side matching anything.
/// Parameters such as `charset` are ignored.
pub fn is_compatible(a: &Mime, b: &Mime) -> bool {
    name_matches(a.type_().as_str(), b.type_().as_str()) && name_matches(a.subtype().as_str(), b.subtype().as_str())
}

fn name_matches(a: &str, b: &str) -> bool {
    a == "*" || b == "*" || a.eq_ignore_ascii_case(b)
}

/// Absent media types are accepted.
pub fn is_form_compatible(media: Option<&Mime>) -> bool {
    media.map_or(true, |m| is_compatible(&mime::APPLICATION_WWW_FORM_URLENCODED, m))
}

/// Value of the `charset` parameter, if any
pub fn charset_param(media: &Mime) -> Option<&str> {
    media.get_param(mime::CHARSET).map(|name| name.as_str())
}
