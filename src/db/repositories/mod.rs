pub mod post;
pub mod user;

/// RFC 3339 with fixed microsecond precision. Timestamps are stored as text
/// and ordered lexicographically, so the width must not vary.
pub(crate) fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
