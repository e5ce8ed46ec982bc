/// Default base URL for chat transport requests.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
/// Default path of the streaming send endpoint.
pub const DEFAULT_STREAM_PATH: &str = "/api/chat/stream";

/// Join a base URL and the streaming endpoint path.
///
/// Normalization rules:
/// 1) an empty base falls back to [`DEFAULT_BASE_URL`]
/// 2) a base that already ends with the path is kept unchanged
/// 3) otherwise exactly one `/` separates base and path
pub fn normalize_stream_url(base: &str, path: &str) -> String {
    let base = if base.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        base.trim()
    };
    let base = base.trim_end_matches('/');

    let path = path.trim().trim_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    if base.ends_with(&format!("/{path}")) {
        return base.to_string();
    }
    format!("{base}/{path}")
}
