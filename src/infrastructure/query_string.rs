// Query-string codec for the navigable address
use crate::application::route_sync::RouteParams;

/// Parse `?a=1&b=x%20y` (leading `?` optional). Pairs that fail to decode
/// are skipped; the last occurrence of a repeated key wins.
pub fn parse_query(query: &str) -> RouteParams {
    let query = query.trim().trim_start_matches('?');
    let mut params = RouteParams::new();

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match (decode_component(key), decode_component(value)) {
            (Some(key), Some(value)) if !key.is_empty() => {
                params.insert(key, value);
            }
            _ => tracing::debug!("Skipping malformed query pair: {}", pair),
        }
    }

    params
}

/// Serialize params into `?a=1&b=x%20y`, or an empty string when there are none.
pub fn to_query(params: &RouteParams) -> String {
    if params.is_empty() {
        return String::new();
    }

    let pairs: Vec<String> = params
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect();
    format!("?{}", pairs.join("&"))
}

fn decode_component(component: &str) -> Option<String> {
    urlencoding::decode(&component.replace('+', " "))
        .ok()
        .map(|decoded| decoded.into_owned())
}
