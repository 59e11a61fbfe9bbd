use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::Uri,
    middleware::Next,
    Error,
};

/// Collapses repeated query parameters so handlers never see arrays where
/// they expect a single value. The last value wins and keeps the position of
/// the first occurrence.
pub async fn parameter_pollution(
    mut req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    if let Some(query) = dedupe_query(req.query_string()) {
        let rewritten = format!("{}?{}", req.path(), query);
        match rewritten.parse::<Uri>() {
            Ok(uri) => req.head_mut().uri = uri,
            Err(e) => log::warn!("Could not rewrite polluted query string: {}", e),
        }
    }
    next.call(req).await
}

/// Returns the cleaned query string, or `None` when nothing was repeated.
pub fn dedupe_query(query: &str) -> Option<String> {
    if query.is_empty() {
        return None;
    }
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
    let mut deduped: Vec<(String, String)> = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        match deduped.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => deduped.push((key, value)),
        }
    }
    if deduped.len() == query.split('&').filter(|p| !p.is_empty()).count() {
        return None;
    }
    serde_urlencoded::to_string(&deduped).ok()
}
