use std::sync::{Mutex, MutexGuard, PoisonError};

/// Joins a resource path onto the API root. Absolute URLs pass through.
pub(crate) fn urljoin(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

/// Renders query pairs for log lines. Values are not percent-encoded.
pub(crate) fn display_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// State behind these mutexes stays consistent even if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urljoin() {
        assert_eq!(
            urljoin("https://api.openaq.org/v3/", "locations/2178"),
            "https://api.openaq.org/v3/locations/2178"
        );
        assert_eq!(
            urljoin("https://api.openaq.org/v3", "/locations"),
            "https://api.openaq.org/v3/locations"
        );
        assert_eq!(
            urljoin("https://api.openaq.org/v3/", "http://localhost/x"),
            "http://localhost/x"
        );
    }

    #[test]
    fn test_display_query() {
        let params = vec![("page", "1".to_string()), ("iso", "US".to_string())];
        assert_eq!(display_query(&params), "page=1&iso=US");
        assert_eq!(display_query(&[]), "");
    }
}
