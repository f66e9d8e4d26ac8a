//! Utility functions

/// Hide the password part of a connection URL before it is logged.
pub fn mask_url_password(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    let Some(at_pos) = rest.find('@') else {
        return url.to_string();
    };
    let credentials = &rest[..at_pos];
    match credentials.find(':') {
        Some(colon) => format!(
            "{}://{}:***{}",
            &url[..scheme_end],
            &credentials[..colon],
            &rest[at_pos..]
        ),
        None => url.to_string(),
    }
}

/// Bytes to megabytes, as used for artifact and storage sizes.
pub fn bytes_to_mb(bytes: i64) -> f64 {
    bytes.max(0) as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_url_password() {
        assert_eq!(
            mask_url_password("postgres://vault:s3cret@db:5432/platform"),
            "postgres://vault:***@db:5432/platform"
        );
        assert_eq!(
            mask_url_password("postgres://db:5432/platform"),
            "postgres://db:5432/platform"
        );
    }

    #[test]
    fn test_bytes_to_mb() {
        assert_eq!(bytes_to_mb(1024 * 1024), 1.0);
        assert_eq!(bytes_to_mb(-5), 0.0);
    }
}
