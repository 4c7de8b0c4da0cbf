//! Principal extraction from a trusted upstream header.
//!
//! Authentication happens in front of this server. The authenticating
//! proxy forwards the user ID in a configured header; this middleware
//! turns it into a [`Principal`] request extension. Requests without the
//! header, or with an unparsable value, carry no principal.

use std::sync::Arc;

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::hub::Principal;

/// Read the principal from `header`, if present and well formed.
pub fn principal_from_header(request: &Request<Body>, header: &str) -> Option<Principal> {
    let value = request.headers().get(header)?.to_str().ok()?;
    match value.trim().parse::<i64>() {
        Ok(user_id) => Some(Principal::new(user_id)),
        Err(_) => {
            tracing::debug!("Ignoring malformed {} header: {:?}", header, value);
            None
        }
    }
}

/// Middleware function to attach the forwarded principal to the request.
pub async fn trusted_principal(
    header: Arc<str>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // Never trust a principal set by anything but the header.
    request.extensions_mut().remove::<Principal>();
    if let Some(principal) = principal_from_header(&request, &header) {
        request.extensions_mut().insert(principal);
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(header: &str, value: &str) -> Request<Body> {
        Request::builder()
            .header(header, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_principal_from_header() {
        let request = request_with("x-user-id", " 7 ");
        assert_eq!(
            principal_from_header(&request, "x-user-id"),
            Some(Principal::new(7))
        );
    }

    #[test]
    fn test_missing_or_malformed_header() {
        let request = request_with("x-user-id", "seven");
        assert_eq!(principal_from_header(&request, "x-user-id"), None);
        assert_eq!(principal_from_header(&request, "x-other"), None);
    }
}
