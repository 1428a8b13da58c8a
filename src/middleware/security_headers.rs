use axum::{
    body::Body,
    http::{Request, Response, header},
    middleware::Next,
};

/// Add security headers to all responses to prevent common web vulnerabilities
pub async fn add_security_headers(request: Request<Body>, next: Next) -> Response<Body> {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();

    // Prevent MIME type sniffing
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        "nosniff".parse().expect("valid header value"),
    );

    // Prevent clickjacking
    headers.insert(
        header::X_FRAME_OPTIONS,
        "DENY".parse().expect("valid header value"),
    );

    // Control referrer information
    headers.insert(
        header::REFERRER_POLICY,
        "strict-origin-when-cross-origin"
            .parse()
            .expect("valid header value"),
    );

    response
}
