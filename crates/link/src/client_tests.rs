// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    bare = { "http://host:7779", "http://host:7779/" },
    slash = { "http://host:7779/", "http://host:7779/" },
    many_slashes = { "http://host:7779///", "http://host:7779/" },
    with_path = { "https://ha.example.org/gateway/proxy/relayprint", "https://ha.example.org/gateway/proxy/relayprint/" },
)]
fn normalize_base_appends_single_slash(input: &str, expected: &str) {
    assert_eq!(normalize_base(input), expected);
}

#[yare::parameterized(
    plain = { "http://host/", "api/health", "http://host/api/health" },
    leading_slash = { "http://host/", "/api/health", "http://host/api/health" },
    no_trailing = { "http://host", "api/health", "http://host/api/health" },
    nested_base = { "http://host/gateway/proxy/x/", "/api/config/remote", "http://host/gateway/proxy/x/api/config/remote" },
)]
fn join_url_never_doubles_slashes(base: &str, path: &str, expected: &str) {
    assert_eq!(join_url(base, path), expected);
}

#[test]
fn attach_bearer_from_option() {
    assert_eq!(Attach::bearer(None), Attach::None);
    assert_eq!(Attach::bearer(Some("t".into())), Attach::Bearer("t".into()));
}

#[test]
fn gateway_attach_sets_cookie_and_bearer() -> anyhow::Result<()> {
    let client = http_client(Duration::from_secs(1));
    let attach = Attach::Gateway { session: "abc".into(), bearer: Some("tok".into()) };
    let req = attach.apply(client.get("http://localhost/")).build()?;

    let cookie = req.headers().get(reqwest::header::COOKIE).map(|v| v.to_str()).transpose()?;
    assert_eq!(cookie, Some("ingress_session=abc"));
    let auth =
        req.headers().get(reqwest::header::AUTHORIZATION).map(|v| v.to_str()).transpose()?;
    assert_eq!(auth, Some("Bearer tok"));
    Ok(())
}

#[test]
fn api_response_success_range() {
    let ok = ApiResponse { status: 204, body: Bytes::new() };
    let redirect = ApiResponse { status: 302, body: Bytes::new() };
    assert!(ok.is_success());
    assert!(!redirect.is_success());
}
