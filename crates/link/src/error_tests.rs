// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    unauthorized = { 401, Some(FailureClass::Connection) },
    forbidden = { 403, Some(FailureClass::Connection) },
    internal = { 500, Some(FailureClass::Connection) },
    bad_gateway = { 502, Some(FailureClass::Connection) },
    unavailable = { 503, Some(FailureClass::Connection) },
    bad_request = { 400, Some(FailureClass::Application) },
    not_found = { 404, Some(FailureClass::Application) },
    conflict = { 409, Some(FailureClass::Application) },
    unprocessable = { 422, Some(FailureClass::Application) },
    ok = { 200, None },
    no_content = { 204, None },
    redirect = { 302, None },
)]
fn failure_class_from_status(status: u16, expected: Option<FailureClass>) {
    assert_eq!(FailureClass::from_status(status), expected);
}

#[test]
fn network_error_does_not_require_login() {
    assert!(!AuthError::NetworkError("timeout".into()).requires_login());
    assert!(AuthError::NotAuthenticated.requires_login());
    assert!(AuthError::ServerRejected { status: 400, body: "invalid_grant".into() }
        .requires_login());
}

#[test]
fn discovery_error_display_includes_classification() {
    let err = DiscoveryError::new(DiscoveryClass::ManualEntryRequired, "no tunnel url");
    assert_eq!(err.to_string(), "manual entry required: no tunnel url");
    assert_eq!(SupervisorError::from(err).as_str(), "MANUAL_ENTRY_REQUIRED");
}

#[test]
fn discovery_class_serializes_snake_case() -> anyhow::Result<()> {
    let json = serde_json::to_string(&DiscoveryClass::AllStrategiesUnreachable)?;
    assert_eq!(json, "\"all_strategies_unreachable\"");
    Ok(())
}
