// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn schemes(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

#[yare::parameterized(
    plain = { "https://ha.example.org", "/gateway/proxy", "relayprint", "https://ha.example.org/gateway/proxy/relayprint/" },
    trailing_slashes = { "https://ha.example.org/", "/gateway/proxy/", "relayprint", "https://ha.example.org/gateway/proxy/relayprint/" },
    no_leading_slash = { "http://10.0.0.2:8123", "gateway/proxy", "local_relayprint", "http://10.0.0.2:8123/gateway/proxy/local_relayprint/" },
    empty_path = { "https://ha.example.org", "", "relayprint", "https://ha.example.org/relayprint/" },
)]
fn gateway_url(issuer: &str, path: &str, addon: &str, expected: &str) {
    let c = gateway_candidate(issuer, path, addon);
    assert_eq!(c.base_url, expected);
    assert_eq!(c.kind, StrategyKind::GatewayProxied);
    assert_eq!(c.auth_mode, AuthMode::GatewaySession { addon: addon.to_owned() });
}

#[test]
fn direct_keeps_host_and_orders_schemes() -> anyhow::Result<()> {
    let candidates = direct_candidates(
        "https://ha.example.org/some/path",
        7779,
        &schemes(&["http", "https"]),
        &AuthMode::Bearer,
    )
    .ok_or_else(|| anyhow::anyhow!("no candidates"))?;
    let urls: Vec<&str> = candidates.iter().map(|c| c.base_url.as_str()).collect();
    assert_eq!(urls, ["http://ha.example.org:7779/", "https://ha.example.org:7779/"]);
    assert!(candidates.iter().all(|c| c.kind == StrategyKind::Direct && c.priority() == 1));
    Ok(())
}

#[test]
fn direct_replaces_issuer_port() -> anyhow::Result<()> {
    let candidates =
        direct_candidates("http://192.168.1.20:8123", 7779, &schemes(&["http"]), &AuthMode::Anonymous)
            .ok_or_else(|| anyhow::anyhow!("no candidates"))?;
    assert_eq!(candidates[0].base_url, "http://192.168.1.20:7779/");
    Ok(())
}

#[test]
fn direct_brackets_ipv6_hosts() -> anyhow::Result<()> {
    let candidates =
        direct_candidates("http://[fd00::1]:8123", 7779, &schemes(&["http"]), &AuthMode::Bearer)
            .ok_or_else(|| anyhow::anyhow!("no candidates"))?;
    assert_eq!(candidates[0].base_url, "http://[fd00::1]:7779/");
    Ok(())
}

#[test]
fn direct_needs_a_host() {
    assert!(direct_candidates("not a url", 7779, &schemes(&["http"]), &AuthMode::Bearer).is_none());
}

#[test]
fn tunnel_base_is_normalized() {
    let c = tunnel_candidate("https://abc.trycloudflare.com", &AuthMode::Bearer);
    assert_eq!(c.base_url, "https://abc.trycloudflare.com/");
    assert_eq!(c.priority(), 2);
}

fn addon(slug: &str) -> AddonInfo {
    AddonInfo { slug: slug.to_owned(), name: None, state: None }
}

#[test]
fn configured_addon_is_the_only_candidate() {
    let out = addon_candidates(
        Some("custom"),
        Some("relayprint"),
        &[addon("a0d7b954_relayprint")],
        "relayprint",
        &schemes(&["relayprint"]),
    );
    assert_eq!(out, ["custom"]);
}

#[test]
fn addon_order_is_stored_listed_well_known() {
    let out = addon_candidates(
        None,
        Some("local_relayprint"),
        &[addon("core_mosquitto"), addon("a0d7b954_relayprint"), addon("local_relayprint")],
        "relayprint",
        &schemes(&["relayprint", "local_relayprint"]),
    );
    assert_eq!(out, ["local_relayprint", "a0d7b954_relayprint", "relayprint"]);
}

#[test]
fn empty_pattern_ignores_listing() {
    let out = addon_candidates(None, None, &[addon("core_mosquitto")], "", &schemes(&["relayprint"]));
    assert_eq!(out, ["relayprint"]);
}
