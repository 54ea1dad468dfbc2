//! Request handlers.

use std::net::SocketAddr;

use axum::http::HeaderMap;

mod http;
mod websocket;

pub use http::{
    announce, ban_ip, ban_user, get_state, grant_admin, health_check, kick, lock_site, purge,
    revoke_admin, unban_ip, unban_user, unlock_site,
};
pub use websocket::websocket_handler;

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Client IP used for IP bans
///
/// With `trust_forwarded_for`, the left-most `x-forwarded-for` entry wins over the peer address.
pub(crate) fn client_ip(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for
        && let Some(forwarded) = headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    {
        return forwarded.to_string();
    }
    peer.ip().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "192.168.1.20:51000".parse().unwrap()
    }

    #[test]
    fn test_client_ip_uses_peer_address_by_default() {
        // テスト項目: プロキシを信頼しない設定では x-forwarded-for を無視する
        // given (前提条件):
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static("10.0.0.9"));

        // when (操作):
        let ip = client_ip(&headers, peer(), false);

        // then (期待する結果):
        assert_eq!(ip, "192.168.1.20");
    }

    #[test]
    fn test_client_ip_uses_first_forwarded_entry_when_trusted() {
        // テスト項目: プロキシを信頼する設定では x-forwarded-for の先頭を使う
        // given (前提条件):
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR_HEADER,
            HeaderValue::from_static(" 10.0.0.9 , 172.16.0.1"),
        );

        // when (操作):
        let forwarded = client_ip(&headers, peer(), true);
        let fallback = client_ip(&HeaderMap::new(), peer(), true);

        // then (期待する結果):
        assert_eq!(forwarded, "10.0.0.9");
        assert_eq!(fallback, "192.168.1.20");
    }
}
