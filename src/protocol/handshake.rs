//! WebSocket upgrade negotiation
//!
//! Decides, from the upgrade request alone, whether a connection is accepted
//! and which dialect it speaks.

use super::constants::ENGINE_IO_VERSION;
use super::WireProtocol;

/// Reason to refuse an upgrade, mapped to an HTTP status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRejection {
    pub status: u16,
    pub reason: String,
}

impl HandshakeRejection {
    fn bad_request(reason: impl Into<String>) -> Self {
        Self {
            status: 400,
            reason: reason.into(),
        }
    }

    pub fn forbidden_origin(origin: &str) -> Self {
        Self {
            status: 403,
            reason: format!("Origin not allowed: {origin}"),
        }
    }
}

impl std::fmt::Display for HandshakeRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status, self.reason)
    }
}

/// Pick the dialect for an upgrade request
///
/// Requests under `socketio_path` must carry `EIO=4` and, if present,
/// `transport=websocket`. Everything else is plain JSON.
pub fn negotiate(
    path: &str,
    query: Option<&str>,
    socketio_path: &str,
) -> Result<WireProtocol, HandshakeRejection> {
    if path.trim_end_matches('/') != socketio_path.trim_end_matches('/') {
        return Ok(WireProtocol::PlainJson);
    }

    let mut eio = None;
    let mut transport = None;
    for pair in query.unwrap_or_default().split('&') {
        match pair.split_once('=') {
            Some(("EIO", value)) => eio = Some(value),
            Some(("transport", value)) => transport = Some(value),
            _ => {}
        }
    }

    match eio {
        Some(ENGINE_IO_VERSION) => {}
        Some(other) => {
            return Err(HandshakeRejection::bad_request(format!(
                "Unsupported protocol version: EIO={other}"
            )))
        }
        None => return Err(HandshakeRejection::bad_request("Missing EIO query parameter")),
    }

    match transport {
        None | Some("websocket") => Ok(WireProtocol::SocketIo),
        Some(other) => Err(HandshakeRejection::bad_request(format!(
            "Transport unknown: {other}"
        ))),
    }
}

/// Cross-origin check against the configured allow list
///
/// `*` allows everything. Requests without an `Origin` header come from
/// non-browser clients and are always allowed.
pub fn origin_allowed(allowed: &[String], origin: Option<&str>) -> bool {
    match origin {
        None => true,
        Some(origin) => {
            let origin = origin.trim_end_matches('/');
            allowed
                .iter()
                .any(|entry| entry == "*" || entry.trim_end_matches('/') == origin)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "/socket.io/";

    #[test]
    fn test_socketio_path() {
        assert_eq!(
            negotiate("/socket.io/", Some("EIO=4&transport=websocket"), PATH),
            Ok(WireProtocol::SocketIo)
        );
        assert_eq!(
            negotiate("/socket.io", Some("transport=websocket&EIO=4&t=abc"), PATH),
            Ok(WireProtocol::SocketIo)
        );
    }

    #[test]
    fn test_plain_paths() {
        assert_eq!(negotiate("/", None, PATH), Ok(WireProtocol::PlainJson));
        assert_eq!(negotiate("/hands", Some("EIO=3"), PATH), Ok(WireProtocol::PlainJson));
    }

    #[test]
    fn test_rejects_old_engine_io() {
        let err = negotiate("/socket.io/", Some("EIO=3&transport=websocket"), PATH).unwrap_err();
        assert_eq!(err.status, 400);
        assert!(err.reason.contains("EIO=3"));

        let err = negotiate("/socket.io/", None, PATH).unwrap_err();
        assert_eq!(err.status, 400);
    }

    #[test]
    fn test_rejects_polling_transport() {
        let err = negotiate("/socket.io/", Some("EIO=4&transport=polling"), PATH).unwrap_err();
        assert_eq!(err.status, 400);
    }

    #[test]
    fn test_origin_allowed() {
        let any = vec!["*".to_string()];
        assert!(origin_allowed(&any, Some("http://example.com")));
        assert!(origin_allowed(&any, None));

        let list = vec!["http://localhost:5173".to_string()];
        assert!(origin_allowed(&list, Some("http://localhost:5173")));
        assert!(origin_allowed(&list, Some("http://localhost:5173/")));
        assert!(!origin_allowed(&list, Some("http://evil.example")));
        assert!(origin_allowed(&list, None));

        assert!(!origin_allowed(&[], Some("http://localhost:5173")));
    }
}
