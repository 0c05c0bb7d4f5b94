//! Rate limiter and retry loop tests.
//!
//! The limiter is driven with scripted responses under a paused clock, so
//! waits are exact and instantaneous. A final group talks to a throwaway
//! local HTTP responder to check the live transport end to end.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chatsweep::client::{ApiResponse, Credential, HttpTransport, RateLimiter, RetryPolicy, Transport};
use chatsweep::{ChatsweepError, Snowflake};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;

// ============================================================================
// Scripted responses
// ============================================================================

struct Script {
    responses: Mutex<VecDeque<ApiResponse>>,
    calls: AtomicUsize,
}

impl Script {
    fn new(responses: Vec<ApiResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn next(&self) -> ApiResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ApiResponse::new(429, r#"{"retry_after": 0.01}"#))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn run(limiter: &RateLimiter, script: &Arc<Script>) -> chatsweep::Result<ApiResponse> {
    limiter
        .execute("/channels/1/messages", || {
            let script = script.clone();
            async move { Ok(script.next()) }
        })
        .await
}

fn limiter() -> RateLimiter {
    RateLimiter::new(RetryPolicy::immediate())
}

#[tokio::test(start_paused = true)]
async fn rate_limit_suspends_once_then_succeeds() {
    let script = Script::new(vec![
        ApiResponse::new(429, r#"{"retry_after": 1.2, "global": false}"#),
        ApiResponse::ok("[]"),
    ]);
    let start = Instant::now();

    let response = run(&limiter(), &script).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(script.calls(), 2);
    assert!(start.elapsed() >= Duration::from_millis(1200));
    assert!(start.elapsed() < Duration::from_millis(1300));
}

#[tokio::test(start_paused = true)]
async fn unreadable_retry_after_uses_default_wait() {
    let script = Script::new(vec![ApiResponse::new(429, "<html>slow down</html>"), ApiResponse::ok("[]")]);
    let start = Instant::now();

    run(&limiter(), &script).await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn status_codes_map_to_errors_without_retry() {
    let cases: [(u16, fn(&ChatsweepError) -> bool); 4] = [
        (401, |e| e.is_authentication()),
        (403, |e| e.is_permission_denied()),
        (404, |e| matches!(e, ChatsweepError::RemoteApi { status: 404, .. })),
        (500, |e| matches!(e, ChatsweepError::RemoteApi { status: 500, .. })),
    ];

    for (status, check) in cases {
        let script = Script::new(vec![ApiResponse::new(status, "{}")]);
        let err = run(&limiter(), &script).await.unwrap_err();
        assert!(check(&err), "status {status} gave {err:?}");
        assert_eq!(script.calls(), 1, "status {status} was retried");
    }
}

#[tokio::test(start_paused = true)]
async fn authentication_is_fatal_and_the_rest_are_per_source() {
    let script = Script::new(vec![ApiResponse::new(401, "")]);
    assert!(run(&limiter(), &script).await.unwrap_err().is_fatal());

    let script = Script::new(vec![ApiResponse::new(403, "")]);
    let err = run(&limiter(), &script).await.unwrap_err();
    assert!(!err.is_fatal());
    assert!(err.is_source_recoverable());
}

#[tokio::test(start_paused = true)]
async fn retries_exhaust_after_max_attempts() {
    let script = Script::new(vec![]);

    let err = run(&limiter(), &script).await.unwrap_err();

    assert!(matches!(err, ChatsweepError::RetryExhausted { attempts: 5, .. }));
    assert_eq!(script.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn max_attempts_is_configurable() {
    let limiter = RateLimiter::new(RetryPolicy::immediate().with_max_attempts(2));
    let script = Script::new(vec![]);

    let err = run(&limiter, &script).await.unwrap_err();

    assert!(matches!(err, ChatsweepError::RetryExhausted { attempts: 2, .. }));
    assert_eq!(script.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn non_transient_send_errors_propagate_immediately() {
    let calls = AtomicUsize::new(0);
    let err = limiter()
        .execute("/users/@me", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ChatsweepError::malformed("bad frame")) }
        })
        .await
        .unwrap_err();

    assert!(err.is_malformed());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_holds_every_caller_sharing_the_limiter() {
    let shared = Arc::new(RateLimiter::new(RetryPolicy::immediate().with_max_attempts(1)));

    let first = Script::new(vec![ApiResponse::new(429, r#"{"retry_after": 2.0}"#)]);
    assert!(run(&shared, &first).await.is_err());

    let start = Instant::now();
    let other = Arc::clone(&shared);
    let second = Script::new(vec![ApiResponse::ok("[]")]);
    let handle = tokio::spawn(async move { run(&other, &second).await.map(|r| r.status) });

    assert_eq!(handle.await.unwrap().unwrap(), 200);
    assert!(start.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn pacing_spaces_consecutive_requests() {
    let policy = RetryPolicy {
        request_delay_ms: 250,
        request_jitter_ms: 0,
        ..RetryPolicy::immediate()
    };
    let limiter = RateLimiter::new(policy);
    let script = Script::new(vec![ApiResponse::ok("[]"), ApiResponse::ok("[]"), ApiResponse::ok("[]")]);
    let start = Instant::now();

    for _ in 0..3 {
        run(&limiter, &script).await.unwrap();
    }

    assert!(start.elapsed() >= Duration::from_millis(750));
}

// ============================================================================
// Live transport against a local responder
// ============================================================================

/// Serves `responses` in order, one connection each, and records every request head.
async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();

    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16 * 1024];
            let mut read = 0;
            loop {
                let n = socket.read(&mut buf[read..]).await.unwrap();
                read += n;
                if n == 0 || buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            log.lock()
                .unwrap()
                .push(String::from_utf8_lossy(&buf[..read]).to_string());

            let response = format!(
                "HTTP/1.1 {status} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
    });

    (format!("http://{addr}"), seen)
}

fn transport(base: &str, credential: Credential) -> HttpTransport {
    HttpTransport::new(credential)
        .unwrap()
        .with_base_url(base)
        .with_limiter(Arc::new(RateLimiter::new(RetryPolicy::immediate())))
}

#[tokio::test]
async fn http_page_is_retried_after_429_without_duplicates() {
    let page = r#"[{"id": "4194304", "author": {"username": "a"}}, {"id": "8388608", "author": {"username": "b"}}]"#;
    let (base, seen) = serve(vec![(429, r#"{"retry_after": 0.2}"#), (200, page)]).await;
    let transport = transport(&base, Credential::Bot("secret".into()));
    let start = std::time::Instant::now();

    let records = transport
        .messages_page(Snowflake(5), Some(Snowflake(99)), 100)
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert!(start.elapsed() >= Duration::from_millis(200));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    let head = seen[0].to_lowercase();
    assert!(head.starts_with("get /channels/5/messages?"));
    assert!(head.contains("limit=100"));
    assert!(head.contains("before=99"));
    assert!(head.contains("authorization: bot secret"));
}

#[tokio::test]
async fn http_page_after_sends_after_cursor() {
    let (base, seen) = serve(vec![(200, r#"[{"id": "8388608", "author": {"username": "b"}}]"#)]).await;
    let transport = transport(&base, Credential::User("t".into()));

    let records = transport.messages_after(Snowflake(5), Snowflake(41), 2).await.unwrap();

    assert_eq!(records.len(), 1);
    let head = seen.lock().unwrap()[0].to_lowercase();
    assert!(head.starts_with("get /channels/5/messages?"));
    assert!(head.contains("limit=2"));
    assert!(head.contains("after=41"));
    assert!(!head.contains("before="));
}

#[tokio::test]
async fn http_unauthorized_maps_to_authentication() {
    let (base, _) = serve(vec![(401, r#"{"message": "401: Unauthorized", "code": 0}"#)]).await;
    let transport = transport(&base, Credential::User("bad".into()));

    let err = transport.current_user().await.unwrap_err();

    assert!(err.is_authentication());
}

#[tokio::test]
async fn http_discovery_decodes_records() {
    let guild_channels = r#"[
        {"id": "11", "type": 0, "name": "general", "guild_id": "7"},
        {"id": "12", "type": 2, "name": "voice", "guild_id": "7"},
        {"id": "13", "type": 5, "name": "announcements", "guild_id": "7"}
    ]"#;
    let (base, seen) = serve(vec![(200, guild_channels)]).await;
    let transport = transport(&base, Credential::User("t".into()));
    let guild = serde_json::from_str(r#"{"id": "7", "name": "Rust"}"#).unwrap();

    let sources = transport.text_sources(&guild).await.unwrap();

    let names: Vec<_> = sources.iter().map(|s| s.label()).collect();
    assert_eq!(names, ["Rust › #announcements", "Rust › #general"]);
    assert!(seen.lock().unwrap()[0].starts_with("GET /guilds/7/channels"));
}
