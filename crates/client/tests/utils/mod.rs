pub mod polling_server;
pub mod socket_server;

use stockmaster_client::{ConnectionState, EventClient};
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout, Duration, Instant};

#[allow(unused_imports)]
pub use polling_server::FakePollingServer;
#[allow(unused_imports)]
pub use socket_server::{closed_port_url, FakeSocketServer};

// ============================================================================
// Wait Helpers
// ============================================================================

/// Wait until the client's state satisfies `predicate`, panicking after five seconds.
#[allow(dead_code)]
pub async fn wait_for_state(client: &EventClient, predicate: impl Fn(&ConnectionState) -> bool) {
    let mut rx = client.watch_state();
    let reached = matches!(
        timeout(Duration::from_secs(5), rx.wait_for(|state| predicate(state))).await,
        Ok(Ok(_))
    );
    assert!(
        reached,
        "state never reached, last state: {:?}",
        client.state()
    );
}

/// Poll `condition` until it holds, panicking after five seconds.
#[allow(dead_code)]
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within 5s");
        sleep(Duration::from_millis(10)).await;
    }
}

/// Serve an axum router on an ephemeral port and return its base URL.
#[allow(dead_code)]
pub async fn serve(app: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{port}")
}
