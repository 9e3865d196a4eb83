mod common;

use std::sync::Arc;

use common::*;
use tallyroom::jwt::TokenType;
use tallyroom::run_server;
use tallyroom::scheduler::{HttpSessionClient, RefreshScheduler, SchedulerAction};
use tokio::net::TcpListener;
use url::Url;

/// Serve the app on a random local port.
async fn start(backend: FakeBackend) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_test_app(FakeProvider::default(), backend);
    tokio::spawn(async move {
        run_server(app, listener).await.ok();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

fn client_with_refresh_cookie(base: &Url, refresh_token: &str) -> HttpSessionClient {
    let jar = Arc::new(reqwest::cookie::Jar::default());
    jar.add_cookie_str(&format!("refresh_token={refresh_token}; Path=/"), base);
    HttpSessionClient::new(base.clone(), jar).unwrap()
}

#[tokio::test]
async fn test_lapsed_session_is_restored() {
    let backend = FakeBackend::default();
    let base = start(backend.clone()).await;
    let client = client_with_refresh_cookie(&base, &mint(TokenType::Refresh, 3600));
    let mut scheduler = RefreshScheduler::new(client);

    assert_eq!(scheduler.tick().await, SchedulerAction::Refreshed);
    assert_eq!(backend.refreshed_with.lock().unwrap().len(), 1);

    // New cookies came back in the refresh response.
    assert_eq!(scheduler.tick().await, SchedulerAction::NoRefreshNeeded);
    assert!(scheduler.session().unwrap().is_authenticated);
}

#[tokio::test]
async fn test_dead_refresh_token_logs_out() {
    let base = start(FakeBackend::with_mode(BackendMode::Reject)).await;
    let client = client_with_refresh_cookie(&base, &mint(TokenType::Refresh, 3600));
    let mut scheduler = RefreshScheduler::new(client);

    assert_eq!(scheduler.tick().await, SchedulerAction::LoggedOut);

    scheduler.invalidate();
    assert_eq!(scheduler.tick().await, SchedulerAction::NoRefreshNeeded);
    assert!(!scheduler.session().unwrap().has_credentials());
}
