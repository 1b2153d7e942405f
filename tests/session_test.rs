// tests/session_test.rs

use social_dl::{
    client::RobustClient,
    config::AppConfig,
    constants::templates,
    models::PlatformTag,
    session::{SessionManager, SessionProfile, SessionRegistry},
};
use std::{path::Path, sync::Arc, time::Duration};

const COOKIES: &str = "# Netscape HTTP Cookie File\n\
.instagram.com\tTRUE\t/\tTRUE\t0\tsessionid\t42%3Aabc%3A1\n\
.instagram.com\tTRUE\t/\tTRUE\t0\tds_user_id\t42\n\
.instagram.com\tTRUE\t/\tTRUE\t0\tcsrftoken\tsecret\n";

fn photo_session(dir: &Path) -> SessionManager {
    let path = dir.join("cookies.txt");
    std::fs::write(&path, COOKIES).unwrap();
    let mut manager = SessionManager::new(SessionProfile::photo_social(), Some(path), None, Duration::ZERO);
    manager.load_credentials();
    manager
}

fn config_with_home(home: String) -> AppConfig {
    let mut config = AppConfig::default();
    config.url_templates.insert(templates::PHOTO_SOCIAL_HOME.to_string(), home);
    config
}

#[tokio::test]
async fn test_validate_detects_logged_in_markers() {
    let mut server = mockito::Server::new_async().await;
    let home = server
        .mock("GET", "/")
        .match_header("cookie", mockito::Matcher::Regex("sessionid=".into()))
        .with_status(200)
        .with_body(r#"<script>{"viewer":{"username":"someone"}}</script>"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let session = photo_session(dir.path());
    let config = config_with_home(format!("{}/", server.url()));
    let client = RobustClient::new(Arc::new(config.clone())).unwrap();

    assert!(session.is_authenticated());
    assert!(session.validate(&client, &config).await.unwrap());
    home.assert_async().await;
}

#[tokio::test]
async fn test_validate_treats_forbidden_as_expired() {
    let mut server = mockito::Server::new_async().await;
    let _home = server.mock("GET", "/").with_status(403).create_async().await;

    let dir = tempfile::tempdir().unwrap();
    let session = photo_session(dir.path());
    let config = config_with_home(format!("{}/", server.url()));
    let client = RobustClient::new(Arc::new(config.clone())).unwrap();

    assert!(!session.validate(&client, &config).await.unwrap());
}

#[tokio::test]
async fn test_validate_without_cookies_makes_no_request() {
    let mut server = mockito::Server::new_async().await;
    let home = server.mock("GET", "/").expect(0).create_async().await;

    let session = SessionManager::new(SessionProfile::photo_social(), None, None, Duration::ZERO);
    let config = config_with_home(format!("{}/", server.url()));
    let client = RobustClient::new(Arc::new(config.clone())).unwrap();

    assert!(!session.validate(&client, &config).await.unwrap());
    home.assert_async().await;
}

#[test]
fn test_threaded_social_shares_photo_social_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = SessionRegistry::default();
    registry.insert(photo_session(dir.path()));

    let shared = registry.for_platform(PlatformTag::ThreadedSocial).expect("shared session");
    assert_eq!(shared.platform(), PlatformTag::PhotoSocial);
    assert!(shared.is_authenticated());
    assert!(registry.for_platform(PlatformTag::PinBoard).is_none());
}

#[test]
fn test_cookie_header_is_built_but_debug_hides_values() {
    let dir = tempfile::tempdir().unwrap();
    let session = photo_session(dir.path());

    let headers = session.get_headers();
    let cookie = headers.get("Cookie").expect("cookie header");
    assert!(cookie.contains("ds_user_id=42"));
    assert!(!format!("{:?}", session).contains("secret"));
}
