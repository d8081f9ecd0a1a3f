#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;
use std::time::Duration;

use garmin_fetch::api::{
    AuthenticatedSession, AuthenticationFlow, Credentials, DebugArtifacts, HttpSession,
    RegexScraper,
};
use garmin_fetch::Config;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const SEARCH_PATH: &str = "/modern/proxy/activitylist-service/activities/search/activities";
pub const TICKET: &str = "ST-0475312-aBcDeF-cas";

pub const LOGIN_PAGE: &str = r#"<html><body><form method="post">
<input type="hidden" name="_csrf" value="7F3A9C0D1E2B"/>
<input name="username"/></form></body></html>"#;

pub const CHALLENGE_PAGE: &str = "<html><body>Checking your browser...</body></html>";

pub fn ticket_page() -> String {
    format!(
        r#"<script>var response_url = "https:\/\/connect.garmin.com\/modern?ticket={}";</script>"#,
        TICKET
    )
}

pub const HOME_PAGE: &str = r#"<html><script>
window.VIEWER_USERPREFERENCES = {\"displayName\":\"trailrunner\",\"measurementSystem\":\"metric\"};
window.VIEWER_SOCIAL_PROFILE = {\"fullName\":\"Trail Runner\",\"userName\":\"trailrunner\"};
</script></html>"#;

/// Config pointing both hosts at `server`, with scratch directories under `root`.
pub fn test_config(server: &MockServer, root: &Path) -> Config {
    let mut config = Config::default();
    config.account.username = "runner@example.com".to_string();
    config.endpoints.sso_base_url = server.uri();
    config.endpoints.connect_base_url = server.uri();
    config.options.staging_directory = Some(root.join("staging"));
    config.options.debug_directory = root.join("debug");
    config.options.output_directory = Some(root.join("fit"));
    config.options.rate_limit_ms = 10;
    config.options.request_timeout_secs = 5;
    config.options.show_progress = false;
    config
}

pub fn credentials() -> Credentials {
    Credentials::new("runner@example.com", "correct-horse")
}

/// Mount the three handshake responses.
pub async fn mount_login(server: &MockServer) {
    mount_login_with(server, LOGIN_PAGE, &ticket_page(), HOME_PAGE).await;
}

pub async fn mount_login_with(server: &MockServer, login: &str, post: &str, home: &str) {
    Mock::given(method("GET"))
        .and(path("/sso/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_string(login))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sso/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_string(post))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/modern"))
        .and(query_param("ticket", TICKET))
        .respond_with(ResponseTemplate::new(200).set_body_string(home))
        .mount(server)
        .await;
}

/// Build the flow the pipeline would build for `config`.
pub fn flow(config: &Config) -> AuthenticationFlow {
    let endpoints = &config.endpoints;
    let connect = HttpSession::new(
        endpoints,
        &endpoints.connect_base_url,
        &endpoints.connect_prefix,
        Duration::from_secs(5),
    )
    .unwrap();
    let sso = connect
        .sibling(&endpoints.sso_base_url, &endpoints.sso_prefix)
        .unwrap();

    AuthenticationFlow::new(
        sso,
        connect,
        credentials(),
        Box::new(RegexScraper::new(&config.scraping).unwrap()),
        DebugArtifacts::new(&config.options.debug_directory),
        endpoints.clone(),
    )
}

pub async fn login(config: &Config) -> AuthenticatedSession {
    flow(config).authenticate().await.unwrap()
}

/// Search response with one summary per id.
pub fn activities(ids: &[u64]) -> serde_json::Value {
    serde_json::Value::Array(
        ids.iter()
            .map(|id| {
                serde_json::json!({
                    "activityId": id,
                    "activityName": format!("Morning Run {}", id),
                    "startTimeLocal": "2024-05-01 07:15:00",
                    "activityType": { "typeKey": "running" },
                    "distance": 10012.5
                })
            })
            .collect(),
    )
}

pub async fn mount_search(server: &MockServer, ids: &[u64]) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(activities(ids)))
        .mount(server)
        .await;
}

pub fn download_path(id: u64) -> String {
    format!("/modern/proxy/download-service/files/activity/{}", id)
}

/// Mount an archive for `id` holding one `{id}_ACTIVITY.fit` entry.
pub async fn mount_archive(server: &MockServer, id: u64, expected: u64) {
    let name = format!("{}_ACTIVITY.fit", id);
    Mock::given(method("GET"))
        .and(path(download_path(id)))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(zip_bytes(&[(&name, b".FIT-payload")])),
        )
        .expect(expected)
        .mount(server)
        .await;
}

pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Requests the server saw for `path`.
pub async fn request_count(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}
