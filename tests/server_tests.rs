//! End-to-end tests against a live server on an ephemeral port, with a
//! canned upstream speaking plain HTTP/1.1 on loopback.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use vadret::config::AppConfig;
use vadret::server::Server;
use vadret::AppState;

struct TestServer {
    addr: SocketAddr,
    cache_dir: PathBuf,
    _dir: tempfile::TempDir,
}

/// Bind a server on port 0 with temp cache/surprise directories.
/// `seed` can pre-place cache files; it runs before the caches load.
async fn start_server(upstream_port: u16, seed: impl FnOnce(&Path)) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("cache");
    std::fs::create_dir_all(cache_dir.join("weather")).unwrap();
    let surprise_dir = dir.path().join("surprise");
    std::fs::create_dir_all(&surprise_dir).unwrap();
    seed(dir.path());

    let config = AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        geocoding_host: "127.0.0.1".to_string(),
        forecast_host: "127.0.0.1".to_string(),
        upstream_port,
        cache_dir: cache_dir.display().to_string(),
        surprise_dir: surprise_dir.display().to_string(),
        ..AppConfig::default()
    };

    let state = Arc::new(AppState::init(config).await.unwrap());
    let server = Server::bind(state).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run(std::future::pending()));

    TestServer {
        addr,
        cache_dir,
        _dir: dir,
    }
}

/// A canned upstream: answers `/v1/search` with `geocode_body` and
/// anything else with `forecast_body`, one request per connection.
async fn spawn_upstream(geocode_body: &str, forecast_body: &str) -> u16 {
    let geocode_body = geocode_body.to_string();
    let forecast_body = forecast_body.to_string();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let geocode = geocode_body.clone();
            let forecast = forecast_body.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut filled = 0;
                while !buf[..filled].windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf[filled..]).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => filled += n,
                    }
                }
                let head = String::from_utf8_lossy(&buf[..filled]).into_owned();
                let body = if head.contains("/v1/search") {
                    geocode
                } else {
                    forecast
                };
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    port
}

/// Send raw bytes, read to EOF, split into (status, head, body).
async fn raw_request(addr: SocketAddr, request: &str) -> (u16, String, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();

    let text = String::from_utf8(raw).unwrap();
    let (head, body) = text.split_once("\r\n\r\n").expect("no header terminator");
    let status: u16 = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("no status code");
    (status, head.to_string(), body.to_string())
}

async fn http_get(addr: SocketAddr, target: &str) -> (u16, String, String) {
    raw_request(addr, &format!("GET {target} HTTP/1.1\r\nHost: x\r\n\r\n")).await
}

fn seed_geocode_csv(root: &Path) {
    std::fs::write(
        root.join("cache/location_coordinates.csv"),
        "Stockholm,59.3293,18.0686\n",
    )
    .unwrap();
}

fn seed_weather_file(root: &Path, body: &str) {
    std::fs::write(
        root.join("cache/weather/stockholm-59.3293-18.0686.json"),
        body,
    )
    .unwrap();
}

#[tokio::test]
async fn health_probe() {
    let server = start_server(1, |_| {}).await;
    let (status, head, body) = http_get(server.addr, "/health").await;

    assert_eq!(status, 200);
    assert!(head.contains("Content-Type: application/json"));
    assert!(head.contains("Connection: close"));
    assert_eq!(body, r#"{"status":"ok"}"#);
}

#[tokio::test]
async fn cities_list() {
    let server = start_server(1, |_| {}).await;
    let (status, _, body) = http_get(server.addr, "/cities").await;

    assert_eq!(status, 200);
    let cities: serde_json::Value = serde_json::from_str(&body).unwrap();
    let list = cities.as_array().unwrap();
    assert!(!list.is_empty());
    for city in list {
        assert!(city.get("name").is_some());
        assert!(city.get("latitude").is_some());
        assert!(city.get("longitude").is_some());
    }
    let stockholm = list
        .iter()
        .find(|c| c["name"] == "Stockholm")
        .expect("Stockholm missing");
    assert!((stockholm["latitude"].as_f64().unwrap() - 59.33).abs() < 0.01);
    assert!((stockholm["longitude"].as_f64().unwrap() - 18.07).abs() < 0.01);
}

#[tokio::test]
async fn cached_weather_needs_no_network() {
    // Upstream port 1 refuses connections, so a 200 proves the
    // response came entirely from the caches.
    let server = start_server(1, |root| {
        seed_geocode_csv(root);
        seed_weather_file(root, r#"{"current_weather":{"temperature":5}}"#);
    })
    .await;

    let (status, _, body) = http_get(server.addr, "/weather?city=Stockholm").await;
    assert_eq!(status, 200);

    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["current_weather"]["temperature"], 5);
    assert_eq!(parsed["city"], "Stockholm");
    assert_eq!(parsed["req_location"], "Stockholm");
}

#[tokio::test]
async fn normalization_hits_the_same_cache_entry() {
    let server = start_server(1, |root| {
        seed_geocode_csv(root);
        seed_weather_file(root, r#"{"current_weather":{"temperature":5}}"#);
    })
    .await;

    let (status, _, body) = http_get(server.addr, "/weather?city=STOCKHOLM").await;
    assert_eq!(status, 200);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["city"], "Stockholm");
    assert_eq!(parsed["req_location"], "STOCKHOLM");

    let (status, _, body) = http_get(server.addr, "/weather?city=stockholm%20").await;
    assert_eq!(status, 200);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["current_weather"]["temperature"], 5);
}

#[tokio::test]
async fn unknown_city_is_not_found() {
    let upstream_port = spawn_upstream(r#"{"results":[]}"#, "{}").await;
    let server = start_server(upstream_port, |_| {}).await;

    let (status, _, body) = http_get(server.addr, "/weather?city=Xyzzy").await;
    assert_eq!(status, 404);
    assert_eq!(body, r#"{"error":"Location not found","city":"Xyzzy"}"#);
}

#[tokio::test]
async fn poisoned_cache_entry_is_evicted_and_refetched() {
    let fresh_body = r#"{"current_weather":{"temperature":7}}"#;
    let upstream_port = spawn_upstream(
        r#"{"results":[{"name":"Stockholm","latitude":59.3293,"longitude":18.0686}]}"#,
        fresh_body,
    )
    .await;
    let server = start_server(upstream_port, |root| {
        seed_geocode_csv(root);
        seed_weather_file(root, r#"{"error":"Too many concurrent requests"}"#);
    })
    .await;

    let (status, _, body) = http_get(server.addr, "/weather?city=Stockholm").await;
    assert_eq!(status, 200);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["current_weather"]["temperature"], 7);

    let cached = std::fs::read_to_string(
        server.cache_dir.join("weather/stockholm-59.3293-18.0686.json"),
    )
    .unwrap();
    assert_eq!(cached, fresh_body);
}

#[tokio::test]
async fn live_fetch_geocodes_then_fetches_and_caches() {
    let forecast_body = r#"{"current_weather":{"temperature":-3}}"#;
    let upstream_port = spawn_upstream(
        r#"{"results":[{"name":"Kiruna","latitude":67.85572,"longitude":20.22513}]}"#,
        forecast_body,
    )
    .await;
    let server = start_server(upstream_port, |_| {}).await;

    let (status, _, body) = http_get(server.addr, "/weather?city=KIRUNA").await;
    assert_eq!(status, 200);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["city"], "Kiruna");
    assert_eq!(parsed["req_location"], "KIRUNA");

    // Coordinates are rounded to four decimals everywhere they land.
    let csv = std::fs::read_to_string(server.cache_dir.join("location_coordinates.csv")).unwrap();
    assert_eq!(csv, "Kiruna,67.8557,20.2251\n");
    let cached = std::fs::read_to_string(
        server.cache_dir.join("weather/kiruna-67.8557-20.2251.json"),
    )
    .unwrap();
    assert_eq!(cached, forecast_body);
}

#[tokio::test]
async fn options_answers_preflight() {
    let server = start_server(1, |_| {}).await;
    let (status, head, body) =
        raw_request(server.addr, "OPTIONS /weather HTTP/1.1\r\nHost: x\r\n\r\n").await;

    assert_eq!(status, 204);
    assert!(head.contains("Access-Control-Allow-Origin: *"));
    assert!(head.contains("Access-Control-Allow-Methods: GET, OPTIONS"));
    assert!(body.is_empty());
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let server = start_server(1, |_| {}).await;
    let (status, _, _) = http_get(server.addr, "/nope").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn unsupported_method_is_rejected() {
    let server = start_server(1, |_| {}).await;
    let (status, _, _) =
        raw_request(server.addr, "POST /weather HTTP/1.1\r\nHost: x\r\n\r\n").await;
    assert_eq!(status, 405);
}

#[tokio::test]
async fn overlong_target_is_rejected() {
    let server = start_server(1, |_| {}).await;
    let target = format!("/{}", "x".repeat(300));
    let (status, _, _) =
        raw_request(server.addr, &format!("GET {target} HTTP/1.1\r\nHost: x\r\n\r\n")).await;
    assert_eq!(status, 414);
}

#[tokio::test]
async fn weather_without_city_is_bad_request() {
    let server = start_server(1, |_| {}).await;
    let (status, _, _) = http_get(server.addr, "/weather").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn surprise_serves_a_file() {
    let server = start_server(1, |root| {
        std::fs::write(root.join("surprise/hello.txt"), "surprise!").unwrap();
    })
    .await;
    let (status, head, body) = http_get(server.addr, "/surprise").await;
    assert_eq!(status, 200);
    assert!(head.contains("Content-Type: text/plain"));
    assert_eq!(body, "surprise!");
}

#[tokio::test]
async fn empty_surprise_directory_is_not_found() {
    let server = start_server(1, |_| {}).await;
    let (status, _, _) = http_get(server.addr, "/surprise").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn upstream_failure_is_an_internal_error() {
    // Geocode cache hit, weather cache empty, upstream unreachable.
    let server = start_server(1, |root| seed_geocode_csv(root)).await;
    let (status, _, _) = http_get(server.addr, "/weather?city=Stockholm").await;
    assert_eq!(status, 500);
}
