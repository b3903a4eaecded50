use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

const EMAIL: &str = "lifter@example.com";
const PASSWORD: &str = "hunter2";

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::Once;
    use std::sync::atomic::{AtomicI32, Ordering};

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_theme_path() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!(
        "workout_tracker_http_{}_{}/preferences.json",
        std::process::id(),
        nanos
    ));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/view")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_workout_tracker"))
        .env("PORT", port.to_string())
        .env("TRACKER_BACKEND", "memory")
        .env("TRACKER_DEMO_EMAIL", EMAIL)
        .env("TRACKER_DEMO_PASSWORD", PASSWORD)
        .env("TRACKER_DEBOUNCE_MS", "50")
        .env("TRACKER_THEME_PATH", unique_theme_path())
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn post_json(client: &Client, url: String, body: Value) -> Value {
    client
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn view(client: &Client, server: &TestServer) -> Value {
    client
        .get(format!("{}/api/view", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn fresh_login(client: &Client, server: &TestServer) -> Value {
    post_json(client, format!("{}/api/logout", server.base_url), json!({})).await;
    post_json(
        client,
        format!("{}/api/login", server.base_url),
        json!({ "email": EMAIL, "password": PASSWORD }),
    )
    .await
}

fn set_row<'a>(view: &'a Value, exercise: &str, set: u64) -> &'a Value {
    view["form"]["exercises"]
        .as_array()
        .unwrap()
        .iter()
        .find(|block| block["code"] == exercise)
        .unwrap()["sets"]
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["set"] == set)
        .unwrap()
}

fn field_value(row: &Value, field: &str) -> String {
    row["fields"]
        .as_array()
        .unwrap()
        .iter()
        .find(|input| input["name"] == field)
        .unwrap()["value"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn http_index_shows_login_when_signed_out() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let after = post_json(&client, format!("{}/api/logout", server.base_url), json!({})).await;
    assert_eq!(after["screen"], "auth");

    let html = client
        .get(format!("{}/", server.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("id=\"login-form\""));
    assert!(!html.contains("id=\"tracker-ui\""));
}

#[tokio::test]
async fn http_login_opens_today() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let snapshot = fresh_login(&client, &server).await;
    assert_eq!(snapshot["screen"], "tracker");
    assert_eq!(snapshot["user_email"], EMAIL);
    assert_eq!(snapshot["form"]["exercises"].as_array().unwrap().len(), 5);
    assert_eq!(snapshot["nav_enabled"], true);
}

#[tokio::test]
async fn http_bad_password_reports_login_failure() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    post_json(&client, format!("{}/api/logout", server.base_url), json!({})).await;
    let snapshot = post_json(
        &client,
        format!("{}/api/login", server.base_url),
        json!({ "email": EMAIL, "password": "wrong" }),
    )
    .await;
    assert_eq!(snapshot["screen"], "auth");
    assert!(
        snapshot["notice"]
            .as_str()
            .unwrap()
            .starts_with("Login failed:")
    );
}

#[tokio::test]
async fn http_field_edit_is_saved_and_reloaded() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    fresh_login(&client, &server).await;

    let group = post_json(
        &client,
        format!("{}/api/field", server.base_url),
        json!({ "exercise": "GS", "set": 2, "field": "reps", "value": "12" }),
    )
    .await;
    assert_eq!(group["status"], "dirty");

    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        let current = view(&client, &server).await;
        if set_row(&current, "GS", 2)["status"] == "saved" {
            break;
        }
        if Instant::now() > deadline {
            panic!("edit was never saved");
        }
        sleep(Duration::from_millis(50)).await;
    }

    let reloaded = fresh_login(&client, &server).await;
    let row = set_row(&reloaded, "GS", 2);
    assert_eq!(field_value(row, "reps"), "12");
    assert_eq!(row["status"], "clean");
}

#[tokio::test]
async fn http_late_older_edit_does_not_overwrite_newer_value() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    fresh_login(&client, &server).await;

    let newer = post_json(
        &client,
        format!("{}/api/field", server.base_url),
        json!({ "exercise": "PL", "set": 2, "field": "reps", "value": "45", "seq": 2000 }),
    )
    .await;
    assert_eq!(newer["reps"], "45");

    let older = post_json(
        &client,
        format!("{}/api/field", server.base_url),
        json!({ "exercise": "PL", "set": 2, "field": "reps", "value": "4", "seq": 1000 }),
    )
    .await;
    assert_eq!(older["reps"], "45");

    let current = view(&client, &server).await;
    assert_eq!(field_value(set_row(&current, "PL", 2), "reps"), "45");
}

#[tokio::test]
async fn http_weight_on_bodyweight_exercise_is_rejected() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    fresh_login(&client, &server).await;

    let response = client
        .post(format!("{}/api/field", server.base_url))
        .json(&json!({ "exercise": "PU", "set": 1, "field": "weight", "value": "10" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_edit_requires_sign_in() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    post_json(&client, format!("{}/api/logout", server.base_url), json!({})).await;
    let response = client
        .post(format!("{}/api/field", server.base_url))
        .json(&json!({ "exercise": "GS", "set": 1, "field": "reps", "value": "5" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn http_navigating_past_the_last_entry_shows_notice() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let before = fresh_login(&client, &server).await;

    let after = post_json(
        &client,
        format!("{}/api/navigate", server.base_url),
        json!({ "direction": "next" }),
    )
    .await;
    assert_eq!(after["notice"], "No later days with entries found.");
    assert_eq!(after["date"], before["date"]);
    assert_eq!(after["nav_enabled"], true);
}
