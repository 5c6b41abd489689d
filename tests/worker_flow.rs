mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use common::{acquire_db_lock, TestApp};
use hr_admin::auth::roles::Role;
use hr_admin::jobs::JOB_WELCOME_WEBHOOK;
use hr_admin::{default_handlers, Worker};
use serde_json::{json, Value};
use tokio::sync::Mutex;

#[derive(Clone)]
struct Hook {
    status: StatusCode,
    received: Arc<Mutex<Vec<Value>>>,
}

async fn receive(State(hook): State<Hook>, Json(body): Json<Value>) -> StatusCode {
    hook.received.lock().await.push(body);
    hook.status
}

async fn spawn_webhook(status: StatusCode) -> Result<(String, Arc<Mutex<Vec<Value>>>)> {
    let received = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new().route("/hook", post(receive)).with_state(Hook {
        status,
        received: received.clone(),
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok((format!("http://{addr}/hook"), received))
}

async fn create_employee(app: &TestApp, token: &str) -> Result<()> {
    let response = app
        .post_json(
            "/api/employees",
            &json!({
                "documento": 80123456,
                "nombres": "Valentina",
                "apellidos": "Ríos",
                "correo": "valentina@example.com",
                "telefono": "3157778899"
            }),
            Some(token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(())
}

fn worker_for(app: &TestApp, url: Option<String>) -> Worker {
    Worker::new(
        Arc::new(app.state_with_webhook(url)),
        default_handlers(),
        Duration::from_millis(10),
    )
}

#[tokio::test]
async fn welcome_notice_is_delivered() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.token_for("hr@example.com", &[Role::Hr]).await?;
    let (url, received) = spawn_webhook(StatusCode::OK).await?;

    create_employee(&app, &token).await?;
    let worker = worker_for(&app, Some(url));
    assert!(worker.tick().await?);
    assert!(!worker.tick().await?);

    let bodies = received.lock().await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["tipo"], "bienvenida");
    assert_eq!(bodies[0]["datos"]["nombre"], "Valentina");
    assert_eq!(bodies[0]["datos"]["telefono"], "3157778899");

    let jobs = app.jobs_by_type(JOB_WELCOME_WEBHOOK).await?;
    assert_eq!(jobs[0].status, "succeeded");
    assert_eq!(jobs[0].attempts, 1);

    Ok(())
}

#[tokio::test]
async fn rejected_notice_fails_without_retry() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.token_for("hr@example.com", &[Role::Hr]).await?;
    let (url, received) = spawn_webhook(StatusCode::INTERNAL_SERVER_ERROR).await?;

    create_employee(&app, &token).await?;
    let worker = worker_for(&app, Some(url));
    assert!(worker.tick().await?);
    assert!(!worker.tick().await?);
    assert_eq!(received.lock().await.len(), 1);

    let jobs = app.jobs_by_type(JOB_WELCOME_WEBHOOK).await?;
    assert_eq!(jobs[0].status, "failed");
    assert!(jobs[0].last_error.as_deref().unwrap().contains("500"));

    Ok(())
}

#[tokio::test]
async fn missing_webhook_url_skips_delivery() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.token_for("hr@example.com", &[Role::Hr]).await?;

    create_employee(&app, &token).await?;
    let worker = worker_for(&app, None);
    assert!(worker.tick().await?);

    let jobs = app.jobs_by_type(JOB_WELCOME_WEBHOOK).await?;
    assert_eq!(jobs[0].status, "succeeded");

    Ok(())
}
