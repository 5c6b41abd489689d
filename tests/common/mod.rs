use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use hr_admin::auth::accounts::{create_account, NewAccount};
use hr_admin::auth::jwt::JwtService;
use hr_admin::auth::password::hash_password;
use hr_admin::auth::roles::Role;
use hr_admin::config::{AppConfig, DEFAULT_DRIVE_TOKEN_URL, DEFAULT_DRIVE_UPLOAD_URL};
use hr_admin::db::{self, PgPool};
use hr_admin::documents::{DocumentStore, StoredDocument};
use hr_admin::models::{Job, NewCertificateRequest, NewEmployee};
use hr_admin::routes;
use hr_admin::schema::{certificaciones_solicitudes, empleados, jobs};
use hr_admin::state::AppState;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[allow(dead_code)]
#[derive(Clone)]
pub struct UploadedDocument {
    pub id: String,
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-memory document store. Uploads can be made to fail to exercise the
/// bad-gateway path.
#[derive(Default)]
pub struct FakeDocumentStore {
    uploads: Mutex<Vec<UploadedDocument>>,
    failing: AtomicBool,
}

#[async_trait]
impl DocumentStore for FakeDocumentStore {
    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredDocument> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("document store unavailable");
        }
        let id = format!("fake-{}", Uuid::new_v4());
        self.uploads.lock().await.push(UploadedDocument {
            id: id.clone(),
            name: name.to_string(),
            bytes,
            content_type: content_type.to_string(),
        });
        Ok(StoredDocument { id })
    }
}

impl FakeDocumentStore {
    #[allow(dead_code)]
    pub async fn uploads(&self) -> Vec<UploadedDocument> {
        self.uploads.lock().await.clone()
    }

    #[allow(dead_code)]
    pub fn fail_uploads(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[allow(dead_code)]
pub struct EmployeeSeed<'a> {
    pub nombres: &'a str,
    pub apellidos: &'a str,
    pub correo: &'a str,
    pub telefono: &'a str,
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    documents: Arc<FakeDocumentStore>,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            cors_allowed_origin: None,
            drive_upload_url: DEFAULT_DRIVE_UPLOAD_URL.to_string(),
            drive_token_url: DEFAULT_DRIVE_TOKEN_URL.to_string(),
            drive_client_id: None,
            drive_client_secret: None,
            drive_refresh_token: None,
            drive_folder_id: None,
            welcome_webhook_url: None,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let documents = Arc::new(FakeDocumentStore::default());
        let documents_for_state: Arc<dyn DocumentStore> = documents.clone();
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool.clone(), config, documents_for_state, jwt);
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            documents,
        })
    }

    /// Same pool and stores, with the welcome webhook pointed at `url`.
    #[allow(dead_code)]
    pub fn state_with_webhook(&self, url: Option<String>) -> AppState {
        let mut config = (*self.state.config).clone();
        config.welcome_webhook_url = url;
        AppState::new(
            self.state.pool.clone(),
            config,
            self.state.documents.clone(),
            self.state.jwt.clone(),
        )
    }

    #[allow(dead_code)]
    pub fn documents(&self) -> Arc<FakeDocumentStore> {
        self.documents.clone()
    }

    pub async fn insert_user(&self, email: &str, password: &str, roles: &[Role]) -> Result<Uuid> {
        let email = email.to_string();
        let password = password.to_string();
        let roles = roles.to_vec();
        self.with_conn(move |conn| {
            let account = NewAccount {
                email: &email,
                password_hash: hash_password(&password)?,
                display_name: None,
                roles: &roles,
            };
            create_account(conn, account).context("failed to insert user")
        })
        .await
    }

    pub async fn login_token(&self, email: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            email: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json("/api/auth/login", &LoginPayload { email, password }, None)
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        #[derive(serde::Deserialize)]
        struct LoginResponse {
            access_token: String,
        }
        let parsed: LoginResponse = read_json(response).await?;
        Ok(parsed.access_token)
    }

    /// Creates a user holding `roles` and returns a bearer token for it.
    #[allow(dead_code)]
    pub async fn token_for(&self, email: &str, roles: &[Role]) -> Result<(Uuid, String)> {
        let password = "correct horse battery";
        let user_id = self.insert_user(email, password, roles).await?;
        let token = self.login_token(email, password).await?;
        Ok((user_id, token))
    }

    #[allow(dead_code)]
    pub async fn insert_employee(&self, seed: EmployeeSeed<'_>) -> Result<Uuid> {
        let employee = NewEmployee {
            id: Uuid::new_v4(),
            documento: 1_000_000,
            nombres: seed.nombres.to_string(),
            apellidos: seed.apellidos.to_string(),
            correo: seed.correo.to_string(),
            telefono: seed.telefono.to_string(),
            cumpleanos: None,
            fecha_ingreso: None,
            dias_vacaciones: 0,
        };
        self.with_conn(move |conn| {
            diesel::insert_into(empleados::table)
                .values(&employee)
                .execute(conn)
                .context("failed to insert employee")?;
            Ok(employee.id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_request(
        &self,
        correo: &str,
        estado: &str,
        empleado_id: Option<Uuid>,
    ) -> Result<Uuid> {
        let request = NewCertificateRequest {
            id: Uuid::new_v4(),
            nombre: "Ana".to_string(),
            apellido: "Pérez".to_string(),
            correo: correo.to_string(),
            telefono: "3000000000".to_string(),
            va_dirigida: false,
            nombre_destinatario: None,
            incluir_salario: true,
            incluir_extras: false,
            incluir_funciones: false,
            razon: Some("Trámite bancario".to_string()),
            area: None,
            estado: estado.to_string(),
            empleado_id,
            user_id: None,
        };
        self.with_conn(move |conn| {
            diesel::insert_into(certificaciones_solicitudes::table)
                .values(&request)
                .execute(conn)
                .context("failed to insert request")?;
            Ok(request.id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn jobs_by_type(&self, ty: &str) -> Result<Vec<Job>> {
        let ty = ty.to_string();
        self.with_conn(move |conn| {
            jobs::table
                .filter(jobs::job_type.eq(&ty))
                .load::<Job>(conn)
                .context("failed to load jobs")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn count_rows(&self, table: &'static str) -> Result<i64> {
        self.with_conn(move |conn| {
            #[derive(QueryableByName)]
            struct Count {
                #[diesel(sql_type = diesel::sql_types::BigInt)]
                total: i64,
            }
            let row: Count = diesel::sql_query(format!("SELECT COUNT(*) AS total FROM {table}"))
                .get_result(conn)
                .context("failed to count rows")?;
            Ok(row.total)
        })
        .await
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        content_type: Option<&str>,
        body: Vec<u8>,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.send(Method::POST, path, Some("application/json"), body, token)
            .await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.send(Method::PATCH, path, Some("application/json"), body, token)
            .await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.send(Method::PUT, path, Some("application/json"), body, token)
            .await
    }

    #[allow(dead_code)]
    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::GET, path, None, Vec::new(), token).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::DELETE, path, None, Vec::new(), token)
            .await
    }

    #[allow(dead_code)]
    pub async fn upload_file(
        &self,
        path: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend(data);
        body.extend(b"\r\n");
        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let content_type = format!("multipart/form-data; boundary={boundary}");
        self.send(Method::POST, path, Some(&content_type), body, Some(token))
            .await
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn read_json<T: DeserializeOwned>(response: hyper::Response<Body>) -> Result<T> {
    let bytes = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&bytes).with_context(|| {
        format!(
            "unexpected response body: {}",
            String::from_utf8_lossy(&bytes)
        )
    })
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        db::run_migrations(&pool)?;
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE jobs, certificaciones_solicitudes, jefes, areas, empleados, \
         user_roles, profiles, users RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
