use std::{env, fs, process};

use anyhow::{bail, Context, Result};
use diesel::prelude::*;
use tracing_subscriber::EnvFilter;

use hr_admin::{
    auth::{
        accounts::{create_account, email_taken, NewAccount},
        password::hash_password,
        roles::Role,
    },
    config::AppConfig,
    db, employee_csv,
    models::Employee,
    schema::empleados,
};

const USAGE: &str = "Usage:\n  manage create-admin <email> <password> [display name]\n  manage export-employees <path>";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("create-admin") => match &args[1..] {
            [email, password, rest @ ..] => {
                let display_name = (!rest.is_empty()).then(|| rest.join(" "));
                create_admin(email, password, display_name)
            }
            _ => usage(),
        },
        Some("export-employees") => match &args[1..] {
            [path] => export_employees(path),
            _ => usage(),
        },
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            process::exit(1);
        }
        None => usage(),
    }
}

fn usage() -> Result<()> {
    eprintln!("{USAGE}");
    process::exit(1);
}

fn connect() -> Result<db::PgPool> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "manage",
        database_url = %config.redacted_database_url(),
        pool_size = 1,
        "loaded backend configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    db::run_migrations(&pool)?;
    Ok(pool)
}

fn create_admin(email: &str, password: &str, display_name: Option<String>) -> Result<()> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        bail!("`{email}` is not a valid email address");
    }
    if password.is_empty() {
        bail!("password must not be empty");
    }

    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;
    if email_taken(&mut conn, &email).context("failed to look up existing users")? {
        bail!("a user with email {email} already exists");
    }

    let account = NewAccount {
        email: &email,
        password_hash: hash_password(password)?,
        display_name,
        roles: &[Role::Admin],
    };
    let user_id = create_account(&mut conn, account).context("failed to create admin")?;

    tracing::info!(user_id = %user_id, "admin account created");
    println!("Created admin {email} ({user_id})");
    Ok(())
}

fn export_employees(path: &str) -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let employees: Vec<Employee> = empleados::table
        .order(empleados::fecha_creacion.desc())
        .load(&mut conn)
        .context("failed to load employees")?;
    let bytes = employee_csv::export(&employees).context("failed to encode employees")?;
    fs::write(path, bytes).with_context(|| format!("failed to write {path}"))?;

    println!("Exported {} employees to {path}", employees.len());
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
