mod common;

use anyhow::Result;
use axum::http::{header, Method, StatusCode};
use common::{acquire_db_lock, body_to_vec, read_json, EmployeeSeed, TestApp};
use hr_admin::auth::roles::Role;
use hr_admin::jobs::JOB_WELCOME_WEBHOOK;
use serde_json::{json, Value};

fn employee_payload(correo: &str, telefono: &str) -> Value {
    json!({
        "documento": 1032456789,
        "nombres": "Laura",
        "apellidos": "Gómez",
        "correo": correo,
        "telefono": telefono,
        "cumpleanos": "1990-05-17",
        "fecha_ingreso": "2021-02-01",
        "dias_vacaciones": 12
    })
}

#[tokio::test]
async fn employee_crud_flow() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.token_for("hr@example.com", &[Role::Hr]).await?;

    let response = app
        .post_json(
            "/api/employees",
            &employee_payload("laura@example.com", "3001234567"),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = read_json(response).await?;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["cumpleanos"], "1990-05-17");

    let duplicate = app
        .post_json(
            "/api/employees",
            &employee_payload("laura@example.com", "3001234567"),
            Some(&token),
        )
        .await?;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

    let invalid = app
        .post_json(
            "/api/employees",
            &json!({
                "documento": 0,
                "apellidos": "",
                "correo": "no-at-sign",
                "telefono": "1"
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let response = app
        .patch_json(
            &format!("/api/employees/{id}"),
            &json!({ "telefono": "3119998888", "cumpleanos": null }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = read_json(response).await?;
    assert_eq!(updated["telefono"], "3119998888");
    assert!(updated["cumpleanos"].is_null());
    assert_eq!(updated["fecha_ingreso"], "2021-02-01");
    assert_eq!(updated["nombres"], "Laura");

    let response = app.get(&format!("/api/employees/{id}"), Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .delete(&format!("/api/employees/{id}"), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.get(&format!("/api/employees/{id}"), Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .delete(&format!("/api/employees/{id}"), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn listing_is_paginated_and_filtered() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.token_for("hr@example.com", &[Role::Hr]).await?;

    for index in 0..15 {
        let correo = format!("persona{index}@example.com");
        app.insert_employee(EmployeeSeed {
            nombres: if index % 5 == 0 { "Camila" } else { "Andrés" },
            apellidos: "Rojas",
            correo: &correo,
            telefono: "3000000000",
        })
        .await?;
    }

    let response = app.get("/api/employees", Some(&token)).await?;
    let page: Value = read_json(response).await?;
    assert_eq!(page["total"], 15);
    assert_eq!(page["page_size"], 7);
    assert_eq!(page["total_pages"], 3);
    assert_eq!(page["rows"].as_array().unwrap().len(), 7);

    let response = app.get("/api/employees?page=3", Some(&token)).await?;
    let page: Value = read_json(response).await?;
    assert_eq!(page["page"], 3);
    assert_eq!(page["rows"].as_array().unwrap().len(), 1);

    let response = app.get("/api/employees?nombres=cami", Some(&token)).await?;
    let page: Value = read_json(response).await?;
    assert_eq!(page["total"], 3);
    assert_eq!(page["total_pages"], 1);

    let response = app
        .get("/api/employees?correo=%25", Some(&token))
        .await?;
    let page: Value = read_json(response).await?;
    assert_eq!(page["total"], 0);

    let response = app.get("/api/employees/options?q=camila", Some(&token)).await?;
    let options: Value = read_json(response).await?;
    assert_eq!(options.as_array().unwrap().len(), 3);

    Ok(())
}

#[tokio::test]
async fn delete_is_blocked_while_requests_reference_the_employee() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.token_for("hr@example.com", &[Role::Hr]).await?;

    let employee_id = app
        .insert_employee(EmployeeSeed {
            nombres: "Pedro",
            apellidos: "Díaz",
            correo: "pedro@example.com",
            telefono: "3100000000",
        })
        .await?;
    app.insert_request("pedro@example.com", "Pendiente", Some(employee_id))
        .await?;

    let response = app
        .delete(&format!("/api/employees/{employee_id}"), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(app.count_rows("empleados").await?, 1);

    Ok(())
}

#[tokio::test]
async fn creating_an_employee_queues_the_welcome_notice() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.token_for("hr@example.com", &[Role::Hr]).await?;

    let response = app
        .post_json(
            "/api/employees",
            &employee_payload("nuevo@example.com", "3205551234"),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let jobs = app.jobs_by_type(JOB_WELCOME_WEBHOOK).await?;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, "queued");
    assert_eq!(jobs[0].payload["datos"]["telefono"], "3205551234");
    assert_eq!(jobs[0].payload["datos"]["nombre"], "Laura");

    Ok(())
}

#[tokio::test]
async fn export_then_import_round_trip() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.token_for("hr@example.com", &[Role::Hr]).await?;

    let existing_id = app
        .insert_employee(EmployeeSeed {
            nombres: "Sofía",
            apellidos: "Martínez",
            correo: "sofia@example.com",
            telefono: "3001112222",
        })
        .await?;

    let response = app.get("/api/employees/export", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()?
        .starts_with("text/csv"));
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()?
        .contains("attachment"));
    let csv = String::from_utf8(body_to_vec(response.into_body()).await?)?;
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("id,documento,nombres"));
    assert!(lines.next().unwrap().contains("sofia@example.com"));

    let import = format!(
        "id,documento,nombres,apellidos,correo,telefono,cumpleanos,fecha_ingreso,dias_vacaciones\n\
         {existing_id},55,Sofía,Martínez Ruiz,sofia@example.com,3001112222,,2020-01-15,10\n\
         ,77,Julián,Castro,julian@example.com,3014445555,1988-11-02,,0\n"
    );
    let response = app
        .send(
            Method::POST,
            "/api/employees/import",
            Some("text/csv"),
            import.into_bytes(),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let summary: Value = read_json(response).await?;
    assert_eq!(summary["inserted"], 1);
    assert_eq!(summary["updated"], 1);

    let response = app
        .get(&format!("/api/employees/{existing_id}"), Some(&token))
        .await?;
    let updated: Value = read_json(response).await?;
    assert_eq!(updated["apellidos"], "Martínez Ruiz");
    assert_eq!(updated["fecha_ingreso"], "2020-01-15");
    assert_eq!(app.count_rows("empleados").await?, 2);
    assert!(app.jobs_by_type(JOB_WELCOME_WEBHOOK).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn import_with_invalid_rows_changes_nothing() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_, token) = app.token_for("hr@example.com", &[Role::Hr]).await?;

    let import = "documento,nombres,apellidos,correo,telefono\n\
                  10,Ana,Pérez,ana@example.com,3000000001\n\
                  abc,Luis,,luis@example.com,3000000002\n\
                  12,Marta,López,sin-arroba,3000000003\n";
    let response = app
        .send(
            Method::POST,
            "/api/employees/import",
            Some("text/csv"),
            import.as_bytes().to_vec(),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = read_json(response).await?;
    let lines: Vec<u64> = body["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["line"].as_u64().unwrap())
        .collect();
    assert!(lines.contains(&3));
    assert!(lines.contains(&4));
    assert!(!lines.contains(&2));
    assert_eq!(app.count_rows("empleados").await?, 0);

    let missing_column = app
        .send(
            Method::POST,
            "/api/employees/import",
            Some("text/csv"),
            "nombres,apellidos\nAna,Pérez\n".as_bytes().to_vec(),
            Some(&token),
        )
        .await?;
    assert_eq!(missing_column.status(), StatusCode::BAD_REQUEST);

    Ok(())
}
