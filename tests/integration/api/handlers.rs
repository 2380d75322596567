// Integration tests for API handlers

use crate::common::{create_user, login, send, send_raw, test_app_state, test_router, ADMIN_PASSWORD};
use qhse_assistant::core::models::Role;
use serde_json::json;

#[tokio::test]
async fn test_health_reports_database_and_ledger() {
    let state = test_app_state().await;
    let router = test_router(&state);

    let (status, body) = send(&router, "GET", "/health", None, None).await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["ledger_blocks"], 1);
}

#[tokio::test]
async fn test_create_and_list_incidents() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (status, created) = send(
        &router,
        "POST",
        "/api/incidents",
        Some(&token),
        Some(json!({
            "sector_id": 1,
            "incident_type_id": 1,
            "title": "Glissade quai de chargement",
            "description": "Sol humide près du quai 3",
            "severity_level": "medium",
            "probability_score": 0.4,
            "location": "Quai 3"
        })),
    )
    .await;
    assert_eq!(status, 201, "{}", created);
    let id = created["id"].as_i64().unwrap();
    assert!(created["risk_score"].as_f64().unwrap() > 0.0);

    let (status, list) = send(&router, "GET", "/api/incidents?severity=medium", Some(&token), None).await;
    assert_eq!(status, 200);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "Glissade quai de chargement");

    let (status, incident) = send(&router, "GET", &format!("/api/incidents/{}", id), Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(incident["location"], "Quai 3");

    let (status, _) = send(&router, "GET", "/api/incidents/9999", Some(&token), None).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_incident_validation_errors() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (status, _) = send(
        &router,
        "POST",
        "/api/incidents",
        Some(&token),
        Some(json!({
            "sector_id": 999,
            "incident_type_id": 1,
            "title": "Secteur inconnu",
            "description": "x",
            "severity_level": "low",
            "probability_score": 0.2
        })),
    )
    .await;
    assert_eq!(status, 400);

    let (status, _) = send(&router, "GET", "/api/incidents?severity=extreme", Some(&token), None).await;
    assert_eq!(status, 400);

    let (status, _) = send(&router, "GET", "/api/incidents?limit=0", Some(&token), None).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_unknown_report_type_is_bad_request() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (status, _) = send(&router, "POST", "/api/reports/unknown", Some(&token), None).await;
    assert_eq!(status, 400);

    let (status, catalog) = send(&router, "GET", "/api/reports", Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(catalog.as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_incident_summary_report_on_empty_period() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (status, report) = send(
        &router,
        "POST",
        "/api/reports/incident_summary",
        Some(&token),
        Some(json!({"start": "2020-01-01", "end": "2020-01-31"})),
    )
    .await;

    assert_eq!(status, 200, "{}", report);
    assert_eq!(report["report_type"], "incident_summary");
    assert_eq!(report["statistics"]["total_incidents"], 0);
}

#[tokio::test]
async fn test_certificates_require_user_id() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (status, body) = send(&router, "GET", "/api/blockchain/certificates", Some(&token), None).await;

    assert_eq!(status, 400);
    assert_eq!(body["error"], "user_id query parameter is required");
}

#[tokio::test]
async fn test_certificate_issue_and_verify() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (status, certificate) = send(
        &router,
        "POST",
        "/api/blockchain/certificates",
        Some(&token),
        Some(json!({"user_id": 1, "certificate_type": "habilitation_electrique"})),
    )
    .await;
    assert_eq!(status, 201, "{}", certificate);
    assert_eq!(certificate["issuer"], "admin");
    let certificate_id = certificate["certificate_id"].as_str().unwrap().to_string();

    let (status, verification) = send(
        &router,
        "GET",
        &format!("/api/blockchain/verify/{}", certificate_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(verification["valid"], true);
    assert_eq!(verification["blockchain_verified"], true);
    assert_eq!(verification["signature_verified"], true);

    let (status, history) = send(&router, "GET", "/api/blockchain/certificates?user_id=1", Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (status, _) = send(&router, "GET", "/api/blockchain/verify/CERT-missing", Some(&token), None).await;
    assert_eq!(status, 404);

    let (_, health) = send(&router, "GET", "/health", None, None).await;
    assert_eq!(health["ledger_blocks"], 2);
}

#[tokio::test]
async fn test_mark_unknown_notification_is_not_found() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (status, body) = send(&router, "POST", "/api/notifications/4242/read", Some(&token), None).await;

    assert_eq!(status, 404);
    assert_eq!(body["error"], "Notification 4242 not found");
}

#[tokio::test]
async fn test_sensor_reading_raises_alert() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (status, _) = send(
        &router,
        "POST",
        "/api/iot/sensors",
        Some(&token),
        Some(json!({
            "id": "temp_test_01",
            "name": "Four atelier",
            "sensor_type": "temperature",
            "location": "Atelier B"
        })),
    )
    .await;
    assert_eq!(status, 201);

    let (status, recorded) = send(
        &router,
        "POST",
        "/api/iot/sensors/temp_test_01/readings",
        Some(&token),
        Some(json!({"value": 48.5})),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(recorded["alert"]["level"], "emergency");
    assert_eq!(recorded["alert"]["location"], "Atelier B");

    let (status, alerts) = send(&router, "GET", "/api/iot/alerts?level=emergency", Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(alerts.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &router,
        "POST",
        "/api/iot/sensors/absent/readings",
        Some(&token),
        Some(json!({"value": 20.0})),
    )
    .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_chatbot_and_prediction() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (status, reply) = send(
        &router,
        "POST",
        "/api/chatbot",
        Some(&token),
        Some(json!({"message": "Il y a un incendie dans l'atelier"})),
    )
    .await;
    assert_eq!(status, 200);
    assert!(!reply["response"].as_str().unwrap().is_empty());

    let (status, prediction) = send(
        &router,
        "POST",
        "/api/predict",
        Some(&token),
        Some(json!({"sector": "BTP", "incident_type": "Chute", "probability_score": 0.9})),
    )
    .await;
    assert_eq!(status, 200);
    assert!(["low", "medium", "high", "critical"].contains(&prediction["prediction"].as_str().unwrap()));
    let confidence = prediction["confidence"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&confidence));
}

#[tokio::test]
async fn test_text_analysis_uses_keyword_model_without_llm() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (status, analysis) = send(
        &router,
        "POST",
        "/api/ai/analyze-text",
        Some(&token),
        Some(json!({"text": "Fuite de produit toxique dans le laboratoire", "sector": "Chimie"})),
    )
    .await;

    assert_eq!(status, 200, "{}", analysis);
    assert_eq!(analysis["risk_level"], 4);
    assert_eq!(analysis["source"], "keyword");
}

#[tokio::test]
async fn test_unreadable_bodies_use_error_shape() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (status, body) = send_raw(
        &router,
        "POST",
        "/api/incidents",
        Some(&token),
        Some("application/json"),
        "{\"title\": ",
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"), "{}", body);

    // Valid JSON without a content type
    let (status, body) = send_raw(&router, "POST", "/api/chatbot", Some(&token), None, r#"{"message": "incendie"}"#).await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"), "{}", body);

    // Optional bodies: absent is fine, garbage is not
    let (status, _) = send_raw(&router, "POST", "/api/reports/incident_summary", Some(&token), None, "").await;
    assert_eq!(status, 200);
    let (status, body) = send_raw(
        &router,
        "POST",
        "/api/reports/incident_summary",
        Some(&token),
        Some("application/json"),
        "not json",
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string(), "{}", body);
}

#[tokio::test]
async fn test_equipment_register_and_inspection() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (status, equipment) = send(
        &router,
        "POST",
        "/api/admin/equipment",
        Some(&token),
        Some(json!({
            "name": "Pont roulant 5t",
            "category": "levage",
            "location": "Hall 2",
            "inspection_interval_days": 180,
            "next_inspection": "2020-06-01T00:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, 201, "{}", equipment);
    let id = equipment["id"].as_i64().unwrap();

    let (status, due) = send(&router, "GET", "/api/admin/equipment/inspections", Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(due.as_array().unwrap().len(), 1);
    assert_eq!(due[0]["overdue"], true);

    let (status, record) = send(
        &router,
        "POST",
        &format!("/api/admin/equipment/{}/inspections", id),
        Some(&token),
        Some(json!({"inspection_type": "VGP", "result": "passed"})),
    )
    .await;
    assert_eq!(status, 201, "{}", record);
    assert_eq!(record["inspector_id"], 1);

    let (status, overview) = send(&router, "GET", "/api/admin/equipment", Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(overview["equipment"][0]["inspection_count"], 1);
    assert_eq!(overview["upcoming_inspections"].as_array().unwrap().len(), 0);
    assert_eq!(overview["category_stats"][0]["category"], "levage");

    let (status, history) = send(
        &router,
        "GET",
        &format!("/api/admin/equipment/{}/inspections", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(history[0]["inspection_type"], "VGP");

    let (status, _) = send(
        &router,
        "POST",
        "/api/admin/equipment/999/inspections",
        Some(&token),
        Some(json!({"inspection_type": "VGP", "result": "passed"})),
    )
    .await;
    assert_eq!(status, 404);

    let (status, retired) = send(
        &router,
        "PUT",
        &format!("/api/admin/equipment/{}/status", id),
        Some(&token),
        Some(json!({"status": "retired"})),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(retired["status"], "retired");

    create_user(&state.db_pool, "operateur", "password1", Role::Employee).await;
    let employee = login(&router, "operateur", "password1").await;
    let (status, _) = send(&router, "GET", "/api/admin/equipment", Some(&employee), None).await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn test_compliance_status_and_review() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (status, compliance) = send(&router, "GET", "/api/admin/compliance", Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(compliance["total_regulations"], 4);
    assert_eq!(compliance["conforming_regulations"], 3);

    let (status, reviewed) = send(
        &router,
        "PUT",
        "/api/admin/compliance/REACH",
        Some(&token),
        Some(json!({"compliance_rate": 82.0, "status": "conforme"})),
    )
    .await;
    assert_eq!(status, 200, "{}", reviewed);
    assert_eq!(reviewed["status"], "conforme");

    let (_, compliance) = send(&router, "GET", "/api/admin/compliance", Some(&token), None).await;
    assert_eq!(compliance["compliance_rate"], 100.0);

    let (status, _) = send(
        &router,
        "PUT",
        "/api/admin/compliance/ISO_0000",
        Some(&token),
        Some(json!({"compliance_rate": 82.0, "status": "conforme"})),
    )
    .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_system_logs_show_failed_logins() {
    let state = test_app_state().await;
    let router = test_router(&state);

    let (status, _) = send(
        &router,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"username": "admin", "password": "wrong-password"})),
    )
    .await;
    assert_eq!(status, 401);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;
    // Audit rows are written by a spawned task
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let (status, logs) = send(&router, "GET", "/api/admin/logs?event_type=LOGIN_FAILURE", Some(&token), None).await;
    assert_eq!(status, 200);
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["level"], "WARNING");
    assert_eq!(logs[0]["username"], "admin");

    let (status, all) = send(&router, "GET", "/api/admin/logs?limit=1", Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_supplier_status_and_risk_listing() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (status, supplier) = send(
        &router,
        "POST",
        "/api/suppliers",
        Some(&token),
        Some(json!({
            "name": "Chimex",
            "contact_person": "Anne Leroy",
            "email": "contact@chimex.fr",
            "phone": "+33 4 00 00 00 00",
            "address": "Zone industrielle",
            "country": "France",
            "business_type": "Chimie"
        })),
    )
    .await;
    assert_eq!(status, 201, "{}", supplier);
    let supplier_id = supplier["supplier_id"].as_str().unwrap().to_string();

    let (status, updated) = send(
        &router,
        "PUT",
        &format!("/api/suppliers/{}/status", supplier_id),
        Some(&token),
        Some(json!({"status": "active"})),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(updated["status"], "active");

    let (status, _) = send(
        &router,
        "PUT",
        &format!("/api/suppliers/{}/status", supplier_id),
        Some(&token),
        Some(json!({"status": "gone"})),
    )
    .await;
    assert_eq!(status, 400);

    let (status, medium) = send(&router, "GET", "/api/suppliers/risk/medium", Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(medium[0]["name"], "Chimex");
    let (status, _) = send(&router, "GET", "/api/suppliers/risk/extreme", Some(&token), None).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_incident_forecast_endpoint() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (status, forecast) = send(&router, "GET", "/api/ai/predict-incidents?days=14", Some(&token), None).await;
    assert_eq!(status, 200, "{}", forecast);
    assert_eq!(forecast["predictions"].as_array().unwrap().len(), 14);
    assert_eq!(forecast["trend_analysis"]["risk_level"], "low");

    let (status, _) = send(&router, "GET", "/api/ai/predict-incidents?days=0", Some(&token), None).await;
    assert_eq!(status, 400);
}
