// Integration tests for flows that cross several modules

use crate::common::{create_user, login, send, test_app_state, test_router, ADMIN_PASSWORD};
use qhse_assistant::core::models::Role;
use serde_json::json;

#[tokio::test]
async fn test_critical_incident_notifies_and_rewards_reporter() {
    let state = test_app_state().await;
    create_user(&state.db_pool, "nadia", "nadia-pass", Role::Employee).await;
    let router = test_router(&state);
    let admin_token = login(&router, "admin", ADMIN_PASSWORD).await;
    let token = login(&router, "nadia", "nadia-pass").await;

    let (status, profile) = send(&router, "POST", "/api/gamification/profile", Some(&token), Some(json!({}))).await;
    assert_eq!(status, 201, "{}", profile);
    assert_eq!(profile["username"], "nadia");
    assert_eq!(profile["total_points"], 0);

    let (status, _) = send(
        &router,
        "POST",
        "/api/incidents",
        Some(&token),
        Some(json!({
            "sector_id": 1,
            "incident_type_id": 1,
            "title": "Effondrement d'échafaudage",
            "description": "Structure effondrée sur la zone de stockage",
            "severity_level": "critical",
            "probability_score": 0.9
        })),
    )
    .await;
    assert_eq!(status, 201);

    // Admins always receive critical alerts
    let (status, inbox) = send(&router, "GET", "/api/notifications", Some(&admin_token), None).await;
    assert_eq!(status, 200);
    assert_eq!(inbox["unread"], 1);
    let notification = &inbox["notifications"][0];
    assert_eq!(notification["notification_type"], "critical_incident");
    let notification_id = notification["id"].as_i64().unwrap();

    // Another user cannot mark it
    let (status, _) = send(
        &router,
        "POST",
        &format!("/api/notifications/{}/read", notification_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 404);

    let (status, _) = send(
        &router,
        "POST",
        &format!("/api/notifications/{}/read", notification_id),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, 200);
    let (_, inbox) = send(&router, "GET", "/api/notifications", Some(&admin_token), None).await;
    assert_eq!(inbox["unread"], 0);

    let user_id = profile["user_id"].as_i64().unwrap();
    let (status, profile) = send(
        &router,
        "GET",
        &format!("/api/gamification/profile/{}", user_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(profile["total_points"], 10);
}

#[tokio::test]
async fn test_award_points_is_restricted() {
    let state = test_app_state().await;
    let user_id = create_user(&state.db_pool, "yann", "yann-pass", Role::Employee).await;
    let router = test_router(&state);
    let token = login(&router, "yann", "yann-pass").await;
    let admin_token = login(&router, "admin", ADMIN_PASSWORD).await;

    let award = json!({"user_id": user_id, "event_type": "safety_suggestion", "points": 25});

    let (status, _) = send(&router, "POST", "/api/gamification/award-points", Some(&token), Some(award.clone())).await;
    assert_eq!(status, 403);

    // No profile yet
    let (status, _) = send(&router, "POST", "/api/gamification/award-points", Some(&admin_token), Some(award.clone())).await;
    assert_eq!(status, 404);

    let (status, _) = send(&router, "POST", "/api/gamification/profile", Some(&token), Some(json!({}))).await;
    assert_eq!(status, 201);

    let (status, result) = send(&router, "POST", "/api/gamification/award-points", Some(&admin_token), Some(award)).await;
    assert_eq!(status, 200, "{}", result);
    assert_eq!(result["points_awarded"], 25);
    assert_eq!(result["total_points"], 25);
}

#[tokio::test]
async fn test_training_enrollment_to_certification() {
    let state = test_app_state().await;
    let trainee_id = create_user(&state.db_pool, "ines", "ines-pass", Role::Employee).await;
    let router = test_router(&state);
    let admin_token = login(&router, "admin", ADMIN_PASSWORD).await;
    let token = login(&router, "ines", "ines-pass").await;

    let (status, training) = send(
        &router,
        "POST",
        "/api/training",
        Some(&admin_token),
        Some(json!({
            "title": "Travail en hauteur",
            "category": "height_work",
            "duration_hours": 7.0,
            "max_participants": 1
        })),
    )
    .await;
    assert_eq!(status, 201, "{}", training);
    let training_id = training["id"].as_i64().unwrap();

    let (status, session) = send(
        &router,
        "POST",
        "/api/training/sessions",
        Some(&admin_token),
        Some(json!({
            "training_id": training_id,
            "start_date": "2030-03-02T08:00:00Z",
            "end_date": "2030-03-02T16:00:00Z",
            "location": "Salle A"
        })),
    )
    .await;
    assert_eq!(status, 201, "{}", session);
    assert_eq!(session["trainer_id"], 1);
    let session_id = session["id"].as_i64().unwrap();

    let (status, enrollment) = send(
        &router,
        "POST",
        &format!("/api/training/sessions/{}/enroll", session_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 201, "{}", enrollment);
    assert_eq!(enrollment["user_id"], trainee_id);
    let participation_id = enrollment["participation_id"].as_i64().unwrap();

    // Single seat already taken
    let (status, _) = send(
        &router,
        "POST",
        &format!("/api/training/sessions/{}/enroll", session_id),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, 409);

    let (status, outcome) = send(
        &router,
        "POST",
        &format!("/api/training/participations/{}/complete", participation_id),
        Some(&admin_token),
        Some(json!({"score": 92.0})),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(outcome["passed"], true);
    assert!(outcome["certificate_number"].as_str().unwrap().starts_with("CERT-"));

    let (status, certifications) = send(
        &router,
        "GET",
        &format!("/api/training/certifications/{}", trainee_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(certifications.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &router,
        "POST",
        &format!("/api/training/participations/{}/complete", participation_id),
        Some(&admin_token),
        Some(json!({"score": 95.0})),
    )
    .await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn test_workflow_steps_until_completion() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (status, detail) = send(
        &router,
        "POST",
        "/api/workflows",
        Some(&token),
        Some(json!({"template_id": "corrective_action", "priority": "high"})),
    )
    .await;
    assert_eq!(status, 201, "{}", detail);
    let workflow_id = detail["workflow"]["workflow_id"].as_str().unwrap().to_string();
    let steps: Vec<String> = detail["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["step_id"].as_str().unwrap().to_string())
        .collect();
    assert!(!steps.is_empty());

    let (status, _) = send(
        &router,
        "POST",
        &format!("/api/workflows/{}/steps/{}", workflow_id, "missing-step"),
        Some(&token),
        Some(json!({"action": "approve"})),
    )
    .await;
    assert_eq!(status, 400);

    let mut last = serde_json::Value::Null;
    for step_id in &steps {
        let (status, outcome) = send(
            &router,
            "POST",
            &format!("/api/workflows/{}/steps/{}", workflow_id, step_id),
            Some(&token),
            Some(json!({"action": "complete", "comment": "fait"})),
        )
        .await;
        assert_eq!(status, 200, "{}", outcome);
        assert_eq!(outcome["step_status"], "completed");
        last = outcome;
    }
    assert_eq!(last["workflow_status"], "completed");

    // A closed step cannot be acted on again
    let (status, _) = send(
        &router,
        "POST",
        &format!("/api/workflows/{}/steps/{}", workflow_id, steps[0]),
        Some(&token),
        Some(json!({"action": "approve"})),
    )
    .await;
    assert_eq!(status, 400);

    let (status, detail) = send(&router, "GET", &format!("/api/workflows/{}", workflow_id), Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(detail["workflow"]["status"], "completed");
}

#[tokio::test]
async fn test_rejected_step_rejects_workflow() {
    let state = test_app_state().await;
    let router = test_router(&state);
    let token = login(&router, "admin", ADMIN_PASSWORD).await;

    let (_, detail) = send(
        &router,
        "POST",
        "/api/workflows",
        Some(&token),
        Some(json!({"template_id": "training_request"})),
    )
    .await;
    let workflow_id = detail["workflow"]["workflow_id"].as_str().unwrap().to_string();
    let first_step = detail["steps"][0]["step_id"].as_str().unwrap().to_string();

    let (status, outcome) = send(
        &router,
        "POST",
        &format!("/api/workflows/{}/steps/{}", workflow_id, first_step),
        Some(&token),
        Some(json!({"action": "reject", "comment": "budget"})),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(outcome["step_status"], "rejected");
    assert_eq!(outcome["workflow_status"], "rejected");
}
