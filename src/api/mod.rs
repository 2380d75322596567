// Axum web server layer

use axum::{
    error_handling::HandleErrorLayer,
    extract::Request,
    http::StatusCode,
    routing::{delete, get, post, put},
    BoxError, Router,
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod responses;

use crate::admin::AdminService;
use crate::analysis::{CostModel, IncidentForecaster, TextAnalysis};
use crate::arvr::ArvrManager;
use crate::auth::audit_logger::AuditLogger;
use crate::auth::auth_middleware::AuthState;
use crate::auth::session::{SessionToken, SessionTokenHash};
use crate::auth::user_store::UserStore;
use crate::core::errors::QhseError;
use crate::core::models::CurrentUser;
use crate::gamification::GamificationEngine;
use crate::incidents::IncidentStore;
use crate::iot::IotManager;
use crate::ledger::Ledger;
use crate::notifications::NotificationService;
use crate::reports::ReportGenerator;
use crate::suppliers::SupplierManager;
use crate::training::TrainingManager;
use crate::workflows::WorkflowEngine;
use metrics::Metrics;

/// Application state containing all shared dependencies
///
/// Cloned per request by Axum, so every component sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db_pool: SqlitePool,
    pub session_store: Arc<dyn SessionStore + Send + Sync>,
    pub text_analyzer: Arc<dyn TextAnalyzer + Send + Sync>,
    pub user_store: Arc<UserStore>,
    pub audit_logger: Arc<AuditLogger>,
    pub incidents: Arc<IncidentStore>,
    pub cost_model: Arc<CostModel>,
    pub forecaster: Arc<IncidentForecaster>,
    pub ledger: Arc<Ledger>,
    pub iot: Arc<IotManager>,
    pub gamification: Arc<GamificationEngine>,
    pub arvr: Arc<ArvrManager>,
    pub suppliers: Arc<SupplierManager>,
    pub reports: Arc<ReportGenerator>,
    pub workflows: Arc<WorkflowEngine>,
    pub training: Arc<TrainingManager>,
    pub notifications: Arc<NotificationService>,
    pub admin: Arc<AdminService>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wire every domain service onto one pool
    ///
    /// The ledger is loaded by the caller since it needs the signing key.
    pub fn new(
        config: Arc<Config>,
        db_pool: SqlitePool,
        ledger: Arc<Ledger>,
        session_store: Arc<dyn SessionStore + Send + Sync>,
        text_analyzer: Arc<dyn TextAnalyzer + Send + Sync>,
    ) -> Result<Self, QhseError> {
        Ok(Self {
            user_store: Arc::new(UserStore::new(db_pool.clone())),
            audit_logger: Arc::new(AuditLogger::new(Some(db_pool.clone()))),
            incidents: Arc::new(IncidentStore::new(db_pool.clone())),
            cost_model: Arc::new(CostModel::new(db_pool.clone())),
            forecaster: Arc::new(IncidentForecaster::new(db_pool.clone())),
            iot: Arc::new(IotManager::new(db_pool.clone())),
            gamification: Arc::new(GamificationEngine::new(db_pool.clone())),
            arvr: Arc::new(ArvrManager::new(db_pool.clone())),
            suppliers: Arc::new(SupplierManager::new(db_pool.clone())),
            reports: Arc::new(ReportGenerator::new(db_pool.clone())),
            workflows: Arc::new(WorkflowEngine::new(db_pool.clone())),
            training: Arc::new(TrainingManager::new(db_pool.clone())),
            notifications: Arc::new(NotificationService::with_tracing_channels(db_pool.clone())),
            admin: Arc::new(AdminService::new(db_pool.clone())),
            metrics: Arc::new(Metrics::new()?),
            config,
            db_pool,
            ledger,
            session_store,
            text_analyzer,
        })
    }

    /// Dependencies of the session middleware, sharing this state's stores
    pub fn auth_state(&self) -> Arc<AuthState> {
        Arc::new(AuthState {
            session_store: self.session_store.clone(),
            user_store: self.user_store.clone(),
            audit_logger: self.audit_logger.clone(),
        })
    }
}

/// Session persistence and lookup
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Issue a token for `user`, returning it with its expiry
    async fn create_session(&self, user: &CurrentUser) -> Result<(SessionToken, DateTime<Utc>), QhseError>;
    /// `None` when the session is unknown or expired
    async fn resolve_session(&self, token_hash: &SessionTokenHash) -> Result<Option<CurrentUser>, QhseError>;
    async fn revoke_session(&self, token_hash: &SessionTokenHash) -> Result<(), QhseError>;
    async fn revoke_user_sessions(&self, user_id: i64) -> Result<(), QhseError>;
}

/// Free-text incident analysis
#[async_trait::async_trait]
pub trait TextAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str, sector: Option<&str>) -> Result<TextAnalysis, QhseError>;
}

// Re-export Config from config module
pub use crate::config::Config;

/// Paths reachable without a session
const PUBLIC_PATHS: [&str; 3] = ["/health", "/metrics", "/api/auth/login"];

/// Create the Axum router with all routes and middleware
///
/// Middleware stack (outermost to innermost):
/// - Request timeout, mapped to 408
/// - Body size limit
/// - Compression, CORS and tracing
/// - Session auth on every route except `PUBLIC_PATHS`
pub fn create_router(
    app_state: &AppState,
    auth_state: Option<Arc<AuthState>>,
) -> Router<AppState> {
    use axum::{extract::State, middleware::Next};

    let mut router = Router::new()
        .route("/health", get(handlers::system::health_handler))
        .route("/metrics", get(handlers::system::metrics_handler))
        .route("/api/dashboard/advanced", get(handlers::system::advanced_dashboard_handler))
        // auth
        .route("/api/auth/login", post(handlers::auth::login_handler))
        .route("/api/auth/logout", post(handlers::auth::logout_handler))
        .route("/api/auth/me", get(handlers::auth::me_handler))
        // incidents
        .route("/api/sectors", get(handlers::incidents::sectors_handler))
        .route("/api/incident-types", get(handlers::incidents::incident_types_handler))
        .route(
            "/api/incidents",
            get(handlers::incidents::list_incidents_handler).post(handlers::incidents::create_incident_handler),
        )
        .route("/api/incidents/high-risk", get(handlers::incidents::high_risk_handler))
        .route("/api/incidents/:id", get(handlers::incidents::get_incident_handler))
        .route("/api/incidents/:id/status", put(handlers::incidents::update_status_handler))
        .route(
            "/api/incidents/:id/actions",
            get(handlers::incidents::list_actions_handler).post(handlers::incidents::add_action_handler),
        )
        .route("/api/dashboard", get(handlers::incidents::dashboard_handler))
        .route("/api/statistics", get(handlers::incidents::statistics_handler))
        .route("/api/predict", post(handlers::incidents::predict_handler))
        .route("/api/chatbot", post(handlers::incidents::chatbot_handler))
        // analysis
        .route("/api/ai/analyze-text", post(handlers::analysis::analyze_text_handler))
        .route("/api/ai/sentiment-analysis", post(handlers::analysis::sentiment_handler))
        .route("/api/ai/predict-incidents", get(handlers::analysis::predict_incidents_handler))
        .route("/api/analytics/cost-prediction", post(handlers::analysis::cost_prediction_handler))
        .route("/api/analytics/cost-trends", get(handlers::analysis::cost_trends_handler))
        .route("/api/analytics/cost-report", get(handlers::analysis::cost_report_handler))
        // ledger
        .route(
            "/api/blockchain/certificates",
            get(handlers::ledger::certificates_handler).post(handlers::ledger::create_certificate_handler),
        )
        .route("/api/blockchain/verify/:id", get(handlers::ledger::verify_certificate_handler))
        .route(
            "/api/blockchain/audits",
            get(handlers::ledger::audits_handler).post(handlers::ledger::create_audit_handler),
        )
        .route("/api/blockchain/stats", get(handlers::ledger::stats_handler))
        .route("/api/blockchain/blocks", get(handlers::ledger::blocks_handler))
        // iot
        .route(
            "/api/iot/sensors",
            get(handlers::iot::sensors_handler).post(handlers::iot::add_sensor_handler),
        )
        .route("/api/iot/sensors/:id", delete(handlers::iot::remove_sensor_handler))
        .route("/api/iot/sensors/:id/data", get(handlers::iot::sensor_data_handler))
        .route("/api/iot/sensors/:id/readings", post(handlers::iot::record_reading_handler))
        .route("/api/iot/status", get(handlers::iot::status_handler))
        .route("/api/iot/alerts", get(handlers::iot::alerts_handler))
        .route("/api/iot/alerts/:id/acknowledge", post(handlers::iot::acknowledge_alert_handler))
        .route("/api/iot/alerts/:id/resolve", post(handlers::iot::resolve_alert_handler))
        // gamification
        .route("/api/gamification/profile", post(handlers::gamification::create_profile_handler))
        .route("/api/gamification/profile/:user_id", get(handlers::gamification::profile_handler))
        .route("/api/gamification/award-points", post(handlers::gamification::award_points_handler))
        .route("/api/gamification/leaderboard", get(handlers::gamification::leaderboard_handler))
        .route("/api/gamification/badges", get(handlers::gamification::badges_handler))
        .route("/api/gamification/challenges", post(handlers::gamification::create_challenge_handler))
        .route("/api/gamification/challenges/:id/join", post(handlers::gamification::join_challenge_handler))
        .route("/api/gamification/stats/:user_id", get(handlers::gamification::user_stats_handler))
        // arvr
        .route("/api/arvr/scenes", get(handlers::arvr::scenes_handler))
        .route("/api/arvr/scenes/:id/statistics", get(handlers::arvr::scene_statistics_handler))
        .route(
            "/api/arvr/sessions",
            get(handlers::arvr::user_sessions_handler).post(handlers::arvr::start_session_handler),
        )
        .route("/api/arvr/sessions/:id/interaction", post(handlers::arvr::interaction_handler))
        .route("/api/arvr/sessions/:id/end", post(handlers::arvr::end_session_handler))
        .route("/api/arvr/report", get(handlers::arvr::training_report_handler))
        // suppliers
        .route(
            "/api/suppliers",
            get(handlers::suppliers::suppliers_handler).post(handlers::suppliers::add_supplier_handler),
        )
        .route("/api/suppliers/statistics", get(handlers::suppliers::statistics_handler))
        .route("/api/suppliers/audits/overdue", get(handlers::suppliers::overdue_audits_handler))
        .route("/api/suppliers/audits/:id/complete", post(handlers::suppliers::complete_audit_handler))
        .route("/api/suppliers/risk/:level", get(handlers::suppliers::by_risk_level_handler))
        .route("/api/suppliers/:id/risk-assessment", get(handlers::suppliers::risk_assessment_handler))
        .route("/api/suppliers/:id/status", put(handlers::suppliers::update_status_handler))
        .route("/api/suppliers/:id/audits", post(handlers::suppliers::schedule_audit_handler))
        .route("/api/suppliers/:id/incidents", post(handlers::suppliers::report_incident_handler))
        // reports
        .route("/api/reports", get(handlers::reports::catalog_handler))
        .route("/api/reports/:report_type", post(handlers::reports::generate_report_handler))
        // workflows
        .route(
            "/api/workflows",
            get(handlers::workflows::user_workflows_handler).post(handlers::workflows::create_workflow_handler),
        )
        .route("/api/workflows/templates", get(handlers::workflows::templates_handler))
        .route("/api/workflows/metrics", get(handlers::workflows::metrics_handler))
        .route("/api/workflows/:id", get(handlers::workflows::get_workflow_handler))
        .route("/api/workflows/:id/steps/:step_id", post(handlers::workflows::execute_step_handler))
        // training
        .route(
            "/api/training",
            get(handlers::training::trainings_handler).post(handlers::training::create_training_handler),
        )
        .route("/api/training/categories", get(handlers::training::categories_handler))
        .route("/api/training/sessions", post(handlers::training::schedule_session_handler))
        .route("/api/training/sessions/:id/enroll", post(handlers::training::enroll_handler))
        .route("/api/training/participations/:id/complete", post(handlers::training::complete_handler))
        .route("/api/training/certifications/:user_id", get(handlers::training::certifications_handler))
        .route("/api/training/expiring", get(handlers::training::expiring_handler))
        .route("/api/training/plan/:user_id", get(handlers::training::plan_handler))
        .route("/api/training/statistics", get(handlers::training::statistics_handler))
        // notifications
        .route("/api/notifications", get(handlers::notifications::list_handler))
        .route("/api/notifications/:id/read", post(handlers::notifications::mark_read_handler))
        .route(
            "/api/notifications/config",
            get(handlers::notifications::config_handler).put(handlers::notifications::update_config_handler),
        )
        // admin
        .route("/api/admin/overview", get(handlers::admin::overview_handler))
        .route(
            "/api/admin/users",
            get(handlers::admin::users_handler).post(handlers::admin::create_user_handler),
        )
        .route("/api/admin/users/:id/role", put(handlers::admin::update_role_handler))
        .route("/api/admin/compliance", get(handlers::admin::compliance_handler))
        .route("/api/admin/compliance/:code", put(handlers::admin::review_regulation_handler))
        .route("/api/admin/logs", get(handlers::admin::logs_handler))
        .route(
            "/api/admin/equipment",
            get(handlers::admin::equipment_handler).post(handlers::admin::create_equipment_handler),
        )
        .route("/api/admin/equipment/inspections", get(handlers::admin::inspections_due_handler))
        .route("/api/admin/equipment/:id/status", put(handlers::admin::equipment_status_handler))
        .route(
            "/api/admin/equipment/:id/inspections",
            get(handlers::admin::inspection_history_handler).post(handlers::admin::record_inspection_handler),
        );

    // Apply auth middleware to protected routes only
    if let Some(auth_state) = auth_state {
        router = router.route_layer(axum::middleware::from_fn_with_state(
            auth_state,
            |state: State<Arc<AuthState>>, request: Request, next: Next| async move {
                if PUBLIC_PATHS.contains(&request.uri().path()) {
                    return Ok(next.run(request).await);
                }
                crate::auth::auth_middleware::auth_middleware(state, request, next).await
            },
        ));
    }

    let body_limit = app_state.config.body_size_limit_bytes;
    let timeout_secs = app_state.config.request_timeout_secs;

    router = router
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer())
        .layer(middleware::compression_layer())
        .layer(RequestBodyLimitLayer::new(body_limit));

    // HandleErrorLayer must wrap the timeout to turn Elapsed into a response
    let middleware_stack = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|e: BoxError| async move {
            let status = if e.is::<tower::timeout::error::Elapsed>() {
                StatusCode::REQUEST_TIMEOUT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, e.to_string())
        }))
        .timeout(Duration::from_secs(timeout_secs))
        .into_inner();

    router.layer(middleware_stack)
}
