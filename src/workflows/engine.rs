// Approval workflows with overdue escalation

use crate::core::errors::QhseError;
use crate::core::models::round_to;
use crate::workflows::templates::{self, PRIORITIES};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Workflow {
    pub workflow_id: String,
    pub template_id: String,
    pub name: String,
    pub incident_id: Option<i64>,
    pub priority: String,
    pub status: String,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WorkflowStep {
    pub step_id: String,
    pub workflow_id: String,
    pub position: i64,
    pub name: String,
    pub assigned_role: String,
    pub status: String,
    pub due_date: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WorkflowAction {
    pub step_id: String,
    pub user_id: i64,
    pub action: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WorkflowEscalation {
    pub step_id: String,
    pub escalation_level: String,
    pub delay_hours: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowDetail {
    pub workflow: Workflow,
    pub steps: Vec<WorkflowStep>,
    pub actions: Vec<WorkflowAction>,
    pub escalations: Vec<WorkflowEscalation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWorkflow {
    pub template_id: String,
    pub incident_id: Option<i64>,
    #[serde(default = "default_priority")]
    pub priority: String,
}

fn default_priority() -> String {
    "medium".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    Start,
    Approve,
    Reject,
    Complete,
}

impl StepAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepAction::Start => "start",
            StepAction::Approve => "approve",
            StepAction::Reject => "reject",
            StepAction::Complete => "complete",
        }
    }

    /// Step status after the action
    pub fn resulting_status(&self) -> &'static str {
        match self {
            StepAction::Start => "in_progress",
            StepAction::Approve => "approved",
            StepAction::Reject => "rejected",
            StepAction::Complete => "completed",
        }
    }

    pub fn closes_step(&self) -> bool {
        !matches!(self, StepAction::Start)
    }
}

impl FromStr for StepAction {
    type Err = QhseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(StepAction::Start),
            "approve" => Ok(StepAction::Approve),
            "reject" => Ok(StepAction::Reject),
            "complete" => Ok(StepAction::Complete),
            other => Err(QhseError::Validation(format!("Unknown workflow action '{}'", other))),
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub workflow_id: String,
    pub step_id: String,
    pub step_status: String,
    pub workflow_status: String,
    pub escalations: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowMetrics {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_workflows: i64,
    pub completed_workflows: i64,
    pub escalated_workflows: i64,
    pub overdue_workflows: i64,
    pub completion_rate: f64,
    pub average_processing_time_hours: f64,
}

const WORKFLOW_COLUMNS: &str =
    "workflow_id, template_id, name, incident_id, priority, status, created_by, created_at, updated_at, completed_at";

#[derive(Clone)]
pub struct WorkflowEngine {
    db_pool: SqlitePool,
}

impl WorkflowEngine {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Instantiate a template; every step starts pending with `due = now + hours`
    pub async fn create(&self, request: &NewWorkflow, created_by: i64) -> Result<WorkflowDetail, QhseError> {
        let template = templates::find(&request.template_id)
            .ok_or_else(|| QhseError::Validation(format!("Unknown workflow template '{}'", request.template_id)))?;
        if !PRIORITIES.contains(&request.priority.as_str()) {
            return Err(QhseError::Validation(format!("Invalid priority '{}'", request.priority)));
        }

        let workflow_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.db_pool.begin().await?;
        sqlx::query(
            "INSERT INTO workflows (workflow_id, template_id, name, incident_id, priority, status, created_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 'pending', ?, ?, ?)",
        )
        .bind(&workflow_id)
        .bind(template.template_id)
        .bind(template.name)
        .bind(request.incident_id)
        .bind(&request.priority)
        .bind(created_by)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (position, step) in template.steps.iter().enumerate() {
            sqlx::query(
                "INSERT INTO workflow_steps (step_id, workflow_id, position, name, assigned_role, status, due_date)
                 VALUES (?, ?, ?, ?, ?, 'pending', ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&workflow_id)
            .bind(position as i64)
            .bind(step.name)
            .bind(step.role)
            .bind(now + Duration::hours(step.duration_hours))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(workflow_id = %workflow_id, template = template.template_id, "Workflow created");
        self.get(&workflow_id)
            .await?
            .ok_or_else(|| QhseError::NotFound(format!("Workflow {}", workflow_id)))
    }

    pub async fn get(&self, workflow_id: &str) -> Result<Option<WorkflowDetail>, QhseError> {
        let workflow = sqlx::query_as::<_, Workflow>(&format!(
            "SELECT {} FROM workflows WHERE workflow_id = ?",
            WORKFLOW_COLUMNS
        ))
        .bind(workflow_id)
        .fetch_optional(&self.db_pool)
        .await?;
        let Some(workflow) = workflow else {
            return Ok(None);
        };

        let steps = sqlx::query_as::<_, WorkflowStep>(
            "SELECT step_id, workflow_id, position, name, assigned_role, status, due_date, completed_at, comment
             FROM workflow_steps WHERE workflow_id = ? ORDER BY position",
        )
        .bind(workflow_id)
        .fetch_all(&self.db_pool)
        .await?;
        let actions = sqlx::query_as::<_, WorkflowAction>(
            "SELECT step_id, user_id, action, comment, created_at FROM workflow_actions
             WHERE workflow_id = ? ORDER BY created_at DESC, id DESC LIMIT 10",
        )
        .bind(workflow_id)
        .fetch_all(&self.db_pool)
        .await?;
        let escalations = sqlx::query_as::<_, WorkflowEscalation>(
            "SELECT step_id, escalation_level, delay_hours, created_at FROM workflow_escalations
             WHERE workflow_id = ? ORDER BY id",
        )
        .bind(workflow_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(Some(WorkflowDetail {
            workflow,
            steps,
            actions,
            escalations,
        }))
    }

    /// Apply an action to a pending step, then re-check completion and escalation
    pub async fn execute_step(
        &self,
        workflow_id: &str,
        step_id: &str,
        action: StepAction,
        user_id: i64,
        comment: Option<&str>,
    ) -> Result<StepOutcome, QhseError> {
        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;

        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM workflow_steps WHERE step_id = ? AND workflow_id = ?")
                .bind(step_id)
                .bind(workflow_id)
                .fetch_optional(&mut *tx)
                .await?;
        match status.as_deref() {
            None => return Err(QhseError::Validation(format!("Step {} not found in workflow {}", step_id, workflow_id))),
            Some("pending") => {}
            Some(other) => return Err(QhseError::Validation(format!("Step {} is {}, not pending", step_id, other))),
        }

        let step_status = action.resulting_status();
        sqlx::query("UPDATE workflow_steps SET status = ?, completed_at = ?, comment = COALESCE(?, comment) WHERE step_id = ?")
            .bind(step_status)
            .bind(if action.closes_step() { Some(now) } else { None })
            .bind(comment)
            .bind(step_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO workflow_actions (workflow_id, step_id, user_id, action, comment, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(workflow_id)
        .bind(step_id)
        .bind(user_id)
        .bind(action.as_str())
        .bind(comment)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let workflow_status = match action {
            StepAction::Approve | StepAction::Complete if all_steps_done(&mut tx, workflow_id).await? => "completed",
            StepAction::Reject => "rejected",
            _ => "in_progress",
        };
        // an escalated workflow stays escalated until it completes or is rejected
        let current: String = sqlx::query_scalar("SELECT status FROM workflows WHERE workflow_id = ?")
            .bind(workflow_id)
            .fetch_one(&mut *tx)
            .await?;
        let workflow_status = if current == "escalated" && workflow_status == "in_progress" {
            "escalated"
        } else {
            workflow_status
        };
        sqlx::query(
            "UPDATE workflows SET status = ?, updated_at = ?,
              completed_at = CASE WHEN ? = 'completed' THEN ? ELSE completed_at END
             WHERE workflow_id = ?",
        )
        .bind(workflow_status)
        .bind(now)
        .bind(workflow_status)
        .bind(now)
        .bind(workflow_id)
        .execute(&mut *tx)
        .await?;

        let escalations = escalate_overdue(&mut tx, workflow_id, now).await?;
        tx.commit().await?;

        let workflow_status = if escalations > 0 { "escalated" } else { workflow_status };
        info!(workflow_id, step_id, action = %action, workflow_status, "Workflow step executed");
        Ok(StepOutcome {
            workflow_id: workflow_id.to_string(),
            step_id: step_id.to_string(),
            step_status: step_status.to_string(),
            workflow_status: workflow_status.to_string(),
            escalations,
        })
    }

    /// Workflows with a pending step assigned to `role`, most urgent first
    pub async fn user_workflows(&self, role: &str) -> Result<Vec<Workflow>, QhseError> {
        let rows = sqlx::query_as::<_, Workflow>(
            "SELECT DISTINCT w.workflow_id, w.template_id, w.name, w.incident_id, w.priority, w.status, w.created_by,
                    w.created_at, w.updated_at, w.completed_at
             FROM workflows w JOIN workflow_steps s ON s.workflow_id = w.workflow_id
             WHERE s.assigned_role = ? AND s.status = 'pending'
             ORDER BY CASE w.priority
                        WHEN 'critical' THEN 5 WHEN 'urgent' THEN 4 WHEN 'high' THEN 3
                        WHEN 'medium' THEN 2 ELSE 1 END DESC,
                      w.created_at ASC",
        )
        .bind(role)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    pub async fn metrics(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<WorkflowMetrics, QhseError> {
        if end < start {
            return Err(QhseError::Validation("end must not precede start".to_string()));
        }
        let rows = sqlx::query_as::<_, (String, DateTime<Utc>, Option<DateTime<Utc>>)>(
            "SELECT status, created_at, completed_at FROM workflows WHERE created_at >= ? AND created_at <= ?",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.db_pool)
        .await?;

        let overdue_workflows: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT w.workflow_id) FROM workflows w
             JOIN workflow_steps s ON s.workflow_id = w.workflow_id
             WHERE w.created_at >= ? AND w.created_at <= ? AND s.status = 'pending' AND s.due_date < ?",
        )
        .bind(start)
        .bind(end)
        .bind(Utc::now())
        .fetch_one(&self.db_pool)
        .await?;

        let total_workflows = rows.len() as i64;
        let durations: Vec<f64> = rows
            .iter()
            .filter(|(status, _, _)| status == "completed")
            .filter_map(|(_, created, finished)| finished.map(|f| (f - *created).num_seconds() as f64 / 3600.0))
            .collect();
        let completed_workflows = rows.iter().filter(|(status, _, _)| status == "completed").count() as i64;
        let escalated_workflows = rows.iter().filter(|(status, _, _)| status == "escalated").count() as i64;
        let average = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        Ok(WorkflowMetrics {
            start,
            end,
            total_workflows,
            completed_workflows,
            escalated_workflows,
            overdue_workflows,
            completion_rate: if total_workflows > 0 {
                round_to(completed_workflows as f64 / total_workflows as f64 * 100.0, 2)
            } else {
                0.0
            },
            average_processing_time_hours: round_to(average, 2),
        })
    }

    pub async fn count_since(&self, since: DateTime<Utc>) -> Result<(i64, i64), QhseError> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0)
             FROM workflows WHERE created_at >= ?",
        )
        .bind(since)
        .fetch_one(&self.db_pool)
        .await?;
        Ok(counts)
    }
}

async fn all_steps_done(tx: &mut Transaction<'_, Sqlite>, workflow_id: &str) -> Result<bool, QhseError> {
    let remaining: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM workflow_steps WHERE workflow_id = ? AND status NOT IN ('approved', 'completed')",
    )
    .bind(workflow_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(remaining == 0)
}

/// Record one escalation per overdue pending step and level; returns how many were added
async fn escalate_overdue(
    tx: &mut Transaction<'_, Sqlite>,
    workflow_id: &str,
    now: DateTime<Utc>,
) -> Result<usize, QhseError> {
    let overdue = sqlx::query_as::<_, (String, DateTime<Utc>)>(
        "SELECT step_id, due_date FROM workflow_steps WHERE workflow_id = ? AND status = 'pending' AND due_date < ?",
    )
    .bind(workflow_id)
    .bind(now)
    .fetch_all(&mut **tx)
    .await?;

    let mut added = 0;
    for (step_id, due_date) in overdue {
        let delay_hours = (now - due_date).num_seconds() as f64 / 3600.0;
        let Some(level) = templates::escalation_level(delay_hours) else {
            continue;
        };
        let exists: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM workflow_escalations WHERE step_id = ? AND escalation_level = ?",
        )
        .bind(&step_id)
        .bind(level)
        .fetch_one(&mut **tx)
        .await?;
        if exists > 0 {
            continue;
        }

        sqlx::query(
            "INSERT INTO workflow_escalations (workflow_id, step_id, escalation_level, delay_hours, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(workflow_id)
        .bind(&step_id)
        .bind(level)
        .bind(round_to(delay_hours, 2))
        .bind(now)
        .execute(&mut **tx)
        .await?;
        warn!(workflow_id, step_id = %step_id, escalated_to = level, delay_hours, "Workflow escalated");
        added += 1;
    }

    if added > 0 {
        sqlx::query("UPDATE workflows SET status = 'escalated', updated_at = ? WHERE workflow_id = ?")
            .bind(now)
            .bind(workflow_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn engine() -> (WorkflowEngine, SqlitePool) {
        let pool = db::connect_in_memory().await.unwrap();
        (WorkflowEngine::new(pool.clone()), pool)
    }

    fn request(template_id: &str) -> NewWorkflow {
        NewWorkflow {
            template_id: template_id.to_string(),
            incident_id: None,
            priority: "high".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_from_template() {
        let (engine, _pool) = engine().await;
        let detail = engine.create(&request("corrective_action"), 1).await.unwrap();
        assert_eq!(detail.workflow.status, "pending");
        assert_eq!(detail.steps.len(), 6);
        assert!(detail.steps.iter().all(|s| s.status == "pending"));
        let first = &detail.steps[0];
        let hours = (first.due_date - detail.workflow.created_at).num_minutes();
        assert!((119..=121).contains(&hours));
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let (engine, _pool) = engine().await;
        assert!(matches!(engine.create(&request("nope"), 1).await, Err(QhseError::Validation(_))));
        let mut bad_priority = request("corrective_action");
        bad_priority.priority = "whenever".to_string();
        assert!(matches!(engine.create(&bad_priority, 1).await, Err(QhseError::Validation(_))));
    }

    #[tokio::test]
    async fn test_steps_through_to_completion() {
        let (engine, _pool) = engine().await;
        let detail = engine.create(&request("corrective_action"), 1).await.unwrap();
        let id = detail.workflow.workflow_id.clone();

        let started = engine
            .execute_step(&id, &detail.steps[0].step_id, StepAction::Start, 1, None)
            .await
            .unwrap();
        assert_eq!(started.step_status, "in_progress");
        // only pending steps accept actions
        let again = engine.execute_step(&id, &detail.steps[0].step_id, StepAction::Complete, 1, None).await;
        assert!(matches!(again, Err(QhseError::Validation(_))));

        for step in &detail.steps[1..] {
            engine
                .execute_step(&id, &step.step_id, StepAction::Approve, 1, Some("ok"))
                .await
                .unwrap();
        }
        let current = engine.get(&id).await.unwrap().unwrap();
        assert_eq!(current.workflow.status, "in_progress");
        assert_eq!(current.actions.len(), 6);
    }

    #[tokio::test]
    async fn test_completion() {
        let (engine, _pool) = engine().await;
        let detail = engine.create(&request("corrective_action"), 1).await.unwrap();
        let id = detail.workflow.workflow_id.clone();
        let mut last = None;
        for step in &detail.steps {
            last = Some(engine.execute_step(&id, &step.step_id, StepAction::Complete, 1, None).await.unwrap());
        }
        assert_eq!(last.unwrap().workflow_status, "completed");
        let current = engine.get(&id).await.unwrap().unwrap();
        assert!(current.workflow.completed_at.is_some());

        let metrics = engine
            .metrics(Utc::now() - Duration::days(1), Utc::now() + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(metrics.total_workflows, 1);
        assert_eq!(metrics.completion_rate, 100.0);
    }

    #[tokio::test]
    async fn test_overdue_step_escalates() {
        let (engine, pool) = engine().await;
        let detail = engine.create(&request("incident_investigation"), 1).await.unwrap();
        let id = detail.workflow.workflow_id.clone();
        sqlx::query("UPDATE workflow_steps SET due_date = ? WHERE step_id = ?")
            .bind(Utc::now() - Duration::hours(80))
            .bind(&detail.steps[2].step_id)
            .execute(&pool)
            .await
            .unwrap();

        let outcome = engine
            .execute_step(&id, &detail.steps[0].step_id, StepAction::Complete, 1, None)
            .await
            .unwrap();
        assert_eq!(outcome.escalations, 1);
        assert_eq!(outcome.workflow_status, "escalated");

        let current = engine.get(&id).await.unwrap().unwrap();
        assert_eq!(current.workflow.status, "escalated");
        assert_eq!(current.escalations[0].escalation_level, "manager");

        // the same level is not recorded twice
        let outcome = engine
            .execute_step(&id, &detail.steps[1].step_id, StepAction::Start, 1, None)
            .await
            .unwrap();
        assert_eq!(outcome.escalations, 0);
    }

    #[tokio::test]
    async fn test_user_workflows_by_role() {
        let (engine, _pool) = engine().await;
        engine.create(&request("training_request"), 1).await.unwrap();
        engine.create(&request("equipment_inspection"), 1).await.unwrap();
        assert_eq!(engine.user_workflows("training_manager").await.unwrap().len(), 1);
        assert_eq!(engine.user_workflows("inspector").await.unwrap().len(), 1);
        assert!(engine.user_workflows("director").await.unwrap().is_empty());
    }
}
