// Immersive sessions, interactions and training statistics

use crate::arvr::scenes::{default_scenes, DeviceType, SceneType};
use crate::core::errors::QhseError;
use crate::core::models::round_to;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Scene {
    pub scene_id: String,
    pub name: String,
    pub description: String,
    pub scene_type: String,
    pub device_type: String,
    #[sqlx(json)]
    pub content: Value,
    pub duration_minutes: i64,
    pub difficulty_level: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SessionSummary {
    pub session_id: String,
    pub scene_id: String,
    pub scene_name: String,
    pub scene_type: String,
    pub difficulty_level: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub progress_percentage: f64,
    pub score: Option<f64>,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Position {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInteraction {
    pub interaction_type: String,
    pub object_id: Option<String>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndedSession {
    pub session_id: String,
    pub progress_percentage: f64,
    pub score: Option<f64>,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecentSession {
    pub start_time: DateTime<Utc>,
    pub progress_percentage: f64,
    pub score: Option<f64>,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneStatistics {
    pub scene_id: String,
    pub total_sessions: i64,
    pub average_progress: f64,
    pub average_score: f64,
    pub completion_rate: f64,
    pub recent_sessions: Vec<RecentSession>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SceneActivity {
    pub scene_id: String,
    pub scene_name: String,
    pub scene_type: String,
    pub session_count: i64,
    pub average_progress: f64,
    pub average_score: f64,
    pub completed_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub total_sessions: i64,
    pub completed_sessions: i64,
    pub completion_rate: f64,
    pub average_progress: f64,
    pub average_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub user_id: i64,
    pub days: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub summary: TrainingSummary,
    pub scenes: Vec<SceneActivity>,
}

/// Progress as a share of the scene's planned duration, capped at 100
pub fn progress_percentage(elapsed: Duration, duration_minutes: i64) -> f64 {
    let planned = (duration_minutes.max(1) * 60) as f64;
    let actual = elapsed.num_milliseconds().max(0) as f64 / 1000.0;
    round_to((actual / planned * 100.0).min(100.0), 2)
}

#[derive(Clone)]
pub struct ArvrManager {
    db_pool: SqlitePool,
}

impl ArvrManager {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Store the built-in scenes that are not present yet
    pub async fn seed_default_scenes(&self) -> Result<usize, QhseError> {
        let now = Utc::now();
        let mut inserted = 0;
        for scene in default_scenes() {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO arvr_scenes
                 (scene_id, name, description, scene_type, device_type, content, duration_minutes, difficulty_level, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(scene.scene_id)
            .bind(scene.name)
            .bind(scene.description)
            .bind(scene.scene_type.as_str())
            .bind(scene.device_type.as_str())
            .bind(scene.content.to_string())
            .bind(scene.duration_minutes)
            .bind(scene.difficulty_level)
            .bind(now)
            .execute(&self.db_pool)
            .await?;
            inserted += result.rows_affected() as usize;
        }
        if inserted > 0 {
            info!(scenes = inserted, "AR/VR scenes created");
        }
        Ok(inserted)
    }

    pub async fn scenes(
        &self,
        scene_type: Option<SceneType>,
        device_type: Option<DeviceType>,
    ) -> Result<Vec<Scene>, QhseError> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT scene_id, name, description, scene_type, device_type, content, duration_minutes,
                    difficulty_level, created_at
             FROM arvr_scenes WHERE 1 = 1",
        );
        if let Some(scene_type) = scene_type {
            query.push(" AND scene_type = ").push_bind(scene_type.as_str());
        }
        if let Some(device_type) = device_type {
            query.push(" AND device_type = ").push_bind(device_type.as_str());
        }
        query.push(" ORDER BY scene_id");

        let rows = query.build_query_as::<Scene>().fetch_all(&self.db_pool).await?;
        Ok(rows)
    }

    async fn scene_duration(&self, scene_id: &str) -> Result<Option<i64>, QhseError> {
        let duration = sqlx::query_scalar("SELECT duration_minutes FROM arvr_scenes WHERE scene_id = ?")
            .bind(scene_id)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(duration)
    }

    pub async fn start_session(&self, user_id: i64, scene_id: &str, device_type: DeviceType) -> Result<String, QhseError> {
        if self.scene_duration(scene_id).await?.is_none() {
            return Err(QhseError::NotFound(format!("Scene {}", scene_id)));
        }

        let session_id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO arvr_sessions (session_id, user_id, scene_id, device_type, start_time, progress_percentage, completed)
             VALUES (?, ?, ?, ?, ?, 0.0, 0)",
        )
        .bind(&session_id)
        .bind(user_id)
        .bind(scene_id)
        .bind(device_type.as_str())
        .bind(Utc::now())
        .execute(&self.db_pool)
        .await?;

        info!(session_id = %session_id, user_id, scene_id, "AR/VR session started");
        Ok(session_id)
    }

    /// Active sessions are the ones that have not ended
    async fn active_session(&self, session_id: &str) -> Result<Option<(String, DateTime<Utc>)>, QhseError> {
        let row = sqlx::query_as::<_, (String, DateTime<Utc>)>(
            "SELECT scene_id, start_time FROM arvr_sessions WHERE session_id = ? AND completed = 0",
        )
        .bind(session_id)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(row)
    }

    /// Returns the interaction id, or `None` when the session is not active
    pub async fn record_interaction(
        &self,
        session_id: &str,
        interaction: &NewInteraction,
    ) -> Result<Option<String>, QhseError> {
        if interaction.interaction_type.trim().is_empty() {
            return Err(QhseError::Validation("interaction_type is required".to_string()));
        }
        if self.active_session(session_id).await?.is_none() {
            return Ok(None);
        }

        let interaction_id = Uuid::new_v4().to_string();
        let position = serde_json::to_string(&interaction.position)
            .map_err(|e| QhseError::Validation(format!("Invalid position: {}", e)))?;
        sqlx::query(
            "INSERT INTO arvr_interactions (interaction_id, session_id, interaction_type, object_id, position, timestamp, data)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&interaction_id)
        .bind(session_id)
        .bind(&interaction.interaction_type)
        .bind(&interaction.object_id)
        .bind(position)
        .bind(Utc::now())
        .bind(interaction.data.to_string())
        .execute(&self.db_pool)
        .await?;

        Ok(Some(interaction_id))
    }

    /// Close an active session; `None` when it is unknown or already ended
    pub async fn end_session(&self, session_id: &str, score: Option<f64>) -> Result<Option<EndedSession>, QhseError> {
        let Some((scene_id, start_time)) = self.active_session(session_id).await? else {
            return Ok(None);
        };
        let duration = self.scene_duration(&scene_id).await?.unwrap_or(1);

        let end_time = Utc::now();
        let progress = progress_percentage(end_time - start_time, duration);
        sqlx::query(
            "UPDATE arvr_sessions SET end_time = ?, progress_percentage = ?, score = ?, completed = 1
             WHERE session_id = ?",
        )
        .bind(end_time)
        .bind(progress)
        .bind(score)
        .bind(session_id)
        .execute(&self.db_pool)
        .await?;

        info!(session_id, progress, "AR/VR session ended");
        Ok(Some(EndedSession {
            session_id: session_id.to_string(),
            progress_percentage: progress,
            score,
            completed: true,
        }))
    }

    pub async fn user_sessions(&self, user_id: i64, limit: i64) -> Result<Vec<SessionSummary>, QhseError> {
        let rows = sqlx::query_as::<_, SessionSummary>(
            "SELECT s.session_id, s.scene_id, sc.name AS scene_name, sc.scene_type, sc.difficulty_level,
                    s.start_time, s.end_time, s.progress_percentage, s.score, s.completed
             FROM arvr_sessions s JOIN arvr_scenes sc ON sc.scene_id = s.scene_id
             WHERE s.user_id = ? ORDER BY s.start_time DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit.clamp(1, 100))
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    pub async fn scene_statistics(&self, scene_id: &str) -> Result<SceneStatistics, QhseError> {
        if self.scene_duration(scene_id).await?.is_none() {
            return Err(QhseError::NotFound(format!("Scene {}", scene_id)));
        }

        let (total, avg_progress, avg_score, completed): (i64, Option<f64>, Option<f64>, i64) = sqlx::query_as(
            "SELECT COUNT(*), AVG(progress_percentage), AVG(score), COALESCE(SUM(completed), 0)
             FROM arvr_sessions WHERE scene_id = ?",
        )
        .bind(scene_id)
        .fetch_one(&self.db_pool)
        .await?;

        let recent_sessions = sqlx::query_as::<_, RecentSession>(
            "SELECT start_time, progress_percentage, score, completed FROM arvr_sessions
             WHERE scene_id = ? ORDER BY start_time DESC LIMIT 10",
        )
        .bind(scene_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(SceneStatistics {
            scene_id: scene_id.to_string(),
            total_sessions: total,
            average_progress: round_to(avg_progress.unwrap_or(0.0), 2),
            average_score: round_to(avg_score.unwrap_or(0.0), 2),
            completion_rate: round_to(completed as f64 / total.max(1) as f64 * 100.0, 2),
            recent_sessions,
        })
    }

    pub async fn training_report(&self, user_id: i64, days: i64) -> Result<TrainingReport, QhseError> {
        if days <= 0 {
            return Err(QhseError::Validation("days must be positive".to_string()));
        }
        let end_date = Utc::now();
        let start_date = end_date - Duration::days(days);

        let scenes = sqlx::query_as::<_, SceneActivity>(
            "SELECT s.scene_id, sc.name AS scene_name, sc.scene_type,
                    COUNT(*) AS session_count,
                    COALESCE(AVG(s.progress_percentage), 0.0) AS average_progress,
                    COALESCE(AVG(s.score), 0.0) AS average_score,
                    COALESCE(SUM(s.completed), 0) AS completed_count
             FROM arvr_sessions s JOIN arvr_scenes sc ON sc.scene_id = s.scene_id
             WHERE s.user_id = ? AND s.start_time >= ?
             GROUP BY s.scene_id, sc.name, sc.scene_type
             ORDER BY s.scene_id",
        )
        .bind(user_id)
        .bind(start_date)
        .fetch_all(&self.db_pool)
        .await?
        .into_iter()
        .map(|mut row| {
            row.average_progress = round_to(row.average_progress, 2);
            row.average_score = round_to(row.average_score, 2);
            row
        })
        .collect::<Vec<_>>();

        let total_sessions: i64 = scenes.iter().map(|s| s.session_count).sum();
        let completed_sessions: i64 = scenes.iter().map(|s| s.completed_count).sum();
        let scene_count = scenes.len().max(1) as f64;

        Ok(TrainingReport {
            user_id,
            days,
            start_date,
            end_date,
            summary: TrainingSummary {
                total_sessions,
                completed_sessions,
                completion_rate: round_to(completed_sessions as f64 / total_sessions.max(1) as f64 * 100.0, 2),
                average_progress: round_to(scenes.iter().map(|s| s.average_progress).sum::<f64>() / scene_count, 2),
                average_score: round_to(scenes.iter().map(|s| s.average_score).sum::<f64>() / scene_count, 2),
            },
            scenes,
        })
    }

    pub async fn session_counts(&self) -> Result<(i64, i64), QhseError> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN completed = 0 THEN 1 ELSE 0 END), 0) FROM arvr_sessions",
        )
        .fetch_one(&self.db_pool)
        .await?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use serde_json::json;

    async fn manager() -> ArvrManager {
        let pool = db::connect_in_memory().await.unwrap();
        let manager = ArvrManager::new(pool);
        manager.seed_default_scenes().await.unwrap();
        manager
    }

    #[test]
    fn test_progress_is_capped() {
        assert_eq!(progress_percentage(Duration::minutes(15), 30), 50.0);
        assert_eq!(progress_percentage(Duration::minutes(90), 30), 100.0);
        assert_eq!(progress_percentage(Duration::zero(), 30), 0.0);
    }

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let manager = manager().await;
        assert_eq!(manager.seed_default_scenes().await.unwrap(), 0);
        assert_eq!(manager.scenes(None, None).await.unwrap().len(), 4);
        let vr = manager.scenes(None, Some(DeviceType::VrHeadset)).await.unwrap();
        assert_eq!(vr.len(), 2);
        let guidance = manager.scenes(Some(SceneType::Guidance), None).await.unwrap();
        assert_eq!(guidance[0].content["equipment"]["model"], "PH-5000");
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let manager = manager().await;
        let session_id = manager
            .start_session(7, "safety_training_1", DeviceType::VrHeadset)
            .await
            .unwrap();

        let interaction = NewInteraction {
            interaction_type: "grab".to_string(),
            object_id: Some("helmet_1".to_string()),
            position: Position::default(),
            data: json!({"points": 10}),
        };
        assert!(manager.record_interaction(&session_id, &interaction).await.unwrap().is_some());

        let ended = manager.end_session(&session_id, Some(85.0)).await.unwrap().unwrap();
        assert!(ended.completed);
        assert!(ended.progress_percentage < 1.0);

        // no longer active
        assert!(manager.record_interaction(&session_id, &interaction).await.unwrap().is_none());
        assert!(manager.end_session(&session_id, None).await.unwrap().is_none());

        let sessions = manager.user_sessions(7, 10).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].score, Some(85.0));

        let stats = manager.scene_statistics("safety_training_1").await.unwrap();
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.completion_rate, 100.0);
        assert_eq!(stats.average_score, 85.0);

        let report = manager.training_report(7, 30).await.unwrap();
        assert_eq!(report.summary.total_sessions, 1);
        assert_eq!(report.scenes[0].completed_count, 1);
    }

    #[tokio::test]
    async fn test_unknown_scene() {
        let manager = manager().await;
        let result = manager.start_session(1, "missing", DeviceType::Tablet).await;
        assert!(matches!(result, Err(QhseError::NotFound(_))));
        assert!(matches!(manager.scene_statistics("missing").await, Err(QhseError::NotFound(_))));
    }
}
