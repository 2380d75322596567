// Gamification bookkeeping over SQLite

use crate::core::errors::QhseError;
use crate::gamification::badges::{self, Badge, Requirement, BADGES};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, SqlitePool};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
    pub user_id: i64,
    pub username: String,
    pub level: i64,
    pub total_points: i64,
    pub current_streak: i64,
    pub longest_streak: i64,
    pub rank_name: String,
    pub team_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: Profile,
    pub badges_earned: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PointsAward {
    pub user_id: i64,
    pub points_awarded: i64,
    pub total_points: i64,
    pub level: i64,
    pub new_badges: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardCategory {
    All,
    Monthly,
    Team,
}

impl FromStr for LeaderboardCategory {
    type Err = QhseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(LeaderboardCategory::All),
            "monthly" => Ok(LeaderboardCategory::Monthly),
            "team" => Ok(LeaderboardCategory::Team),
            other => Err(QhseError::Validation(format!("Unknown leaderboard category '{}'", other))),
        }
    }
}

/// Team rows carry `team_id` and `name`; user rows carry the user fields
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub points: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewChallenge {
    pub name: String,
    pub description: String,
    pub points_reward: i64,
    pub duration_days: i64,
    #[serde(default)]
    pub requirements: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Challenge {
    pub challenge_id: String,
    pub name: String,
    pub description: String,
    pub points_reward: i64,
    pub duration_days: i64,
    pub requirements: Value,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub profile: Profile,
    pub badges_count: usize,
    pub monthly_stats: BTreeMap<String, i64>,
    pub badges_by_category: BTreeMap<String, i64>,
    pub achievements_count: usize,
}

/// Level for a points total, capped at 100
pub fn level_for_points(points: i64) -> i64 {
    (points.max(0) / 1000 + 1).min(100)
}

#[derive(Clone)]
pub struct GamificationEngine {
    db_pool: SqlitePool,
}

impl GamificationEngine {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn profile(&self, user_id: i64) -> Result<Option<ProfileView>, QhseError> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT user_id, username, level, total_points, current_streak, longest_streak, rank_name,
                    team_id, created_at, last_activity
             FROM gamification_profiles WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;

        let Some(profile) = profile else {
            return Ok(None);
        };
        let badges_earned = self.earned_badges(user_id).await?;
        Ok(Some(ProfileView { profile, badges_earned }))
    }

    async fn earned_badges(&self, user_id: i64) -> Result<Vec<String>, QhseError> {
        let rows = sqlx::query_scalar("SELECT badge_id FROM user_achievements WHERE user_id = ? ORDER BY earned_at")
            .bind(user_id)
            .fetch_all(&self.db_pool)
            .await?;
        Ok(rows)
    }

    /// Create a level 1 "Rookie" profile; 409 when one exists
    pub async fn create_profile(&self, user_id: i64, username: &str) -> Result<ProfileView, QhseError> {
        if username.trim().is_empty() {
            return Err(QhseError::Validation("username is required".to_string()));
        }
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT OR IGNORE INTO gamification_profiles
             (user_id, username, level, total_points, current_streak, longest_streak, rank_name, created_at, last_activity)
             VALUES (?, ?, 1, 0, 0, 0, 'Rookie', ?, ?)",
        )
        .bind(user_id)
        .bind(username)
        .bind(now)
        .bind(now)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QhseError::Conflict(format!("Profile for user {} already exists", user_id)));
        }
        info!(user_id, "Gamification profile created");
        self.profile(user_id)
            .await?
            .ok_or_else(|| QhseError::NotFound(format!("Profile {}", user_id)))
    }

    /// Record a points event, award newly satisfied badges and refresh the level
    pub async fn award_points(
        &self,
        user_id: i64,
        event_type: &str,
        points: i64,
        description: &str,
        context: Value,
    ) -> Result<PointsAward, QhseError> {
        if event_type.trim().is_empty() {
            return Err(QhseError::Validation("event_type is required".to_string()));
        }
        let now = Utc::now();

        let mut tx = self.db_pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE gamification_profiles SET total_points = total_points + ?, last_activity = ? WHERE user_id = ?",
        )
        .bind(points)
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(QhseError::NotFound(format!("Profile {}", user_id)));
        }
        sqlx::query(
            "INSERT INTO points_events (user_id, event_type, points, description, context, timestamp)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(event_type)
        .bind(points)
        .bind(description)
        .bind(context.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let earned = self.earned_badges(user_id).await?;
        let mut new_badges = Vec::new();
        for badge in BADGES.iter().filter(|b| !earned.iter().any(|e| e == b.badge_id)) {
            if self.badge_satisfied(user_id, badge).await? {
                self.grant_badge(user_id, badge).await?;
                new_badges.push(badge.badge_id.to_string());
            }
        }

        let (total_points, level): (i64, i64) =
            sqlx::query_as("SELECT total_points, level FROM gamification_profiles WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.db_pool)
                .await?;
        let new_level = level.max(level_for_points(total_points));
        if new_level > level {
            sqlx::query("UPDATE gamification_profiles SET level = ? WHERE user_id = ?")
                .bind(new_level)
                .bind(user_id)
                .execute(&self.db_pool)
                .await?;
            info!(user_id, level = new_level, "Level reached");
        }

        info!(user_id, event_type, points, badges = new_badges.len(), "Points awarded");
        Ok(PointsAward {
            user_id,
            points_awarded: points,
            total_points,
            level: new_level,
            new_badges,
        })
    }

    async fn grant_badge(&self, user_id: i64, badge: &Badge) -> Result<(), QhseError> {
        let mut tx = self.db_pool.begin().await?;
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO user_achievements (user_id, badge_id, points_earned, earned_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(badge.badge_id)
        .bind(badge.points)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() > 0 {
            sqlx::query("UPDATE gamification_profiles SET total_points = total_points + ? WHERE user_id = ?")
                .bind(badge.points)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!(user_id, badge = badge.badge_id, "Badge awarded");
        Ok(())
    }

    async fn badge_satisfied(&self, user_id: i64, badge: &Badge) -> Result<bool, QhseError> {
        for (requirement, target) in badge.requirements {
            if !self.requirement_met(user_id, *requirement, *target).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn requirement_met(&self, user_id: i64, requirement: Requirement, target: i64) -> Result<bool, QhseError> {
        let count: i64 = match requirement {
            Requirement::DaysWithoutIncident => {
                let since = Utc::now() - Duration::days(target);
                let profile_since: Option<DateTime<Utc>> =
                    sqlx::query_scalar("SELECT created_at FROM gamification_profiles WHERE user_id = ?")
                        .bind(user_id)
                        .fetch_optional(&self.db_pool)
                        .await?;
                if profile_since.map(|created| created > since).unwrap_or(true) {
                    return Ok(false);
                }
                let incidents: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM incident_reports WHERE reported_by = ? AND created_at >= ?",
                )
                .bind(user_id)
                .bind(since)
                .fetch_one(&self.db_pool)
                .await?;
                return Ok(incidents == 0);
            }
            Requirement::CompletedTrainings => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM training_participations WHERE user_id = ? AND status = 'completed'",
                )
                .bind(user_id)
                .fetch_one(&self.db_pool)
                .await?
            }
            Requirement::RiskReports => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM incident_reports WHERE reported_by = ? AND severity_level = 'low'",
                )
                .bind(user_id)
                .fetch_one(&self.db_pool)
                .await?
            }
            Requirement::TeamChallenges => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM challenge_participants p
                     JOIN gamification_challenges c ON c.challenge_id = p.challenge_id
                     WHERE p.user_id = ? AND c.status = 'completed'",
                )
                .bind(user_id)
                .fetch_one(&self.db_pool)
                .await?
            }
            Requirement::ImprovementSuggestions => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM incident_reports WHERE reported_by = ? AND ai_recommendations IS NOT NULL",
                )
                .bind(user_id)
                .fetch_one(&self.db_pool)
                .await?
            }
            Requirement::TrainedEmployees => {
                sqlx::query_scalar(
                    "SELECT COUNT(DISTINCT p.user_id) FROM training_participations p
                     JOIN training_sessions s ON s.id = p.session_id
                     WHERE s.trainer_id = ?",
                )
                .bind(user_id)
                .fetch_one(&self.db_pool)
                .await?
            }
            Requirement::CompliancePercentage => return Ok(false),
        };
        Ok(count >= target)
    }

    pub async fn leaderboard(&self, category: LeaderboardCategory, limit: i64) -> Result<Vec<LeaderboardEntry>, QhseError> {
        let limit = limit.clamp(1, 100);
        let entries = match category {
            LeaderboardCategory::All => {
                sqlx::query_as::<_, (i64, String, i64, i64, String)>(
                    "SELECT user_id, username, total_points, level, rank_name
                     FROM gamification_profiles ORDER BY total_points DESC, user_id LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.db_pool)
                .await?
                .into_iter()
                .enumerate()
                .map(|(i, row)| user_entry(i, row))
                .collect()
            }
            LeaderboardCategory::Monthly => {
                let now = Utc::now();
                let month_start = Utc
                    .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
                    .single()
                    .unwrap_or(now);
                sqlx::query_as::<_, (i64, String, i64, i64, String)>(
                    "SELECT u.user_id, u.username, SUM(p.points) AS monthly_points, u.level, u.rank_name
                     FROM gamification_profiles u JOIN points_events p ON p.user_id = u.user_id
                     WHERE p.timestamp >= ?
                     GROUP BY u.user_id, u.username, u.level, u.rank_name
                     ORDER BY monthly_points DESC, u.user_id LIMIT ?",
                )
                .bind(month_start)
                .bind(limit)
                .fetch_all(&self.db_pool)
                .await?
                .into_iter()
                .enumerate()
                .map(|(i, row)| user_entry(i, row))
                .collect()
            }
            LeaderboardCategory::Team => {
                sqlx::query_as::<_, (i64, String, i64)>(
                    "SELECT t.team_id, t.name, SUM(u.total_points) AS team_points
                     FROM gamification_teams t JOIN gamification_profiles u ON u.team_id = t.team_id
                     GROUP BY t.team_id, t.name ORDER BY team_points DESC, t.team_id LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.db_pool)
                .await?
                .into_iter()
                .enumerate()
                .map(|(i, (team_id, name, points))| LeaderboardEntry {
                    rank: i + 1,
                    user_id: None,
                    username: None,
                    team_id: Some(team_id),
                    name: Some(name),
                    points,
                    level: None,
                    rank_name: None,
                })
                .collect()
            }
        };
        Ok(entries)
    }

    pub fn badges(&self, category: Option<&str>) -> Vec<&'static Badge> {
        badges::by_category(category)
    }

    pub async fn create_challenge(&self, challenge: &NewChallenge) -> Result<Challenge, QhseError> {
        if challenge.name.trim().is_empty() {
            return Err(QhseError::Validation("name is required".to_string()));
        }
        if challenge.duration_days <= 0 || challenge.points_reward < 0 {
            return Err(QhseError::Validation(
                "duration_days must be positive and points_reward non-negative".to_string(),
            ));
        }

        let start_date = Utc::now();
        let created = Challenge {
            challenge_id: format!("challenge_{}", start_date.timestamp()),
            name: challenge.name.clone(),
            description: challenge.description.clone(),
            points_reward: challenge.points_reward,
            duration_days: challenge.duration_days,
            requirements: challenge.requirements.clone(),
            start_date,
            end_date: start_date + Duration::days(challenge.duration_days),
            status: "active".to_string(),
        };

        let result = sqlx::query(
            "INSERT OR IGNORE INTO gamification_challenges
             (challenge_id, name, description, points_reward, duration_days, requirements, start_date, end_date, status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'active')",
        )
        .bind(&created.challenge_id)
        .bind(&created.name)
        .bind(&created.description)
        .bind(created.points_reward)
        .bind(created.duration_days)
        .bind(created.requirements.to_string())
        .bind(created.start_date)
        .bind(created.end_date)
        .execute(&self.db_pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(QhseError::Conflict(format!("Challenge {} already exists", created.challenge_id)));
        }

        info!(challenge_id = %created.challenge_id, "Challenge created");
        Ok(created)
    }

    /// False when the challenge is unknown or the user already participates
    pub async fn join_challenge(&self, user_id: i64, challenge_id: &str) -> Result<bool, QhseError> {
        let exists: Option<String> = sqlx::query_scalar("SELECT challenge_id FROM gamification_challenges WHERE challenge_id = ?")
            .bind(challenge_id)
            .fetch_optional(&self.db_pool)
            .await?;
        if exists.is_none() {
            return Ok(false);
        }

        let result = sqlx::query(
            "INSERT OR IGNORE INTO challenge_participants (challenge_id, user_id, joined_at) VALUES (?, ?, ?)",
        )
        .bind(challenge_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.db_pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn user_stats(&self, user_id: i64) -> Result<Option<UserStats>, QhseError> {
        let Some(view) = self.profile(user_id).await? else {
            return Ok(None);
        };

        let monthly_stats: BTreeMap<String, i64> = sqlx::query_as::<_, (String, i64)>(
            "SELECT event_type, SUM(points) FROM points_events
             WHERE user_id = ? AND timestamp >= ? GROUP BY event_type",
        )
        .bind(user_id)
        .bind(Utc::now() - Duration::days(30))
        .fetch_all(&self.db_pool)
        .await?
        .into_iter()
        .collect();

        let mut badges_by_category: BTreeMap<String, i64> = BTreeMap::new();
        for badge in view.badges_earned.iter().filter_map(|id| badges::find(id)) {
            *badges_by_category.entry(badge.category.to_string()).or_insert(0) += 1;
        }

        Ok(Some(UserStats {
            badges_count: view.badges_earned.len(),
            achievements_count: view.badges_earned.len(),
            profile: view.profile,
            monthly_stats,
            badges_by_category,
        }))
    }

    pub async fn profile_count(&self) -> Result<i64, QhseError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM gamification_profiles")
            .fetch_one(&self.db_pool)
            .await?;
        Ok(count)
    }
}

fn user_entry(index: usize, (user_id, username, points, level, rank_name): (i64, String, i64, i64, String)) -> LeaderboardEntry {
    LeaderboardEntry {
        rank: index + 1,
        user_id: Some(user_id),
        username: Some(username),
        team_id: None,
        name: None,
        points,
        level: Some(level),
        rank_name: Some(rank_name),
    }
}
