// Equipment register and periodic inspections

use crate::core::errors::QhseError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::{info, warn};

pub const STATUSES: [&str; 4] = ["active", "maintenance", "out_of_service", "retired"];
pub const RESULTS: [&str; 3] = ["passed", "conditional", "failed"];

/// Failed equipment is re-inspected within this many days
pub const REINSPECTION_DAYS: i64 = 7;
pub const MAX_INTERVAL_DAYS: i64 = 3650;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Equipment {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub location: String,
    pub sector_id: Option<i64>,
    pub status: String,
    pub inspection_interval_days: i64,
    pub last_inspection: Option<DateTime<Utc>>,
    pub next_inspection: DateTime<Utc>,
    pub inspection_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEquipment {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub location: String,
    pub sector_id: Option<i64>,
    pub inspection_interval_days: i64,
    /// Defaults to one interval from now
    pub next_inspection: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInspection {
    pub inspection_type: String,
    pub result: String,
    #[serde(default)]
    pub notes: String,
    pub inspection_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InspectionRecord {
    pub id: i64,
    pub equipment_id: i64,
    pub inspector_id: i64,
    pub inspection_type: String,
    pub result: String,
    pub notes: String,
    pub inspection_date: DateTime<Utc>,
    pub next_inspection: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InspectionDue {
    pub equipment_id: i64,
    pub name: String,
    pub category: String,
    pub location: String,
    pub status: String,
    pub next_inspection: DateTime<Utc>,
    #[sqlx(skip)]
    pub days_left: i64,
    #[sqlx(skip)]
    pub overdue: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CategoryStats {
    pub category: String,
    pub count: i64,
    pub active: i64,
    pub overdue: i64,
}

const EQUIPMENT_COLUMNS: &str = "e.id, e.name, e.category, e.location, e.sector_id, e.status,
     e.inspection_interval_days, e.last_inspection, e.next_inspection,
     (SELECT COUNT(*) FROM equipment_inspections i WHERE i.equipment_id = e.id) AS inspection_count, e.created_at";

/// Next due date after an inspection on `date`
pub fn next_inspection_after(date: DateTime<Utc>, interval_days: i64, result: &str) -> DateTime<Utc> {
    let days = if result == "failed" {
        interval_days.min(REINSPECTION_DAYS)
    } else {
        interval_days
    };
    date + Duration::days(days)
}

/// Equipment status implied by an inspection result
pub fn status_after(result: &str) -> &'static str {
    if result == "failed" {
        "out_of_service"
    } else {
        "active"
    }
}

#[derive(Clone)]
pub struct EquipmentRegister {
    db_pool: SqlitePool,
}

impl EquipmentRegister {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn list(&self) -> Result<Vec<Equipment>, QhseError> {
        let rows = sqlx::query_as::<_, Equipment>(&format!(
            "SELECT {} FROM equipment e ORDER BY e.name, e.id",
            EQUIPMENT_COLUMNS
        ))
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Equipment>, QhseError> {
        let row = sqlx::query_as::<_, Equipment>(&format!("SELECT {} FROM equipment e WHERE e.id = ?", EQUIPMENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(row)
    }

    async fn require(&self, id: i64) -> Result<Equipment, QhseError> {
        self.get(id)
            .await?
            .ok_or_else(|| QhseError::NotFound(format!("Equipment {}", id)))
    }

    pub async fn create(&self, equipment: &NewEquipment) -> Result<Equipment, QhseError> {
        if equipment.name.trim().is_empty() || equipment.category.trim().is_empty() {
            return Err(QhseError::Validation("name and category are required".to_string()));
        }
        if !(1..=MAX_INTERVAL_DAYS).contains(&equipment.inspection_interval_days) {
            return Err(QhseError::Validation(format!(
                "inspection_interval_days must be between 1 and {}",
                MAX_INTERVAL_DAYS
            )));
        }

        let now = Utc::now();
        let next = equipment
            .next_inspection
            .unwrap_or(now + Duration::days(equipment.inspection_interval_days));
        let id = sqlx::query(
            "INSERT INTO equipment (name, category, location, sector_id, status, inspection_interval_days,
              next_inspection, created_at)
             VALUES (?, ?, ?, ?, 'active', ?, ?, ?)",
        )
        .bind(equipment.name.trim())
        .bind(equipment.category.trim())
        .bind(&equipment.location)
        .bind(equipment.sector_id)
        .bind(equipment.inspection_interval_days)
        .bind(next)
        .bind(now)
        .execute(&self.db_pool)
        .await?
        .last_insert_rowid();

        info!(equipment_id = id, category = %equipment.category, next_inspection = %next, "Equipment registered");
        self.require(id).await
    }

    /// Store the inspection and move the equipment's schedule in one transaction
    pub async fn record_inspection(
        &self,
        equipment_id: i64,
        inspector_id: i64,
        inspection: &NewInspection,
    ) -> Result<InspectionRecord, QhseError> {
        if !RESULTS.contains(&inspection.result.as_str()) {
            return Err(QhseError::Validation(format!("Unknown inspection result '{}'", inspection.result)));
        }
        if inspection.inspection_type.trim().is_empty() {
            return Err(QhseError::Validation("inspection_type is required".to_string()));
        }
        let now = Utc::now();
        let date = inspection.inspection_date.unwrap_or(now);
        if date > now {
            return Err(QhseError::Validation("inspection_date must not be in the future".to_string()));
        }

        let equipment = self.require(equipment_id).await?;
        if equipment.status == "retired" {
            return Err(QhseError::Conflict(format!("Equipment {} is retired", equipment_id)));
        }
        let next = next_inspection_after(date, equipment.inspection_interval_days, &inspection.result);
        let status = status_after(&inspection.result);

        let mut tx = self.db_pool.begin().await?;
        let id = sqlx::query(
            "INSERT INTO equipment_inspections (equipment_id, inspector_id, inspection_type, result, notes,
              inspection_date, next_inspection)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(equipment_id)
        .bind(inspector_id)
        .bind(inspection.inspection_type.trim())
        .bind(&inspection.result)
        .bind(&inspection.notes)
        .bind(date)
        .bind(next)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        // A late entry for an older inspection never rolls the schedule back
        sqlx::query(
            "UPDATE equipment SET status = ?, last_inspection = ?, next_inspection = ?
             WHERE id = ? AND (last_inspection IS NULL OR last_inspection <= ?)",
        )
        .bind(status)
        .bind(date)
        .bind(next)
        .bind(equipment_id)
        .bind(date)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        if inspection.result == "failed" {
            warn!(equipment_id, inspection_id = id, "Equipment failed inspection");
        } else {
            info!(equipment_id, inspection_id = id, result = %inspection.result, "Equipment inspected");
        }
        Ok(InspectionRecord {
            id,
            equipment_id,
            inspector_id,
            inspection_type: inspection.inspection_type.trim().to_string(),
            result: inspection.result.clone(),
            notes: inspection.notes.clone(),
            inspection_date: date,
            next_inspection: next,
        })
    }

    /// Inspection history, newest first
    pub async fn inspections(&self, equipment_id: i64) -> Result<Vec<InspectionRecord>, QhseError> {
        self.require(equipment_id).await?;
        let rows = sqlx::query_as::<_, InspectionRecord>(
            "SELECT id, equipment_id, inspector_id, inspection_type, result, notes, inspection_date, next_inspection
             FROM equipment_inspections WHERE equipment_id = ? ORDER BY inspection_date DESC, id DESC",
        )
        .bind(equipment_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    /// Equipment in service due for inspection within `days`, overdue first
    pub async fn due_within(&self, days: i64) -> Result<Vec<InspectionDue>, QhseError> {
        let now = Utc::now();
        let mut rows = sqlx::query_as::<_, InspectionDue>(
            "SELECT id AS equipment_id, name, category, location, status, next_inspection
             FROM equipment WHERE status != 'retired' AND next_inspection <= ?
             ORDER BY next_inspection ASC",
        )
        .bind(now + Duration::days(days.max(0)))
        .fetch_all(&self.db_pool)
        .await?;
        for due in rows.iter_mut() {
            due.overdue = due.next_inspection <= now;
            due.days_left = (due.next_inspection - now).num_days();
        }
        Ok(rows)
    }

    pub async fn overdue(&self) -> Result<Vec<InspectionDue>, QhseError> {
        self.due_within(0).await
    }

    pub async fn category_stats(&self) -> Result<Vec<CategoryStats>, QhseError> {
        let rows = sqlx::query_as::<_, CategoryStats>(
            "SELECT category, COUNT(*) AS count,
                    COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0) AS active,
                    COALESCE(SUM(CASE WHEN status != 'retired' AND next_inspection <= ? THEN 1 ELSE 0 END), 0) AS overdue
             FROM equipment GROUP BY category ORDER BY category",
        )
        .bind(Utc::now())
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows)
    }

    pub async fn update_status(&self, equipment_id: i64, status: &str) -> Result<Equipment, QhseError> {
        if !STATUSES.contains(&status) {
            return Err(QhseError::Validation(format!("Unknown equipment status '{}'", status)));
        }
        let result = sqlx::query("UPDATE equipment SET status = ? WHERE id = ?")
            .bind(status)
            .bind(equipment_id)
            .execute(&self.db_pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(QhseError::NotFound(format!("Equipment {}", equipment_id)));
        }
        info!(equipment_id, status, "Equipment status updated");
        self.require(equipment_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn register() -> EquipmentRegister {
        EquipmentRegister::new(db::connect_in_memory().await.unwrap())
    }

    fn extinguisher(interval: i64, next: Option<DateTime<Utc>>) -> NewEquipment {
        NewEquipment {
            name: "Extincteur CO2 atelier".to_string(),
            category: "incendie".to_string(),
            location: "Atelier B".to_string(),
            sector_id: None,
            inspection_interval_days: interval,
            next_inspection: next,
        }
    }

    fn inspection(result: &str, date: Option<DateTime<Utc>>) -> NewInspection {
        NewInspection {
            inspection_type: "annuelle".to_string(),
            result: result.to_string(),
            notes: String::new(),
            inspection_date: date,
        }
    }

    #[test]
    fn test_failed_inspection_shortens_interval() {
        let date = Utc::now();
        assert_eq!(next_inspection_after(date, 365, "passed"), date + Duration::days(365));
        assert_eq!(next_inspection_after(date, 365, "failed"), date + Duration::days(7));
        assert_eq!(next_inspection_after(date, 3, "failed"), date + Duration::days(3));
        assert_eq!(status_after("conditional"), "active");
        assert_eq!(status_after("failed"), "out_of_service");
    }

    #[tokio::test]
    async fn test_create_defaults_schedule() {
        let register = register().await;
        let before = Utc::now();
        let created = register.create(&extinguisher(180, None)).await.unwrap();
        assert_eq!(created.status, "active");
        assert_eq!(created.inspection_count, 0);
        assert!(created.last_inspection.is_none());
        assert!(created.next_inspection >= before + Duration::days(180));

        assert!(matches!(register.create(&extinguisher(0, None)).await, Err(QhseError::Validation(_))));
        let mut unnamed = extinguisher(30, None);
        unnamed.name = "  ".to_string();
        assert!(matches!(register.create(&unnamed).await, Err(QhseError::Validation(_))));
    }

    #[tokio::test]
    async fn test_inspection_moves_schedule() {
        let register = register().await;
        let overdue = register
            .create(&extinguisher(365, Some(Utc::now() - Duration::days(3))))
            .await
            .unwrap();
        assert_eq!(register.overdue().await.unwrap().len(), 1);

        let record = register
            .record_inspection(overdue.id, 1, &inspection("passed", None))
            .await
            .unwrap();
        assert!(record.next_inspection > Utc::now() + Duration::days(364));

        let updated = register.get(overdue.id).await.unwrap().unwrap();
        assert_eq!(updated.inspection_count, 1);
        assert_eq!(updated.last_inspection, Some(record.inspection_date));
        assert!(register.overdue().await.unwrap().is_empty());

        let failed = register
            .record_inspection(overdue.id, 1, &inspection("failed", None))
            .await
            .unwrap();
        let updated = register.get(overdue.id).await.unwrap().unwrap();
        assert_eq!(updated.status, "out_of_service");
        assert_eq!(updated.next_inspection, failed.next_inspection);
        assert_eq!(register.due_within(7).await.unwrap().len(), 1);
        assert_eq!(register.inspections(overdue.id).await.unwrap()[0].result, "failed");
    }

    #[tokio::test]
    async fn test_backfilled_inspection_keeps_latest_schedule() {
        let register = register().await;
        let equipment = register.create(&extinguisher(30, None)).await.unwrap();
        let latest = register
            .record_inspection(equipment.id, 1, &inspection("passed", None))
            .await
            .unwrap();
        register
            .record_inspection(equipment.id, 1, &inspection("failed", Some(Utc::now() - Duration::days(60))))
            .await
            .unwrap();

        let current = register.get(equipment.id).await.unwrap().unwrap();
        assert_eq!(current.status, "active");
        assert_eq!(current.next_inspection, latest.next_inspection);
        assert_eq!(current.inspection_count, 2);
    }

    #[tokio::test]
    async fn test_inspection_rejections() {
        let register = register().await;
        let equipment = register.create(&extinguisher(30, None)).await.unwrap();

        let unknown = register.record_inspection(equipment.id, 1, &inspection("maybe", None)).await;
        assert!(matches!(unknown, Err(QhseError::Validation(_))));
        let future = register
            .record_inspection(equipment.id, 1, &inspection("passed", Some(Utc::now() + Duration::days(1))))
            .await;
        assert!(matches!(future, Err(QhseError::Validation(_))));
        let missing = register.record_inspection(999, 1, &inspection("passed", None)).await;
        assert!(matches!(missing, Err(QhseError::NotFound(_))));

        register.update_status(equipment.id, "retired").await.unwrap();
        let retired = register.record_inspection(equipment.id, 1, &inspection("passed", None)).await;
        assert!(matches!(retired, Err(QhseError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_retired_equipment_is_never_due() {
        let register = register().await;
        let late = register
            .create(&extinguisher(30, Some(Utc::now() - Duration::days(1))))
            .await
            .unwrap();
        register
            .create(&NewEquipment {
                category: "levage".to_string(),
                ..extinguisher(30, Some(Utc::now() + Duration::days(10)))
            })
            .await
            .unwrap();

        let due = register.due_within(30).await.unwrap();
        assert_eq!(due.len(), 2);
        assert!(due[0].overdue);
        assert!(!due[1].overdue);
        assert!(due[1].days_left >= 9);

        let stats = register.category_stats().await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].category, "incendie");
        assert_eq!(stats[0].overdue, 1);
        assert_eq!(stats[1].overdue, 0);

        register.update_status(late.id, "retired").await.unwrap();
        assert_eq!(register.due_within(30).await.unwrap().len(), 1);
        assert!(register.overdue().await.unwrap().is_empty());
        assert!(matches!(register.update_status(late.id, "lost").await, Err(QhseError::Validation(_))));
    }
}
