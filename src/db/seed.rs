// Reference data and demo dataset

use crate::auth::password::PasswordHash;
use crate::core::errors::QhseError;
use crate::core::models::Severity;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use secrecy::Secret;
use sqlx::SqlitePool;
use tracing::info;

/// (name, description, risk_level)
pub const SECTORS: [(&str, &str, &str); 7] = [
    ("Industrie", "Secteur industriel avec risques mécaniques et chimiques", "high"),
    ("BTP", "Bâtiment et Travaux Publics - risques de chute et TMS", "high"),
    ("Agroalimentaire", "Production alimentaire - risques biologiques et chimiques", "medium"),
    ("Transport", "Transport et logistique - risques routiers et manutention", "medium"),
    ("Santé", "Santé et services sociaux - risques biologiques et ergonomiques", "medium"),
    ("Commerce", "Commerce et distribution - risques de manutention", "low"),
    ("Bureaux", "Travail de bureau - risques ergonomiques", "low"),
];

/// (name, category, severity_weight, description)
pub const INCIDENT_TYPES: [(&str, &str, i64, &str); 12] = [
    ("Chute de plain-pied", "physical", 3, "Chute sur le même niveau"),
    ("Chute de hauteur", "physical", 5, "Chute depuis une hauteur > 1m"),
    ("Incendie", "physical", 5, "Départ de feu ou explosion"),
    ("Électrocution", "physical", 4, "Contact avec courant électrique"),
    ("Coupure", "physical", 2, "Blessure par outil tranchant"),
    ("TMS", "ergonomic", 3, "Trouble musculo-squelettique"),
    ("Inhalation", "chemical", 4, "Inhalation de substances toxiques"),
    ("Contact chimique", "chemical", 3, "Contact cutané avec produits chimiques"),
    ("Stress", "psychosocial", 2, "Stress au travail"),
    ("Harcèlement", "psychosocial", 4, "Harcèlement moral ou sexuel"),
    ("Accident de trajet", "physical", 3, "Accident sur le trajet domicile-travail"),
    ("Autre", "other", 1, "Autre type d'incident"),
];

/// (code, name, compliance_rate, status)
pub const REGULATIONS: [(&str, &str, f64, &str); 4] = [
    ("ISO_45001", "Santé et sécurité au travail", 92.0, "conforme"),
    ("RGPD", "Protection des données personnelles", 88.0, "conforme"),
    ("Code_Travail", "Code du travail", 95.0, "conforme"),
    ("REACH", "Enregistrement des substances chimiques", 75.0, "non_conforme"),
];

/// (id, name, sensor_type, location, zone)
const DEFAULT_SENSORS: [(&str, &str, &str, &str, &str); 5] = [
    ("temp_001", "Température atelier", "temperature", "Atelier principal", "Production"),
    ("hum_001", "Humidité entrepôt", "humidity", "Entrepôt", "Logistique"),
    ("noise_001", "Bruit zone de production", "noise", "Zone de production", "Production"),
    ("gas_001", "Détecteur de gaz laboratoire", "gas", "Laboratoire", "R&D"),
    ("air_001", "Qualité de l'air bureaux", "air_quality", "Bureau 1er étage", "Administration"),
];

const NOTIFICATION_CHANNELS: [&str; 4] = ["email", "sms", "slack", "in_app"];

const DEMO_TITLES: [&str; 4] = [
    "Incident {severity} dans le secteur {sector}",
    "Rapport d'urgence - {severity}",
    "Signalement {severity} - Action requise",
    "Incident {severity} - Investigation en cours",
];

const DEMO_DESCRIPTIONS: [&str; 5] = [
    "Incident signalé par un employé. Investigation en cours.",
    "Situation nécessitant une intervention immédiate.",
    "Risque identifié nécessitant des mesures correctives.",
    "Incident mineur mais nécessitant un suivi.",
    "Situation critique nécessitant une action urgente.",
];

const DEMO_LOCATIONS: [&str; 12] = [
    "Atelier principal", "Bureau 1er étage", "Chantier A", "Laboratoire",
    "Entrepôt", "Zone de production", "Parking", "Salle de réunion",
    "Cuisine", "Couloir principal", "Escalier", "Ascenseur",
];

const DEMO_RECOMMENDATIONS: [&str; 5] = [
    "Formation supplémentaire recommandée pour l'équipe concernée.",
    "Mise en place d'EPI supplémentaires nécessaire.",
    "Révision des procédures de sécurité requise.",
    "Inspection approfondie de l'équipement recommandée.",
    "Sensibilisation des employés à ce type de risque nécessaire.",
];

/// (action_type, description, priority, status)
const DEMO_ACTIONS: [(&str, &str, &str, &str); 5] = [
    ("Formation sécurité", "Organiser une session de formation pour l'équipe concernée", "high", "pending"),
    ("Inspection équipement", "Vérifier et réparer l'équipement défaillant", "urgent", "in_progress"),
    ("Mise à jour procédures", "Réviser les procédures de sécurité existantes", "medium", "pending"),
    ("Installation EPI", "Installer de nouveaux équipements de protection", "high", "pending"),
    ("Sensibilisation", "Lancer une campagne de sensibilisation", "low", "completed"),
];

/// Insert reference rows that every installation needs; safe to call repeatedly
pub async fn seed_reference_data(pool: &SqlitePool, admin_password: &Secret<String>) -> Result<(), QhseError> {
    let now = Utc::now();

    for (name, description, risk_level) in SECTORS {
        sqlx::query("INSERT OR IGNORE INTO sectors (name, description, risk_level) VALUES (?, ?, ?)")
            .bind(name)
            .bind(description)
            .bind(risk_level)
            .execute(pool)
            .await?;
    }

    for (name, category, weight, description) in INCIDENT_TYPES {
        sqlx::query(
            "INSERT OR IGNORE INTO incident_types (name, category, severity_weight, description) VALUES (?, ?, ?, ?)"
        )
        .bind(name)
        .bind(category)
        .bind(weight)
        .bind(description)
        .execute(pool)
        .await?;
    }

    let admin_exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = 'admin'")
        .fetch_one(pool)
        .await?;
    if admin_exists == 0 {
        sqlx::query(
            "INSERT INTO users (username, email, password_hash, role, created_at) VALUES (?, ?, ?, ?, ?)"
        )
        .bind("admin")
        .bind("admin@qhse.com")
        .bind(PasswordHash::generate(admin_password).as_str())
        .bind("admin")
        .bind(now)
        .execute(pool)
        .await?;
        info!("Default admin account created");
    }

    for (code, name, rate, status) in REGULATIONS {
        sqlx::query(
            "INSERT OR IGNORE INTO regulations (code, name, compliance_rate, status, last_review) VALUES (?, ?, ?, ?, ?)"
        )
        .bind(code)
        .bind(name)
        .bind(rate)
        .bind(status)
        .bind(now)
        .execute(pool)
        .await?;
    }

    for (id, name, sensor_type, location, zone) in DEFAULT_SENSORS {
        sqlx::query(
            "INSERT OR IGNORE INTO iot_sensors (id, name, sensor_type, location, zone, status, created_at)
             VALUES (?, ?, ?, ?, ?, 'active', ?)"
        )
        .bind(id)
        .bind(name)
        .bind(sensor_type)
        .bind(location)
        .bind(zone)
        .bind(now)
        .execute(pool)
        .await?;
    }

    for channel in NOTIFICATION_CHANNELS {
        sqlx::query("INSERT OR IGNORE INTO notification_channels (channel, enabled, updated_at) VALUES (?, 1, ?)")
            .bind(channel)
            .bind(now)
            .execute(pool)
            .await?;
    }

    Ok(())
}

struct DemoIncident {
    sector_id: i64,
    sector_name: String,
    incident_type_id: i64,
    title: String,
    description: &'static str,
    location: &'static str,
    date: NaiveDate,
    time: NaiveTime,
    severity: Severity,
    probability: f64,
    risk_score: f64,
    status: &'static str,
    recommendation: &'static str,
}

/// Pick a severity with weights low 20, medium 15, high 10, critical 5
fn demo_severity<R: Rng>(rng: &mut R) -> Severity {
    match rng.gen_range(0..50) {
        0..=19 => Severity::Low,
        20..=34 => Severity::Medium,
        35..=44 => Severity::High,
        _ => Severity::Critical,
    }
}

/// Pick a status with weights open 10, in_progress 15, resolved 20, closed 5
fn demo_status<R: Rng>(rng: &mut R) -> &'static str {
    match rng.gen_range(0..50) {
        0..=9 => "open",
        10..=24 => "in_progress",
        25..=44 => "resolved",
        _ => "closed",
    }
}

/// Probability range for each severity band
pub fn demo_probability<R: Rng>(rng: &mut R, severity: Severity) -> f64 {
    match severity {
        Severity::Low => rng.gen_range(0.1..0.3),
        Severity::Medium => rng.gen_range(0.3..0.6),
        Severity::High => rng.gen_range(0.6..0.8),
        Severity::Critical => rng.gen_range(0.8..=1.0),
    }
}

fn plan_demo_incidents(
    sectors: &[(i64, String)],
    types: &[(i64, i64)],
    count: usize,
    today: NaiveDate,
) -> Vec<DemoIncident> {
    let mut rng = rand::thread_rng();
    let start = today - Duration::days(180);
    let mut planned = Vec::with_capacity(count);

    for _ in 0..count {
        let (Some((sector_id, sector_name)), Some((type_id, weight))) = (sectors.choose(&mut rng), types.choose(&mut rng)) else {
            break;
        };
        let severity = demo_severity(&mut rng);
        let probability = demo_probability(&mut rng, severity);
        let time = NaiveTime::from_hms_opt(rng.gen_range(6..=18), rng.gen_range(0..60), 0).unwrap_or_default();
        let title = DEMO_TITLES
            .choose(&mut rng)
            .copied()
            .unwrap_or(DEMO_TITLES[0])
            .replace("{severity}", severity.as_str())
            .replace("{sector}", sector_name);

        planned.push(DemoIncident {
            sector_id: *sector_id,
            sector_name: sector_name.clone(),
            incident_type_id: *type_id,
            title,
            description: DEMO_DESCRIPTIONS.choose(&mut rng).copied().unwrap_or(DEMO_DESCRIPTIONS[0]),
            location: DEMO_LOCATIONS.choose(&mut rng).copied().unwrap_or(DEMO_LOCATIONS[0]),
            date: start + Duration::days(rng.gen_range(0..=180)),
            time,
            severity,
            probability,
            risk_score: probability * (*weight as f64),
            status: demo_status(&mut rng),
            recommendation: DEMO_RECOMMENDATIONS.choose(&mut rng).copied().unwrap_or(DEMO_RECOMMENDATIONS[0]),
        });
    }

    planned
}

/// Insert demo incidents and corrective actions when the database has no incidents
pub async fn seed_demo_data(pool: &SqlitePool) -> Result<(), QhseError> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incident_reports")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    let sectors = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM sectors ORDER BY id")
        .fetch_all(pool)
        .await?;
    let types = sqlx::query_as::<_, (i64, i64)>("SELECT id, severity_weight FROM incident_types ORDER BY id")
        .fetch_all(pool)
        .await?;
    let admin_id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = 'admin'")
        .fetch_optional(pool)
        .await?;

    let planned = plan_demo_incidents(&sectors, &types, 50, Utc::now().date_naive());

    for incident in &planned {
        let created_at: DateTime<Utc> = Utc.from_utc_datetime(&incident.date.and_time(incident.time));
        sqlx::query(
            "INSERT INTO incident_reports
             (sector_id, incident_type_id, title, description, location, date_incident, time_incident,
              severity_level, probability_score, risk_score, status, ai_recommendations, reported_by,
              created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(incident.sector_id)
        .bind(incident.incident_type_id)
        .bind(&incident.title)
        .bind(incident.description)
        .bind(incident.location)
        .bind(incident.date)
        .bind(incident.time.format("%H:%M").to_string())
        .bind(incident.severity.as_str())
        .bind(incident.probability)
        .bind(incident.risk_score)
        .bind(incident.status)
        .bind(incident.recommendation)
        .bind(admin_id)
        .bind(created_at)
        .bind(created_at)
        .execute(pool)
        .await?;
    }

    let high_risk: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM incident_reports WHERE severity_level IN ('high', 'critical') ORDER BY id LIMIT 10"
    )
    .fetch_all(pool)
    .await?;

    let actions: Vec<_> = {
        let mut rng = rand::thread_rng();
        high_risk
            .iter()
            .map(|id| {
                let action = DEMO_ACTIONS.choose(&mut rng).copied().unwrap_or(DEMO_ACTIONS[0]);
                let due = Utc::now().date_naive() + Duration::days(rng.gen_range(1..=30));
                (*id, action, due)
            })
            .collect()
    };

    for (incident_id, (action_type, description, priority, status), due) in actions {
        sqlx::query(
            "INSERT INTO corrective_actions (incident_id, action_type, description, priority, status, due_date, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(incident_id)
        .bind(action_type)
        .bind(description)
        .bind(priority)
        .bind(status)
        .bind(due)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    }

    info!(
        incidents = planned.len(),
        sectors = planned.iter().map(|i| i.sector_name.as_str()).collect::<std::collections::HashSet<_>>().len(),
        corrective_actions = high_risk.len(),
        "Demo data seeded"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probability_ranges_follow_severity() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let p = demo_probability(&mut rng, Severity::Low);
            assert!((0.1..0.3).contains(&p));
            let p = demo_probability(&mut rng, Severity::Critical);
            assert!((0.8..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_plan_demo_incidents() {
        let sectors = vec![(1, "Industrie".to_string()), (2, "BTP".to_string())];
        let types = vec![(1, 3), (2, 5)];
        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let planned = plan_demo_incidents(&sectors, &types, 50, today);

        assert_eq!(planned.len(), 50);
        for incident in &planned {
            assert!(incident.date <= today);
            assert!(incident.date >= today - Duration::days(180));
            assert!(incident.time.format("%H").to_string().parse::<u32>().unwrap() <= 18);
            assert!(incident.risk_score <= incident.probability * 5.0 + 1e-9);
            assert!(!incident.title.contains('{'));
        }
    }

    #[test]
    fn test_plan_with_no_reference_data_is_empty() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert!(plan_demo_incidents(&[], &[(1, 3)], 10, today).is_empty());
    }
}
