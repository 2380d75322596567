// Supplier QHSE evaluation

pub mod manager;

pub use manager::{
    AuditResult, AuditSchedule, IncidentOutcome, NewSupplier, OverdueAudit, RiskAssessment, Supplier,
    SupplierAudit, SupplierIncidentReport, SupplierManager, SupplierStatistics, RISK_LEVELS, SUPPLIER_STATUSES,
};
