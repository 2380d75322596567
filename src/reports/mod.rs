// QHSE report catalog and generation

pub mod catalog;
pub mod generator;

pub use catalog::{catalog, ReportDescriptor, ReportKind};
pub use generator::{Report, ReportGenerator, ReportPeriod};
