// Safety equipment and inspection scheduling

pub mod register;

pub use register::{
    CategoryStats, Equipment, EquipmentRegister, InspectionDue, InspectionRecord, NewEquipment, NewInspection,
};
