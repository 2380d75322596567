// Template-driven approval workflows

pub mod engine;
pub mod templates;

pub use engine::{
    NewWorkflow, StepAction, StepOutcome, Workflow, WorkflowDetail, WorkflowEngine, WorkflowMetrics, WorkflowStep,
};
pub use templates::{WorkflowTemplate, ESCALATION_LEVELS, PRIORITIES, WORKFLOW_TEMPLATES};
