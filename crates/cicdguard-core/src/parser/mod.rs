pub mod workflow;

pub use workflow::{WorkflowDoc, WorkflowJob, WorkflowParser, WorkflowStep};
