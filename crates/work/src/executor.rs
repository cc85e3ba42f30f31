use async_trait::async_trait;

use assessly_core::ReportId;

use crate::outcome::{WorkError, WorkOutput};
use crate::task::WorkTask;

/// Executes exactly one item of a bulk job.
///
/// Implementations perform the expensive part (AI inference, document rendering) and
/// are the only place a job suspends. They report failure through [`WorkError`]; the
/// runner additionally guards against panics and hangs, so implementations need not.
#[async_trait]
pub trait WorkExecutor: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn execute(&self, report_id: ReportId, task: &WorkTask) -> Result<WorkOutput, WorkError>;
}
