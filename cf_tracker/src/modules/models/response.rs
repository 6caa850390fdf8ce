use cf_tracker_libs::rating::RatingPoint;
use cf_tracker_libs::scheduler::JobStatus;
use cf_tracker_libs::service::StageReport;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl ToString) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub jobs: Vec<JobStatus>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ForceSyncResponse {
    pub success: bool,
    pub stages: Vec<StageReport>,
}

impl From<Vec<StageReport>> for ForceSyncResponse {
    fn from(stages: Vec<StageReport>) -> Self {
        Self {
            success: stages.iter().all(|stage| stage.success),
            stages,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionResponse {
    pub handle: String,
    pub days: Option<i64>,
    pub anchored_to_current: bool,
    pub points: Vec<RatingPoint>,
}

#[derive(Debug, Serialize)]
pub struct ReminderCountResponse {
    pub handle: String,
    pub count: i64,
}
