use cf_tracker_libs::scheduler::parse_cron;
use cf_tracker_libs::service::ScheduleUpdate;
use serde::Deserialize;
use validator::{Validate, ValidationError};

fn validate_cron(value: &str) -> Result<(), ValidationError> {
    match parse_cron(value) {
        Ok(_) => Ok(()),
        Err(_) => Err(ValidationError::new("invalid cron expression")),
    }
}

#[derive(Debug, Default, Deserialize, Validate, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    #[validate(custom = "validate_cron")]
    pub sync_cron: Option<String>,
    #[validate(custom = "validate_cron")]
    pub inactivity_cron: Option<String>,
    #[validate(custom = "validate_cron")]
    pub catalog_cron: Option<String>,
}

impl From<ScheduleRequest> for ScheduleUpdate {
    fn from(request: ScheduleRequest) -> Self {
        ScheduleUpdate {
            sync_cron: request.sync_cron,
            inactivity_cron: request.inactivity_cron,
            catalog_cron: request.catalog_cron,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate, PartialEq, Eq)]
pub struct ProgressionQuery {
    #[validate(range(min = 1, max = 3650))]
    pub days: Option<i64>,
}
