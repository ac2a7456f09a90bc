//! Request handlers

pub mod health;
pub mod webhooks;
pub mod orders;
pub mod payments;
pub mod settlements;
pub mod riders;
pub mod uploads;

use chrono::{NaiveDate, Utc};

use crate::AppState;

/// Today's business date in the configured timezone
pub(crate) fn today(state: &AppState) -> NaiveDate {
    state.config.timezone.business_date(Utc::now())
}
