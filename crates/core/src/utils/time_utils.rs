use chrono::{DateTime, NaiveDate, Utc};

/// Accrual date for an instant. Interest periods are UTC calendar days.
pub fn accrual_date_from_utc(instant: DateTime<Utc>) -> NaiveDate {
    instant.date_naive()
}

/// Convenience for `accrual_date_from_utc(Utc::now())`.
pub fn accrual_date_today() -> NaiveDate {
    accrual_date_from_utc(Utc::now())
}
