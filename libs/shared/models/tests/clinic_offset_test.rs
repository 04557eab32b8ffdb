// Own test binary: the clinic offset is process-wide and set once.
use chrono::{FixedOffset, NaiveDate, Timelike};
use serde_json::json;

use shared_models::time::{clinic_offset, set_clinic_offset};
use shared_models::Timestamp;

#[test]
fn test_values_without_offset_use_clinic_time() {
    let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
    set_clinic_offset(plus_two);
    assert_eq!(clinic_offset(), plus_two);

    // 2024-04-30T23:30:00Z
    let millis: Timestamp = serde_json::from_value(json!(1_714_519_800_000i64)).unwrap();
    let parts: Timestamp =
        serde_json::from_value(json!({ "seconds": 1_714_519_800i64, "nanoseconds": 0 })).unwrap();
    assert_eq!(millis.date(), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    assert_eq!(parts.date(), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    assert_eq!(millis.local().hour(), 1);

    let naive: Timestamp = serde_json::from_value(json!("2024-05-01 00:15:00")).unwrap();
    assert_eq!(naive.date(), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    assert_eq!(naive.as_datetime().hour(), 22);

    let day = Timestamp::from_date(NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());
    assert_eq!(day.date(), NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());
    assert_eq!(serde_json::to_value(day).unwrap(), json!("2024-05-31T00:00:00.000+02:00"));
}
