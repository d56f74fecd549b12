use chrono::NaiveDate;
use contract_progress::validation::{
    validate_payment_stages, validate_schedule_groups, validate_week_update,
};
use contract_progress::{
    DurationDays, MonthKey, PaymentStage, Percentage, WeekEntry, WeekUpdate, generate_schedule,
};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn percentage_accepts_zero_to_hundred() {
    assert_eq!(Percentage::new(0.0).unwrap().value(), 0.0);
    assert_eq!(Percentage::new(100.0).unwrap().value(), 100.0);
    for bad in [-0.5, 100.5, f64::NAN, f64::INFINITY] {
        assert!(Percentage::new(bad).is_err(), "{bad}");
    }
    assert!(serde_json::from_str::<Percentage>("120.0").is_err());
    assert_eq!(serde_json::from_str::<Percentage>("42.5").unwrap().value(), 42.5);
}

#[test]
fn duration_days_rejects_negatives() {
    assert_eq!(DurationDays::new(0).unwrap().get(), 0);
    assert!(DurationDays::new(-1).is_err());
    assert!(serde_json::from_str::<DurationDays>("-7").is_err());
}

#[test]
fn week_update_requires_a_value_in_range() {
    assert!(validate_week_update(&WeekUpdate::default()).is_err());
    assert!(validate_week_update(&WeekUpdate::both(10.0, 100.0)).is_ok());
    let err = validate_week_update(&WeekUpdate::realisasi(101.0)).unwrap_err();
    assert!(err.message().starts_with("realisasi"));
}

#[test]
fn payment_stages_must_not_exceed_hundred_percent() {
    let ok = vec![PaymentStage::new("uang_muka", 20.0), PaymentStage::new("termin_1", 80.0)];
    assert!(validate_payment_stages(&ok).is_ok());

    let over = vec![PaymentStage::new("uang_muka", 30.0), PaymentStage::new("termin_1", 80.0)];
    let err = validate_payment_stages(&over).unwrap_err();
    assert!(err.message().contains("exceeds 100%"));

    let duplicate = vec![PaymentStage::new("termin_1", 10.0), PaymentStage::new("termin_1", 10.0)];
    assert!(validate_payment_stages(&duplicate).is_err());
    assert!(validate_payment_stages(&[PaymentStage::new(" ", 10.0)]).is_err());
}

#[test]
fn generated_schedules_pass_validation() {
    for (start, days) in [(d(2024, 1, 15), 20), (d(2024, 4, 28), 10), (d(2024, 12, 1), 400)] {
        let groups = generate_schedule(start, days).unwrap();
        validate_schedule_groups(start, days, &groups).unwrap();
    }
    validate_schedule_groups(d(2024, 1, 1), 0, &[]).unwrap();
}

#[test]
fn validation_detects_broken_schedules() {
    let start = d(2024, 1, 15);
    let groups = generate_schedule(start, 20).unwrap();

    let mut gap = groups.clone();
    gap[0].items.remove(1);
    let err = validate_schedule_groups(start, 20, &gap).unwrap_err();
    assert!(err.message().contains("numbered") || err.message().contains("starts"));

    let mut renumbered = groups.clone();
    renumbered[1].items[0].week = 2;
    assert!(validate_schedule_groups(start, 20, &renumbered).is_err());

    let mut short = groups.clone();
    short.pop();
    let err = validate_schedule_groups(start, 20, &short).unwrap_err();
    assert!(err.message().contains("contract ends"));

    assert!(validate_schedule_groups(start, 21, &groups).is_err());
    assert!(validate_schedule_groups(start, 0, &groups).is_err());
}

#[test]
fn validation_rejects_week_crossing_month() {
    let start = d(2024, 1, 29);
    let month = MonthKey::new(2024, 1).unwrap();
    let mut groups = generate_schedule(start, 7).unwrap();
    groups.truncate(1);
    groups[0].items = vec![WeekEntry::new(month, 1, start, d(2024, 2, 4))];
    let err = validate_schedule_groups(start, 7, &groups).unwrap_err();
    assert!(err.message().contains("crosses"));
}
