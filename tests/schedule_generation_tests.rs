use chrono::{Days, NaiveDate};
use contract_progress::schedule::{self, entries};
use contract_progress::{
    MonthGroup, MonthKey, MonthLabelLocale, ScheduleError, WeekEntry, generate_schedule,
};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn spans(groups: &[MonthGroup]) -> Vec<(NaiveDate, NaiveDate)> {
    entries(groups).map(|e| (e.start_date, e.end_date)).collect()
}

fn assert_covers(groups: &[MonthGroup], start: NaiveDate, days: i64) {
    let last = start + Days::new(days as u64 - 1);
    let mut expected = start;
    for entry in entries(groups) {
        assert_eq!(entry.start_date, expected, "gap or overlap before {entry:?}");
        assert!(entry.end_date >= entry.start_date);
        assert!(entry.days() <= 7);
        assert_eq!(MonthKey::of(entry.start_date), entry.month);
        assert_eq!(MonthKey::of(entry.end_date), entry.month);
        expected = entry.end_date.succ_opt().unwrap();
    }
    assert_eq!(expected, last.succ_opt().unwrap(), "schedule does not end on {last}");
}

#[test]
fn january_contract_matches_reference_scenario() {
    let groups = generate_schedule(d(2024, 1, 15), 20).unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].label(MonthLabelLocale::English), "January 2024");
    assert_eq!(groups[1].label(MonthLabelLocale::English), "February 2024");
    assert_eq!(
        spans(&groups[..1]),
        vec![
            (d(2024, 1, 15), d(2024, 1, 21)),
            (d(2024, 1, 22), d(2024, 1, 28)),
            (d(2024, 1, 29), d(2024, 1, 31)),
        ]
    );
    assert_eq!(spans(&groups[1..]), vec![(d(2024, 2, 1), d(2024, 2, 3))]);
    assert_eq!(entries(&groups).count(), 4);
    assert_eq!(entries(&groups).last().unwrap().end_date, d(2024, 2, 3));
}

#[test]
fn new_entries_start_without_progress() {
    let groups = generate_schedule(d(2024, 1, 15), 20).unwrap();
    for entry in entries(&groups) {
        assert_eq!(entry.rencana(), 0.0);
        assert_eq!(entry.realisasi(), 0.0);
        assert_eq!(entry.deviasi(), 0.0);
    }
}

#[test]
fn schedule_covers_every_day_exactly_once() {
    let starts = [
        d(2024, 1, 1),
        d(2024, 2, 27),
        d(2023, 2, 28),
        d(2024, 4, 28),
        d(2024, 12, 30),
        d(2025, 6, 30),
    ];
    for start in starts {
        for days in [1, 2, 6, 7, 8, 13, 31, 45, 90, 366, 730] {
            let groups = generate_schedule(start, days).unwrap();
            assert_covers(&groups, start, days);
        }
    }
}

#[test]
fn week_numbers_restart_in_each_month() {
    let groups = generate_schedule(d(2024, 3, 20), 120).unwrap();
    for group in &groups {
        for (idx, entry) in group.items.iter().enumerate() {
            assert_eq!(entry.week, idx as u32 + 1);
            assert_eq!(entry.month, group.month);
        }
    }
}

#[test]
fn months_are_chronological_and_unique() {
    let groups = generate_schedule(d(2024, 11, 10), 120).unwrap();
    let months: Vec<String> = groups.iter().map(|g| g.month.to_string()).collect();
    assert_eq!(months, vec!["2024-11", "2024-12", "2025-01", "2025-02", "2025-03"]);
}

#[test]
fn zero_duration_yields_empty_schedule() {
    assert!(generate_schedule(d(2024, 1, 15), 0).unwrap().is_empty());
}

#[test]
fn negative_duration_is_rejected() {
    let err = generate_schedule(d(2024, 1, 15), -3).unwrap_err();
    assert!(matches!(err, ScheduleError::InvalidArgument(_)));
}

#[test]
fn duration_past_calendar_end_is_rejected() {
    let err = generate_schedule(NaiveDate::MAX, 2).unwrap_err();
    assert!(matches!(err, ScheduleError::InvalidArgument(_)));
}

#[test]
fn single_day_at_calendar_end_is_one_week() {
    let groups = generate_schedule(NaiveDate::MAX, 1).unwrap();
    assert_eq!(spans(&groups), vec![(NaiveDate::MAX, NaiveDate::MAX)]);
}

#[test]
fn week_crossing_month_end_is_split() {
    // April has 30 days; the first natural week would run Apr 28 - May 4.
    let groups = generate_schedule(d(2024, 4, 28), 10).unwrap();
    assert_eq!(groups.len(), 2);

    let april = &groups[0].items;
    let may = &groups[1].items;
    assert_eq!((april[0].start_date, april[0].end_date), (d(2024, 4, 28), d(2024, 4, 30)));
    assert_eq!(april[0].week, 1);
    assert_eq!((may[0].start_date, may[0].end_date), (d(2024, 5, 1), d(2024, 5, 7)));
    assert_eq!(may[0].week, 1);
    assert_eq!(april[0].days() + may[0].days(), 10);
}

#[test]
fn leap_february_closes_on_the_29th() {
    let groups = generate_schedule(d(2024, 2, 26), 7).unwrap();
    assert_eq!(
        spans(&groups),
        vec![(d(2024, 2, 26), d(2024, 2, 29)), (d(2024, 3, 1), d(2024, 3, 3))]
    );
}

#[test]
fn parse_start_date_rejects_malformed_input() {
    assert_eq!(schedule::parse_start_date("2024-01-15").unwrap(), d(2024, 1, 15));
    for input in ["2024-02-30", "15/01/2024", ""] {
        let err = schedule::parse_start_date(input).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidArgument(_)), "{input}");
    }
}

#[test]
fn deserialized_entry_recomputes_deviation() {
    let json = r#"{
        "month": "2024-01",
        "week": 2,
        "start_date": "2024-01-08",
        "end_date": "2024-01-14",
        "rencana": 12.5,
        "realisasi": 10.0,
        "deviasi": 99.0
    }"#;
    let entry: WeekEntry = serde_json::from_str(json).unwrap();
    assert_eq!(entry.deviasi(), -2.5);
}

#[test]
fn group_entries_restores_chronological_order() {
    let groups = generate_schedule(d(2024, 12, 20), 30).unwrap();
    let mut loose: Vec<WeekEntry> = entries(&groups).cloned().collect();
    loose.reverse();
    assert_eq!(schedule::group_entries(loose), groups);
}
