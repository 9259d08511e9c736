use super::Rate;
use std::time::Duration;

#[test]
fn test_per_second_spacing() {
    assert_eq!(Rate::per_second(20).spacing(), Duration::from_millis(50));
    assert_eq!(Rate::per_second(1).spacing(), Duration::from_secs(1));
    assert_eq!(Rate::per_second(3).spacing(), Duration::from_nanos(333_333_333));
}

#[test]
fn test_per_minute_spacing() {
    assert_eq!(Rate::per_minute(60).spacing(), Duration::from_secs(1));
    assert_eq!(Rate::per_minute(120).spacing(), Duration::from_millis(500));
}

#[test]
fn test_zero_count_has_no_spacing() {
    let rate = Rate::per_second(0);
    assert_eq!(rate.spacing(), Duration::ZERO);
    assert_eq!(rate.per_second_capacity(), None);
}

#[test]
fn test_capacity_round_trip() {
    let capacity = Rate::per_second(20).per_second_capacity().unwrap();
    assert!((capacity - 20.0).abs() < 1e-9);
}
