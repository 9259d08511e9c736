use super::{AdmissionError, Decision, RateLimiter};
use std::time::{Duration, Instant};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Offer an admission every `step` for `total`, returning admission offsets.
fn drive(limiter: &mut RateLimiter, t0: Instant, step: Duration, total: Duration) -> Vec<Duration> {
    let mut admitted = Vec::new();
    let mut offset = Duration::ZERO;
    while offset <= total {
        if limiter.try_admit(t0 + offset).is_admit() {
            admitted.push(offset);
        }
        offset += step;
    }
    admitted
}

#[test]
fn test_first_request_is_admitted() {
    let mut limiter = RateLimiter::new(20, ms(50)).unwrap();
    let now = Instant::now();

    assert_eq!(limiter.try_admit(now), Decision::Admit);
    assert_eq!(limiter.last_admit(), Some(now));
    assert_eq!(limiter.cursor(), 1);
}

#[test]
fn test_spacing_rule_is_strict() {
    let mut limiter = RateLimiter::new(20, ms(50)).unwrap();
    let t0 = Instant::now();
    limiter.try_admit(t0);

    assert!(!limiter.try_admit(t0 + ms(49)).is_admit());
    assert!(!limiter.try_admit(t0 + ms(50)).is_admit());
    assert!(limiter.try_admit(t0 + ms(51)).is_admit());
}

#[test]
fn test_window_blocks_after_rate_is_spent() {
    // No spacing: the whole budget can be spent in a burst
    let mut limiter = RateLimiter::new(5, Duration::ZERO).unwrap();
    let t0 = Instant::now();

    for i in 0..5 {
        assert!(
            limiter.try_admit(t0 + ms(i)).is_admit(),
            "Request {} should be admitted",
            i + 1
        );
    }

    // 6th request reuses the slot filled at t0
    let decision = limiter.try_admit(t0 + ms(10));
    assert!(!decision.is_admit());
    assert!(decision.retry_after() > ms(990));

    assert!(!limiter.try_admit(t0 + ms(1000)).is_admit());
    assert!(limiter.try_admit(t0 + ms(1001)).is_admit());
}

#[test]
fn test_refused_check_does_not_mutate() {
    let mut limiter = RateLimiter::new(2, ms(100)).unwrap();
    let t0 = Instant::now();
    limiter.try_admit(t0);

    let cursor = limiter.cursor();
    let last = limiter.last_admit();

    for i in 1..=100 {
        assert!(!limiter.try_admit(t0 + ms(i)).is_admit());
    }

    assert_eq!(limiter.cursor(), cursor);
    assert_eq!(limiter.last_admit(), last);

    // Behaves exactly as if the refused attempts never happened
    assert!(limiter.try_admit(t0 + ms(101)).is_admit());
}

#[test]
fn test_wait_hint_is_sufficient() {
    let mut limiter = RateLimiter::new(3, ms(100)).unwrap();
    let t0 = Instant::now();
    limiter.try_admit(t0);

    let now = t0 + ms(20);
    let wait = limiter.check(now).retry_after();
    assert!(wait > ms(80));
    assert!(limiter.check(now + wait).is_admit());
}

#[test]
fn test_spacing_invariant_holds() {
    let mut limiter = RateLimiter::new(20, ms(50)).unwrap();
    let t0 = Instant::now();
    let admitted = drive(&mut limiter, t0, ms(1), Duration::from_secs(5));

    assert!(!admitted.is_empty());
    for pair in admitted.windows(2) {
        assert!(
            pair[1] - pair[0] > ms(50),
            "admissions at {:?} and {:?} are too close",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn test_window_invariant_holds() {
    // Spacing smaller than 1s / rate, so the window rule does the limiting
    let mut limiter = RateLimiter::new(10, ms(20)).unwrap();
    let t0 = Instant::now();
    let admitted = drive(&mut limiter, t0, ms(1), Duration::from_secs(5));

    for (i, end) in admitted.iter().enumerate() {
        let start = end.saturating_sub(ms(1000));
        let in_window = admitted[..=i].iter().filter(|at| **at >= start).count();
        assert!(in_window <= 10, "{in_window} admissions in window ending at {end:?}");
    }

    // The window, not the spacing, capped throughput
    assert!(admitted.len() <= 5 * 10 + 10);
}

#[test]
fn test_single_channel_first_second() {
    // R = 20, spacing 50ms, offered every millisecond
    let mut limiter = RateLimiter::new(20, ms(50)).unwrap();
    let t0 = Instant::now();
    let admitted = drive(&mut limiter, t0, ms(1), ms(999));

    assert_eq!(admitted.len(), 20);
    assert_eq!(admitted[0], Duration::ZERO);
    assert_eq!(admitted[19], ms(19 * 51));

    // 21st admission waits for the first slot to age out
    assert!(!limiter.check(t0 + ms(1000)).is_admit());
    assert!(limiter.check(t0 + ms(1020)).is_admit());
}

#[test]
fn test_admissions_in_window() {
    let mut limiter = RateLimiter::new(20, ms(50)).unwrap();
    let t0 = Instant::now();
    drive(&mut limiter, t0, ms(1), ms(500));

    assert_eq!(limiter.admissions_in_window(t0 + ms(500)), 10);
    assert_eq!(limiter.admissions_in_window(t0 + ms(5000)), 0);
}

#[test]
fn test_invalid_parameters() {
    assert_eq!(
        RateLimiter::new(0, ms(50)).unwrap_err(),
        AdmissionError::InvalidRate
    );
    assert_eq!(
        RateLimiter::builder()
            .per_second(5)
            .window(Duration::ZERO)
            .build()
            .unwrap_err(),
        AdmissionError::InvalidWindow
    );
}

#[test]
fn test_builder_defaults_spacing_from_rate() {
    let limiter = RateLimiter::builder().per_second(20).build().unwrap();
    assert_eq!(limiter.min_spacing(), ms(50));
    assert_eq!(limiter.window(), Duration::from_secs(1));
    assert_eq!(limiter.per_second_rate(), 20);

    let limiter = RateLimiter::builder()
        .per_second(10)
        .window(Duration::from_secs(2))
        .build()
        .unwrap();
    assert_eq!(limiter.min_spacing(), ms(200));
}
