#![no_main]

use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use sunat_poll::PollPolicy;

fuzz_target!(|data: (u32, u64, u64, u32)| {
    let (max_attempts, initial_ms, interval_ms, attempt) = data;
    let policy = PollPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(initial_ms % 600_000),
        interval: Duration::from_millis(interval_ms % 600_000),
    };

    // 1. Every delay is one of the two configured values
    let delay = policy.delay_before(attempt);
    assert!(delay == policy.initial_delay || delay == policy.interval);

    // 2. Attempt 1 always waits the initial delay
    assert_eq!(policy.delay_before(1), policy.initial_delay);

    // 3. The budget is monotone: allowing an attempt allows every earlier one
    if policy.allows(attempt.saturating_add(1)) {
        assert!(policy.allows(attempt));
    }

    // 4. max_wait never panics and bounds the schedule from above
    let total = policy.max_wait();
    if policy.max_attempts > 0 {
        assert!(total >= policy.initial_delay);
    } else {
        assert_eq!(total, Duration::ZERO);
    }
});
