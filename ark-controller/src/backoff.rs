//! Retry backoff for recoverable target failures.

use rand::Rng;
use std::time::Duration;

const BASE: Duration = Duration::from_secs(2);
const CAP: Duration = Duration::from_secs(60);

pub fn next_delay(retry_count: u32) -> Duration {
    let exp = BASE.as_secs_f64() * 2f64.powi(retry_count as i32);
    let capped = exp.min(CAP.as_secs_f64());
    let jitter = rand::thread_rng().gen_range(-0.2..=0.2);
    let jittered = (capped * (1.0 + jitter)).max(0.0);
    Duration::from_secs_f64(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_within_twenty_percent_jitter_of_the_capped_value() {
        for retry_count in 0..10 {
            let exp = BASE.as_secs_f64() * 2f64.powi(retry_count);
            let capped = exp.min(CAP.as_secs_f64());
            for _ in 0..50 {
                let delay = next_delay(retry_count as u32).as_secs_f64();
                assert!(delay <= capped * 1.2 + 1e-6, "retry {retry_count}: {delay} > {}", capped * 1.2);
                assert!(delay >= capped * 0.8 - 1e-6, "retry {retry_count}: {delay} < {}", capped * 0.8);
            }
        }
    }

    #[test]
    fn never_exceeds_the_cap_by_more_than_jitter() {
        let delay = next_delay(20).as_secs_f64();
        assert!(delay <= CAP.as_secs_f64() * 1.2 + 1e-6);
    }
}
