//! Parses `spec.timeout`/`spec.ttl`-style duration strings.
//!
//! Durations are documented as ISO-8601 but every concrete example value
//! (`"5m"`, `3 s` poll interval, `60 s` cap) uses Go's `time.ParseDuration`
//! shorthand instead, the form `kube`-adjacent operators already expect to
//! type into a CRD. This parser accepts that
//! shorthand: a sequence of `<number><unit>` pairs (`h`, `m`, `s`, `ms`), or a
//! bare number meaning seconds.

use ark_core::{EngineError, ErrorKind};

pub fn parse_duration(input: &str) -> Result<std::time::Duration, EngineError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(EngineError::new(ErrorKind::Resolve, "duration string is empty"));
    }

    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Ok(std::time::Duration::from_secs_f64(seconds));
    }

    let mut total = std::time::Duration::ZERO;
    let bytes = trimmed.as_bytes();
    let mut i = 0;
    let mut matched_any = false;

    while i < bytes.len() {
        let start = i;
        while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
            i += 1;
        }
        if i == start {
            return Err(invalid(trimmed));
        }
        let number: f64 = trimmed[start..i].parse().map_err(|_| invalid(trimmed))?;

        let unit_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        let unit = &trimmed[unit_start..i];
        let seconds_per_unit = match unit {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 0.001,
            _ => return Err(invalid(trimmed)),
        };
        total += std::time::Duration::from_secs_f64(number * seconds_per_unit);
        matched_any = true;
    }

    if !matched_any {
        return Err(invalid(trimmed));
    }
    Ok(total)
}

fn invalid(input: &str) -> EngineError {
    EngineError::new(ErrorKind::Resolve, format!("invalid duration '{input}'"))
}
