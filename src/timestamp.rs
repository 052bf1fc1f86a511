//! The 64-bit fixed-point NTP timestamp (32.32) and its era-aware
//! arithmetic.

use std::time::{Duration, SystemTime};

use chrono::Duration as SignedDuration;

use crate::codec;

/// Seconds between the NTP prime epoch (1900-01-01 00:00:00 UTC) and
/// the Unix epoch (1970-01-01 00:00:00 UTC).
pub const ERA_DELTA: u64 = 2_208_988_800;

/// `2^32`, used throughout to convert between the fractional field and
/// nanoseconds.
const FRACTION_SCALE: u128 = 1u128 << 32;
const NANOS_PER_SEC: u128 = 1_000_000_000;

/// A 64-bit fixed-point NTP timestamp: the top 32 bits are whole
/// seconds since the NTP prime epoch, the low 32 bits are a fraction
/// of a second in units of `2^-32` s.
///
/// The value `0` is a sentinel meaning "unknown / unsynchronized".
/// Seconds wrap every `2^32` seconds (an NTP *era*; era 0 runs from
/// 1900-01-01 to 2036-02-07 06:28:15). The only arithmetic operation
/// defined on two timestamps is subtraction (`-`), which the caller
/// must only use when both operands fall in the same era.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NtpTimestamp(u64);

impl NtpTimestamp {
    /// The sentinel value denoting "unknown / unsynchronized".
    pub const UNKNOWN: NtpTimestamp = NtpTimestamp(0);

    /// Wraps a raw 64-bit NTP timestamp value.
    #[must_use]
    pub const fn from_value(value: u64) -> Self {
        NtpTimestamp(value)
    }

    /// Builds a timestamp from its seconds and fraction fields.
    #[must_use]
    pub const fn from_parts(seconds: u32, fraction: u32) -> Self {
        NtpTimestamp(((seconds as u64) << 32) | fraction as u64)
    }

    /// Builds a timestamp from a system-clock duration measured since
    /// the NTP prime epoch, truncating the fractional system tick
    /// into the 32-bit fraction field.
    #[must_use]
    pub fn from_duration_since_epoch(d: Duration) -> Self {
        let seconds = d.as_secs() as u32;
        let (seconds, fraction) = nanos_to_fraction(seconds, d.subsec_nanos());
        NtpTimestamp::from_parts(seconds, fraction)
    }

    /// Builds a timestamp from a system-clock time point measured
    /// since the Unix epoch, adding [`ERA_DELTA`] before encoding.
    ///
    /// # Panics
    ///
    /// Panics if `t` is earlier than the Unix epoch.
    #[must_use]
    pub fn from_system_time(t: SystemTime) -> Self {
        let since_unix = t
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("time point before the Unix epoch");
        let since_ntp = since_unix + Duration::from_secs(ERA_DELTA);
        Self::from_duration_since_epoch(since_ntp)
    }

    /// The raw 64-bit value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The whole-seconds field.
    #[must_use]
    pub const fn seconds(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// The fractional-second field, in units of `2^-32` s.
    #[must_use]
    pub const fn fraction(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    /// Whether this is the sentinel "unknown" timestamp.
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        self.0 == 0
    }

    /// Reconstructs a system-clock duration equal to
    /// `seconds × 1s + round(fraction × ticks_per_second / 2^32)`.
    #[must_use]
    pub fn duration(self) -> Duration {
        let nanos = fraction_to_nanos(self.fraction());
        Duration::new(u64::from(self.seconds()), nanos)
    }

    /// Serializes this timestamp into an 8-byte big-endian buffer, as
    /// it appears on the wire.
    #[must_use]
    pub(crate) fn to_be_bytes(self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        codec::serialize(self.0, &mut buf);
        buf
    }

    /// Reads a timestamp from an 8-byte big-endian buffer.
    pub(crate) fn from_be_bytes(src: &[u8]) -> Self {
        NtpTimestamp(codec::deserialize(src))
    }
}

impl From<u64> for NtpTimestamp {
    fn from(value: u64) -> Self {
        NtpTimestamp::from_value(value)
    }
}

/// Subtraction is the only operation defined between two timestamps.
/// The result is well-defined only when both operands lie in the same
/// NTP era; era resolution across the 2036 rollover is the caller's
/// responsibility (see [`crate::packet::Packet::offset_at`]).
impl core::ops::Sub for NtpTimestamp {
    type Output = SignedDuration;

    fn sub(self, rhs: NtpTimestamp) -> SignedDuration {
        duration_to_signed(self.duration()) - duration_to_signed(rhs.duration())
    }
}

pub(crate) fn duration_to_signed(d: Duration) -> SignedDuration {
    SignedDuration::nanoseconds(i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
}

/// Rounds `fraction × NANOS_PER_SEC / 2^32` to the nearest nanosecond.
fn fraction_to_nanos(fraction: u32) -> u32 {
    let scaled = u128::from(fraction) * NANOS_PER_SEC + FRACTION_SCALE / 2;
    (scaled / FRACTION_SCALE) as u32
}

/// Rounds `nanos × 2^32 / NANOS_PER_SEC` to the nearest fraction tick,
/// carrying an overflowing round-up into the seconds field.
fn nanos_to_fraction(seconds: u32, nanos: u32) -> (u32, u32) {
    let scaled = u128::from(nanos) * FRACTION_SCALE + NANOS_PER_SEC / 2;
    let fraction = scaled / NANOS_PER_SEC;

    if fraction >= FRACTION_SCALE {
        (seconds.wrapping_add(1), 0)
    } else {
        (seconds, fraction as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_unknown_and_has_zero_duration() {
        let ts = NtpTimestamp::from_value(0);
        assert!(ts.is_unknown());
        assert_eq!(ts.duration(), Duration::ZERO);
    }

    #[test]
    fn seconds_field_from_raw_value() {
        let ts = NtpTimestamp::from_value(1u64 << 32);
        assert_eq!(ts.seconds(), 1);
        assert_eq!(ts.fraction(), 0);
    }

    #[test]
    fn duration_round_trip_within_one_tick() {
        // sample across the whole sub-millisecond range
        for micros in 0..1000u64 {
            let d = Duration::from_micros(micros);
            let ts = NtpTimestamp::from_duration_since_epoch(d);
            let back = ts.duration();
            let diff = if back > d { back - d } else { d - back };
            assert!(
                diff <= Duration::from_nanos(1),
                "micros={micros} diff={diff:?}"
            );
        }
    }

    #[test]
    fn subtraction_is_anti_symmetric() {
        let a = NtpTimestamp::from_duration_since_epoch(Duration::from_secs(100));
        let b = NtpTimestamp::from_duration_since_epoch(Duration::from_secs(40));

        assert_eq!(a - b, -(b - a));
        assert_eq!((a - b).num_seconds(), 60);
    }

    #[test]
    fn from_parts_and_value_agree() {
        let ts = NtpTimestamp::from_parts(7, 11);
        assert_eq!(ts.value(), (7u64 << 32) | 11);
    }

    #[test]
    fn from_system_time_applies_era_delta() {
        let ts = NtpTimestamp::from_system_time(SystemTime::UNIX_EPOCH);
        assert_eq!(ts.seconds(), ERA_DELTA as u32);
    }
}
