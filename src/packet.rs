//! The immutable 48-byte NTPv4 message, its typed field accessors, and
//! the delay/offset calculations derived from a four-timestamp
//! exchange.

use std::sync::Arc;
use std::time::SystemTime;

use chrono::Duration as SignedDuration;

use crate::codec;
use crate::timestamp::NtpTimestamp;

#[cfg(feature = "log")]
use log::debug;

/// Size, in bytes, of an NTPv4 packet with no extension fields.
pub const PACKET_SIZE: usize = 48;

const LI_MASK: u8 = 0b1100_0000;
const LI_SHIFT: u8 = 6;
const VERSION_MASK: u8 = 0b0011_1000;
const VERSION_SHIFT: u8 = 3;
const MODE_MASK: u8 = 0b0000_0111;
const MODE_SHIFT: u8 = 0;

const CLIENT_MODE: u8 = 3;
const CLIENT_VERSION: u8 = 4;

/// An immutable 48-byte NTPv4 message.
///
/// A default-constructed packet is the "null" sentinel (all 48 bytes
/// zero), used to signal "no packet" in a query outcome. Two null
/// packets compare equal. The underlying buffer is reference-counted,
/// so cloning a `Packet` is cheap and shares the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    bytes: Arc<[u8; PACKET_SIZE]>,
}

impl Default for Packet {
    fn default() -> Self {
        Packet {
            bytes: Arc::new([0u8; PACKET_SIZE]),
        }
    }
}

/// All the typed fields of an NTPv4 packet, used to build one from
/// scratch.
#[derive(Debug, Copy, Clone, Default)]
pub struct PacketFields {
    pub leap: u8,
    pub version: u8,
    pub mode: u8,
    pub stratum: u8,
    pub poll: i8,
    pub precision: i8,
    pub root_delay: u32,
    pub root_dispersion: u32,
    pub reference_id: u32,
    pub reference_timestamp: u64,
    pub origin_timestamp: u64,
    pub receive_timestamp: u64,
    pub transmit_timestamp: u64,
}

impl Packet {
    /// Builds a packet from its 13 typed fields.
    #[must_use]
    pub fn new(fields: PacketFields) -> Self {
        let mut buf = [0u8; PACKET_SIZE];

        buf[0] = (fields.leap << LI_SHIFT) & LI_MASK
            | (fields.version << VERSION_SHIFT) & VERSION_MASK
            | (fields.mode << MODE_SHIFT) & MODE_MASK;
        buf[1] = fields.stratum;
        buf[2] = fields.poll as u8;
        buf[3] = fields.precision as u8;
        codec::serialize(fields.root_delay, &mut buf[4..8]);
        codec::serialize(fields.root_dispersion, &mut buf[8..12]);
        codec::serialize(fields.reference_id, &mut buf[12..16]);
        codec::serialize(fields.reference_timestamp, &mut buf[16..24]);
        codec::serialize(fields.origin_timestamp, &mut buf[24..32]);
        codec::serialize(fields.receive_timestamp, &mut buf[32..40]);
        codec::serialize(fields.transmit_timestamp, &mut buf[40..48]);

        #[cfg(feature = "log")]
        debug!(
            target: "tempus::packet",
            "built packet: version={} mode={} transmit={:#018x}",
            fields.version, fields.mode, fields.transmit_timestamp,
        );

        Packet {
            bytes: Arc::new(buf),
        }
    }

    /// Wraps a raw 48-byte buffer, as received off the wire.
    #[must_use]
    pub fn from_bytes(buf: [u8; PACKET_SIZE]) -> Self {
        Packet {
            bytes: Arc::new(buf),
        }
    }

    /// The null sentinel packet (all bytes zero), signalling "no
    /// packet".
    #[must_use]
    pub fn null() -> Self {
        Self::default()
    }

    /// Builds the client request packet a [`crate::query::SingleQuery`]
    /// sends: `leap=0, version=4, mode=3, stratum=0, poll=0,
    /// precision=0`, all multi-byte fields zero except
    /// `transmit_timestamp`.
    #[must_use]
    pub fn request(transmit_timestamp: NtpTimestamp) -> Self {
        Self::new(PacketFields {
            leap: 0,
            version: CLIENT_VERSION,
            mode: CLIENT_MODE,
            transmit_timestamp: transmit_timestamp.value(),
            ..PacketFields::default()
        })
    }

    /// Whether every byte of this packet's payload is zero.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }

    /// The raw 48-byte payload. A null packet yields all zeros.
    #[must_use]
    pub fn data(&self) -> [u8; PACKET_SIZE] {
        *self.bytes
    }

    /// Leap indicator: 0 none, 1 +s, 2 -s, 3 unsynchronized.
    #[must_use]
    pub fn leap(&self) -> u8 {
        (self.bytes[0] & LI_MASK) >> LI_SHIFT
    }

    /// NTP version (expected 3 or 4).
    #[must_use]
    pub fn version(&self) -> u8 {
        (self.bytes[0] & VERSION_MASK) >> VERSION_SHIFT
    }

    /// Association mode: 3 = client, 4 = server, others per RFC 5905.
    #[must_use]
    pub fn mode(&self) -> u8 {
        (self.bytes[0] & MODE_MASK) >> MODE_SHIFT
    }

    /// Clock stratum: 0 unspecified/kiss, 1 primary, 2-15 secondary,
    /// 16 unsynchronized.
    #[must_use]
    pub fn stratum(&self) -> u8 {
        self.bytes[1]
    }

    /// `log2(seconds)` polling interval.
    #[must_use]
    pub fn poll(&self) -> i8 {
        self.bytes[2] as i8
    }

    /// `log2(seconds)` clock precision.
    #[must_use]
    pub fn precision(&self) -> i8 {
        self.bytes[3] as i8
    }

    /// Root delay, NTP short (16.16) format.
    #[must_use]
    pub fn root_delay(&self) -> u32 {
        codec::deserialize(&self.bytes[4..8])
    }

    /// Root dispersion, NTP short format.
    #[must_use]
    pub fn root_dispersion(&self) -> u32 {
        codec::deserialize(&self.bytes[8..12])
    }

    /// Reference identifier.
    #[must_use]
    pub fn reference_id(&self) -> u32 {
        codec::deserialize(&self.bytes[12..16])
    }

    /// Reference timestamp.
    #[must_use]
    pub fn reference_timestamp(&self) -> NtpTimestamp {
        NtpTimestamp::from_be_bytes(&self.bytes[16..24])
    }

    /// Origin timestamp: the client's transmit time, echoed back by
    /// the server.
    #[must_use]
    pub fn origin_timestamp(&self) -> NtpTimestamp {
        NtpTimestamp::from_be_bytes(&self.bytes[24..32])
    }

    /// Receive timestamp: the server's time of reception.
    #[must_use]
    pub fn receive_timestamp(&self) -> NtpTimestamp {
        NtpTimestamp::from_be_bytes(&self.bytes[32..40])
    }

    /// Transmit timestamp: the server's time of transmission (or, on
    /// a request packet, the client's).
    #[must_use]
    pub fn transmit_timestamp(&self) -> NtpTimestamp {
        NtpTimestamp::from_be_bytes(&self.bytes[40..48])
    }

    /// `(destination − originTimestamp) − (transmitTimestamp −
    /// receiveTimestamp)`.
    ///
    /// May be negative; callers may clamp. Assumes both endpoints'
    /// clocks did not wrap across the four instants.
    #[must_use]
    pub fn delay(&self, destination: NtpTimestamp) -> SignedDuration {
        let ticks = ticks_sub(destination.value(), self.origin_timestamp().value())
            .wrapping_sub(ticks_sub(
                self.transmit_timestamp().value(),
                self.receive_timestamp().value(),
            ));
        ticks_to_duration(ticks)
    }

    /// `((receiveTimestamp − originTimestamp) + (transmitTimestamp −
    /// destination)) / 2`.
    ///
    /// Only valid when client and server are in the same NTP era;
    /// exposed for testing. Production code should use
    /// [`Packet::offset_at`].
    #[must_use]
    pub fn offset(&self, destination: NtpTimestamp) -> SignedDuration {
        self.offset_ticks(destination.value())
    }

    /// Era-resolving offset: computes the raw offset using the
    /// timestamp obtained by encoding `destination + ERA_DELTA`, then
    /// relies on 64-bit two's-complement wraparound to project the
    /// result onto the nearest representative modulo `2^32` seconds.
    ///
    /// Correct whenever `|client_time − server_time| < 2^31 s` (about
    /// 68 years). This is the overload production code should use.
    #[must_use]
    pub fn offset_at(&self, destination: SystemTime) -> SignedDuration {
        let destination_ts = NtpTimestamp::from_system_time(destination);
        self.offset_ticks(destination_ts.value())
    }

    fn offset_ticks(&self, destination: u64) -> SignedDuration {
        let t1 = self.origin_timestamp().value();
        let t2 = self.receive_timestamp().value();
        let t3 = self.transmit_timestamp().value();
        let t4 = destination;

        let half_a = ticks_sub(t2, t1) / 2;
        let half_b = ticks_sub(t3, t4) / 2;
        ticks_to_duration(half_a.wrapping_add(half_b))
    }
}

/// Subtracts two raw 64-bit NTP timestamp values as 64-bit
/// two's-complement integers (RFC 5905's arithmetic): this is what
/// makes era wraparound resolve itself, as long as the true
/// difference is within `±2^31` s.
fn ticks_sub(a: u64, b: u64) -> i64 {
    a.wrapping_sub(b) as i64
}

/// Converts a signed tick count (units of `2^-32` s) into a
/// [`SignedDuration`].
fn ticks_to_duration(ticks: i64) -> SignedDuration {
    let nanos = (i128::from(ticks) * 1_000_000_000) / (1i128 << 32);
    SignedDuration::nanoseconds(nanos as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(seconds: u32, fraction: u32) -> NtpTimestamp {
        NtpTimestamp::from_parts(seconds, fraction)
    }

    #[test]
    fn default_packet_is_null() {
        let p = Packet::default();
        assert!(p.is_null());
        assert_eq!(p, Packet::null());
    }

    #[test]
    fn null_packets_compare_equal() {
        assert_eq!(Packet::null(), Packet::default());
    }

    #[test]
    fn any_nonzero_byte_makes_it_non_null() {
        let mut buf = [0u8; PACKET_SIZE];
        buf[47] = 1;
        let p = Packet::from_bytes(buf);
        assert!(!p.is_null());
    }

    #[test]
    fn request_packet_has_expected_header() {
        let p = Packet::request(ts(123, 456));
        assert_eq!(p.leap(), 0);
        assert_eq!(p.version(), 4);
        assert_eq!(p.mode(), 3);
        assert_eq!(p.stratum(), 0);
        assert_eq!(p.transmit_timestamp(), ts(123, 456));
        assert_eq!(p.origin_timestamp().value(), 0);
    }

    #[test]
    fn field_round_trip_through_bytes() {
        let fields = PacketFields {
            leap: 1,
            version: 4,
            mode: 4,
            stratum: 2,
            poll: -3,
            precision: -20,
            root_delay: 0x1122_3344,
            root_dispersion: 0x5566_7788,
            reference_id: 0x99AA_BBCC,
            reference_timestamp: 0x1111_1111_2222_2222,
            origin_timestamp: 0x3333_3333_4444_4444,
            receive_timestamp: 0x5555_5555_6666_6666,
            transmit_timestamp: 0x7777_7777_8888_8888,
        };
        let p = Packet::new(fields);

        assert_eq!(p.leap(), 1);
        assert_eq!(p.version(), 4);
        assert_eq!(p.mode(), 4);
        assert_eq!(p.stratum(), 2);
        assert_eq!(p.poll(), -3);
        assert_eq!(p.precision(), -20);
        assert_eq!(p.root_delay(), 0x1122_3344);
        assert_eq!(p.root_dispersion(), 0x5566_7788);
        assert_eq!(p.reference_id(), 0x99AA_BBCC);
        assert_eq!(p.reference_timestamp().value(), 0x1111_1111_2222_2222);
        assert_eq!(p.origin_timestamp().value(), 0x3333_3333_4444_4444);
        assert_eq!(p.receive_timestamp().value(), 0x5555_5555_6666_6666);
        assert_eq!(p.transmit_timestamp().value(), 0x7777_7777_8888_8888);
    }

    #[test]
    fn delay_and_offset_same_era_sanity_a() {
        let fields = PacketFields {
            origin_timestamp: ts(1000, 0).value(),
            receive_timestamp: ts(1000, 1 << 30).value(), // +0.25s
            transmit_timestamp: ts(1000, 1 << 31).value(), // +0.50s
            ..PacketFields::default()
        };
        let p = Packet::new(fields);
        let destination = ts(1000, 3 * (1u32 << 30)); // +0.75s

        let delay = p.delay(destination);
        assert_eq!(delay.num_milliseconds(), 500);

        let offset = p.offset(destination);
        assert!(offset.num_milliseconds().abs() <= 1);
    }

    #[test]
    fn delay_and_offset_same_era_sanity_b() {
        let fields = PacketFields {
            origin_timestamp: ts(2000, 0).value(),
            receive_timestamp: ts(2000, 0).value(),
            transmit_timestamp: ts(2000, 1 << 31).value(), // +0.5s
            ..PacketFields::default()
        };
        let p = Packet::new(fields);
        let destination = ts(2000, 1 << 31); // +0.5s

        assert_eq!(p.delay(destination).num_milliseconds(), 0);
        assert_eq!(p.offset(destination).num_milliseconds(), 0);
    }

    #[test]
    fn offset_across_eras_uses_wraparound_resolution() {
        // origin at the very end of era 0, receive/transmit at the
        // start of era 1 — a naive unsigned difference would be off
        // by roughly 2^32 seconds.
        let fields = PacketFields {
            origin_timestamp: ts(0xFFFF_FFFF, 0).value(),
            receive_timestamp: ts(0, 1 << 28).value(), // era 1, +0.0625s... see below
            transmit_timestamp: 0,
            ..PacketFields::default()
        };
        // Build precise values matching the spec's worked example:
        // origin=0xFFFFFFFF.00000000, receive=0.10000000 (hex fraction),
        // transmit=receive+0.10000000, destination=0.40000000.
        let origin = NtpTimestamp::from_parts(0xFFFF_FFFF, 0x0000_0000);
        let receive = NtpTimestamp::from_parts(0, 0x1000_0000);
        let transmit = NtpTimestamp::from_parts(0, 0x2000_0000);
        let destination = NtpTimestamp::from_parts(0, 0x4000_0000);
        let _ = fields;

        let p = Packet::new(PacketFields {
            origin_timestamp: origin.value(),
            receive_timestamp: receive.value(),
            transmit_timestamp: transmit.value(),
            ..PacketFields::default()
        });

        let offset = p.offset(destination);
        // ((t2-t1)+(t3-t4))/2 = (1.0625s + (-0.125s)) / 2 = 468750us,
        // and in particular nowhere near -0xFFFFFFFF seconds.
        assert!(offset.num_seconds().abs() < 10);
        assert!((offset.num_microseconds().unwrap() - 468_750).abs() < 1000);
    }
}
