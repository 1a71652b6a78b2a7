//! Per-group event buffer: append-only collection with deferred sort.
//!
//! Rows are appended during the build phase, merged across partial aggregates,
//! and sorted once, lazily, before matching. Rows where no event fired are
//! never stored; they cannot participate in any match and dropping them keeps
//! the buffer proportional to the interesting rows only.

use std::io::{self, Read, Write};

use crate::common::event::{Event, EventMask};
use crate::common::timestamp::Timestamp;
use crate::error::Result;

/// Append-only store of `(timestamp, event mask)` rows for one group.
///
/// Ordering contract: [`EventBuffer::sort`] orders rows by timestamp
/// ascending and is stable, so rows with equal timestamps keep their
/// insertion order. `conditions_met` accumulates the union of every mask
/// ever added and only ever grows.
#[derive(Debug, Clone)]
pub struct EventBuffer<T> {
    events: Vec<Event<T>>,
    sorted: bool,
    conditions_met: EventMask,
}

impl<T: Timestamp> EventBuffer<T> {
    /// Creates an empty buffer. An empty buffer is trivially sorted.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            events: Vec::new(),
            sorted: true,
            conditions_met: EventMask::EMPTY,
        }
    }

    /// Appends a row. Rows with an empty mask are discarded.
    pub fn add(&mut self, timestamp: T, events: EventMask) {
        if events.any() {
            self.events.push(Event::new(timestamp, events));
            self.sorted = false;
            self.conditions_met |= events;
        }
    }

    /// Appends every row of `other`. The source buffer must not be mutated
    /// again by the caller that handed it over; ownership of its rows has
    /// effectively transferred.
    pub fn merge(&mut self, other: &Self) {
        if other.events.is_empty() {
            return;
        }
        self.events.extend_from_slice(&other.events);
        self.sorted = false;
        self.conditions_met |= other.conditions_met;
    }

    /// Sorts rows by timestamp ascending (stable). Idempotent.
    pub fn sort(&mut self) {
        if self.sorted {
            return;
        }
        // Presorted input is the common case when rows arrive in time order;
        // the O(n) scan spares the allocation a stable sort would make.
        if !self
            .events
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp)
        {
            self.events.sort_by_key(|e| e.timestamp);
        }
        self.sorted = true;
    }

    /// Returns the stored rows in their current order.
    #[must_use]
    pub fn events(&self) -> &[Event<T>] {
        &self.events
    }

    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if no rows are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns true if the rows are known to be in timestamp order.
    #[must_use]
    pub const fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Union of every mask ever added to this buffer.
    #[must_use]
    pub const fn conditions_met(&self) -> EventMask {
        self.conditions_met
    }

    /// Writes the buffer state:
    ///
    /// ```text
    /// sorted      : u8 (0/1)
    /// count       : varuint (LEB128)
    /// per row     : timestamp as raw LE of T, mask as u64 LE
    /// ```
    ///
    /// `conditions_met` is intentionally not on the wire; see
    /// [`EventBuffer::deserialize`].
    pub fn serialize<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&[u8::from(self.sorted)])?;
        write_varuint(self.events.len() as u64, out)?;
        for event in &self.events {
            event.timestamp.write_le(out)?;
            out.write_all(&u64::from(event.events.bits()).to_le_bytes())?;
        }
        Ok(())
    }

    /// Reads a buffer previously written by [`EventBuffer::serialize`].
    ///
    /// `conditions_met` is reconstructed as all-ones: the bitmap is not on
    /// the wire, and over-approximating it only weakens the short-circuit
    /// guard, never the match result.
    pub fn deserialize<R: Read>(input: &mut R) -> Result<Self> {
        let mut flag = [0u8; 1];
        input.read_exact(&mut flag)?;
        let sorted = match flag[0] {
            0 => false,
            1 => true,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid sorted flag {other}"),
                )
                .into())
            }
        };

        let count = read_varuint(input)?;
        let count = usize::try_from(count)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "row count out of range"))?;

        // Capacity grows as rows arrive so a corrupt count cannot trigger a
        // huge up-front allocation.
        let mut events = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let timestamp = T::read_le(input)?;
            let mut mask = [0u8; 8];
            input.read_exact(&mut mask)?;
            let mask = u64::from_le_bytes(mask);
            events.push(Event::new(timestamp, EventMask::from_bits(mask as u32)));
        }

        Ok(Self {
            events,
            sorted,
            conditions_met: EventMask::ALL,
        })
    }
}

impl<T: Timestamp> Default for EventBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn write_varuint<W: Write>(mut value: u64, out: &mut W) -> io::Result<()> {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            return out.write_all(&[byte]);
        }
        out.write_all(&[byte | 0x80])?;
    }
}

fn read_varuint<R: Read>(input: &mut R) -> io::Result<u64> {
    let mut value = 0u64;
    for i in 0..10 {
        let mut byte = [0u8; 1];
        input.read_exact(&mut byte)?;
        let payload = u64::from(byte[0] & 0x7f);
        // The 10th byte holds the final bit of a u64; anything above it
        // cannot round-trip.
        if i == 9 && byte[0] > 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "varint overflows u64",
            ));
        }
        value |= payload << (i * 7);
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "varint longer than 10 bytes",
    ))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_rows() -> impl Strategy<Value = Vec<(u64, u32)>> {
        proptest::collection::vec((0u64..1000, 0u32..=0xff), 0..40)
    }

    fn build(rows: &[(u64, u32)]) -> EventBuffer<u64> {
        let mut buf = EventBuffer::new();
        for &(t, m) in rows {
            buf.add(t, EventMask::from_bits(m));
        }
        buf
    }

    fn entry_multiset(buf: &EventBuffer<u64>) -> Vec<(u64, u32)> {
        let mut rows: Vec<(u64, u32)> = buf
            .events()
            .iter()
            .map(|e| (e.timestamp, e.events.bits()))
            .collect();
        rows.sort_unstable();
        rows
    }

    proptest! {
        #[test]
        fn sort_preserves_multiset_and_orders(rows in arb_rows()) {
            let mut buf = build(&rows);
            let before = entry_multiset(&buf);
            buf.sort();
            prop_assert_eq!(entry_multiset(&buf), before);
            prop_assert!(buf
                .events()
                .windows(2)
                .all(|w| w[0].timestamp <= w[1].timestamp));
        }

        #[test]
        fn merge_is_commutative_up_to_multiset(a in arb_rows(), b in arb_rows()) {
            let mut ab = build(&a);
            ab.merge(&build(&b));
            let mut ba = build(&b);
            ba.merge(&build(&a));
            prop_assert_eq!(entry_multiset(&ab), entry_multiset(&ba));
            prop_assert_eq!(ab.conditions_met(), ba.conditions_met());
        }

        #[test]
        fn merge_is_associative(a in arb_rows(), b in arb_rows(), c in arb_rows()) {
            let mut left = build(&a);
            left.merge(&build(&b));
            left.merge(&build(&c));

            let mut bc = build(&b);
            bc.merge(&build(&c));
            let mut right = build(&a);
            right.merge(&bc);

            prop_assert_eq!(entry_multiset(&left), entry_multiset(&right));
            prop_assert_eq!(left.conditions_met(), right.conditions_met());
        }

        #[test]
        fn serialize_roundtrip_is_identity(rows in arb_rows(), presort in proptest::bool::ANY) {
            let mut buf = build(&rows);
            if presort {
                buf.sort();
            }
            let mut bytes = Vec::new();
            buf.serialize(&mut bytes).unwrap();
            let back = EventBuffer::<u64>::deserialize(&mut bytes.as_slice()).unwrap();
            prop_assert_eq!(back.is_sorted(), buf.is_sorted());
            prop_assert_eq!(back.events(), buf.events());
            // Over-approximation only: the original bitmap is a subset.
            prop_assert!(back.conditions_met().contains(buf.conditions_met()));
        }
    }
}
