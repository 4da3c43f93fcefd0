//! Single-writer/single-reader notification ring buffer.
//!
//! Laid out the way the spec describes a dataspace-backed MC-ring-buffer:
//! a byte ring plus two index words (`shared_start`, `shared_end`) that the
//! two sides treat as the only shared state. Each side caches its own
//! counterpart index locally and only re-reads the shared word when its
//! local view says "apparently full" (writer) or "apparently empty"
//! (reader) — this is what lets the classical one-writer/one-reader
//! protocol avoid a lock: each side only ever writes the index word it
//! owns.

use refos_core::{NotificationRecord, SysError};

/// The byte ring and its two shared index words.
///
/// In a real deployment this would be a view over a dataspace mapped into
/// both the writer's and the reader's address spaces; here it is an owned
/// `Vec<u8>` so the ring can be unit-tested without a mapped dataspace.
pub struct RingBuffer {
    data: Vec<u8>,
    /// Authoritative consumer position; written only by the reader.
    shared_start: usize,
    /// Authoritative producer position; written only by the writer.
    shared_end: usize,
}

impl RingBuffer {
    /// Creates a ring over `capacity` bytes. Usable capacity is
    /// `capacity - 1` (one slot is always left empty to disambiguate full
    /// from empty).
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "ring buffer capacity must be at least 2");
        Self { data: vec![0u8; capacity], shared_start: 0, shared_end: 0 }
    }

    fn cap(&self) -> usize {
        self.data.len()
    }

    /// Maximum number of bytes that can be held at once.
    pub fn max_capacity(&self) -> usize {
        self.cap() - 1
    }
}

fn free_space(end: usize, start: usize, cap: usize) -> usize {
    cap - 1 - (end + cap - start) % cap
}

fn avail_data(end: usize, start: usize, cap: usize) -> usize {
    (end + cap - start) % cap
}

/// The writer side of a [`RingBuffer`]. Exactly one of these exists per ring.
#[derive(Default)]
pub struct RingWriter {
    cached_start: usize,
}

impl RingWriter {
    /// Writes `payload` into the ring, wrapping as needed.
    ///
    /// Re-reads the reader's shared position only if the writer's cached
    /// view shows insufficient free space.
    pub fn write(&mut self, ring: &mut RingBuffer, payload: &[u8]) -> Result<(), SysError> {
        let cap = ring.cap();
        let mut free = free_space(ring.shared_end, self.cached_start, cap);
        if free < payload.len() {
            self.cached_start = ring.shared_start;
            free = free_space(ring.shared_end, self.cached_start, cap);
            if free < payload.len() {
                return Err(SysError::NoMem);
            }
        }
        let mut pos = ring.shared_end;
        for &byte in payload {
            ring.data[pos] = byte;
            pos = (pos + 1) % cap;
        }
        ring.shared_end = pos;
        Ok(())
    }

    /// Convenience: serialises and writes a [`NotificationRecord`].
    pub fn write_record(&mut self, ring: &mut RingBuffer, rec: NotificationRecord) -> Result<(), SysError> {
        self.write(ring, &rec.to_bytes())
    }
}

/// The reader side of a [`RingBuffer`]. Exactly one of these exists per ring.
#[derive(Default)]
pub struct RingReader {
    cached_end: usize,
}

impl RingReader {
    /// Reads exactly `len` bytes from the ring, wrapping as needed.
    ///
    /// Returns `None` if fewer than `len` bytes are available even after
    /// re-reading the writer's shared position.
    pub fn read(&mut self, ring: &mut RingBuffer, len: usize) -> Option<Vec<u8>> {
        let cap = ring.cap();
        let mut avail = avail_data(self.cached_end, ring.shared_start, cap);
        if avail < len {
            self.cached_end = ring.shared_end;
            avail = avail_data(self.cached_end, ring.shared_start, cap);
            if avail < len {
                return None;
            }
        }
        let mut out = Vec::with_capacity(len);
        let mut pos = ring.shared_start;
        for _ in 0..len {
            out.push(ring.data[pos]);
            pos = (pos + 1) % cap;
        }
        ring.shared_start = pos;
        Some(out)
    }

    /// Convenience: reads and deserialises one [`NotificationRecord`].
    pub fn read_record(&mut self, ring: &mut RingBuffer) -> Option<NotificationRecord> {
        let bytes = self.read(ring, NotificationRecord::WIRE_SIZE)?;
        let arr: [u8; NotificationRecord::WIRE_SIZE] = bytes.try_into().ok()?;
        NotificationRecord::from_bytes(arr)
    }
}
