// Content id generator
use chrono::Utc;
use social_common::models::{CONTENT_EPOCH_MS, CONTENT_TIMESTAMP_SHIFT};
use social_common::{ContentId, Result, SocialError};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snowflake-style generator for `ContentId`s
///
/// Format (64 bits):
/// - 41 bits: milliseconds since `CONTENT_EPOCH_MS`
/// - 10 bits: node id
/// - 12 bits: sequence number
///
/// Ids from one generator are strictly increasing. When the sequence for the
/// current millisecond is exhausted, or the wall clock moves backwards, the
/// generator keeps counting from its last id instead of waiting, so the
/// embedded timestamp may run slightly ahead of the clock under burst load.
#[derive(Debug)]
pub struct ContentIdGenerator {
    node_bits: u64,
    last: AtomicU64,
}

impl ContentIdGenerator {
    /// Maximum node id
    pub const MAX_NODE_ID: u16 = 1023;

    const SEQUENCE_BITS: u32 = 12;
    const SEQUENCE_MASK: u64 = (1 << Self::SEQUENCE_BITS) - 1;

    pub fn new(node_id: u16) -> Result<Self> {
        if node_id > Self::MAX_NODE_ID {
            return Err(SocialError::Internal(format!(
                "content node id must be <= {}, got {}",
                Self::MAX_NODE_ID,
                node_id
            )));
        }

        Ok(Self {
            node_bits: u64::from(node_id) << Self::SEQUENCE_BITS,
            last: AtomicU64::new(0),
        })
    }

    /// Generate the next id
    pub fn next_id(&self) -> ContentId {
        let floor = (Self::millis_since_epoch() << CONTENT_TIMESTAMP_SHIFT) | self.node_bits;
        let mut last = self.last.load(Ordering::Acquire);

        loop {
            let next = if floor > last {
                floor
            } else if last & Self::SEQUENCE_MASK == Self::SEQUENCE_MASK {
                // Sequence overflow: borrow the next millisecond
                (((last >> CONTENT_TIMESTAMP_SHIFT) + 1) << CONTENT_TIMESTAMP_SHIFT)
                    | self.node_bits
            } else {
                last + 1
            };

            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return ContentId::from_raw(next),
                Err(actual) => last = actual,
            }
        }
    }

    /// Node id embedded in a content id
    pub fn extract_node_id(id: ContentId) -> u16 {
        ((id.as_u64() >> Self::SEQUENCE_BITS) & u64::from(Self::MAX_NODE_ID)) as u16
    }

    fn millis_since_epoch() -> u64 {
        u64::try_from(Utc::now().timestamp_millis())
            .unwrap_or(0)
            .saturating_sub(CONTENT_EPOCH_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_strictly_increase() {
        let generator = ContentIdGenerator::new(3).unwrap();
        let mut previous = generator.next_id();
        for _ in 0..10_000 {
            let id = generator.next_id();
            assert!(id > previous);
            previous = id;
        }
    }

    #[test]
    fn test_node_id_embedded() {
        let generator = ContentIdGenerator::new(517).unwrap();
        let id = generator.next_id();
        assert_eq!(ContentIdGenerator::extract_node_id(id), 517);
    }

    #[test]
    fn test_node_id_out_of_range() {
        assert!(ContentIdGenerator::new(1024).is_err());
    }

    #[test]
    fn test_timestamp_tracks_clock() {
        let generator = ContentIdGenerator::new(0).unwrap();
        let before = Utc::now().timestamp_millis() as u64;
        let id = generator.next_id();

        assert!(id.timestamp_millis() >= before);
        assert!(id.timestamp_millis() < before + 1_000);
    }

    #[test]
    fn test_sequence_overflow_borrows_next_millisecond() {
        let generator = ContentIdGenerator::new(1).unwrap();
        let far_future = (1u64 << 40) << CONTENT_TIMESTAMP_SHIFT;
        let exhausted = far_future | (1 << 12) | ContentIdGenerator::SEQUENCE_MASK;
        generator.last.store(exhausted, Ordering::SeqCst);

        let id = generator.next_id();
        assert!(id.as_u64() > exhausted);
        assert_eq!(
            id.as_u64() >> CONTENT_TIMESTAMP_SHIFT,
            (exhausted >> CONTENT_TIMESTAMP_SHIFT) + 1
        );
        assert_eq!(id.as_u64() & ContentIdGenerator::SEQUENCE_MASK, 0);
    }

    #[test]
    fn test_unique_across_threads() {
        let generator = Arc::new(ContentIdGenerator::new(9).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || {
                    (0..2_000).map(|_| generator.next_id()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(seen.len(), 16_000);
    }
}
