use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

define_id!(SongId, "Source identifier of a song.");
define_id!(ArtistId, "Source identifier of an artist.");
define_id!(
    UserId,
    "Application user identifier as it appears in usage logs."
);

const SEQUENCE_BITS: u32 = 33;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;
const MAX_PARTITION: u32 = (1 << 30) - 1;

/// Surrogate key of a songplay row.
///
/// The upper bits carry the index of the partition the row was produced in
/// and the lower 33 bits a sequence local to that partition, so partitions
/// can number their rows without coordinating with each other. Values are
/// unique within one run but not contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongplayId(i64);

impl SongplayId {
    /// Compose an id from a partition index and a partition-local sequence.
    ///
    /// # Errors
    /// Returns [`Error::KeyOverflow`] when either part exceeds its bit range.
    pub fn from_parts(partition: u32, sequence: u64) -> Result<Self> {
        if partition > MAX_PARTITION || sequence > MAX_SEQUENCE {
            return Err(Error::KeyOverflow {
                partition,
                sequence,
            });
        }
        let value = (u64::from(partition) << SEQUENCE_BITS) | sequence;
        Ok(Self(value as i64))
    }

    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn partition(self) -> u32 {
        (self.0 >> SEQUENCE_BITS) as u32
    }

    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn sequence(self) -> u64 {
        self.0 as u64 & MAX_SEQUENCE
    }
}

impl fmt::Display for SongplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_id_display() {
        let id = SongId::new("SOUPIRU12A6D4FA1E1");
        assert_eq!(id.to_string(), "SOUPIRU12A6D4FA1E1");
        assert_eq!(id.as_str(), "SOUPIRU12A6D4FA1E1");
    }

    #[test]
    fn test_string_id_serde_is_transparent() {
        let id: ArtistId = serde_json::from_str("\"ARJIE2Y1187B994AB7\"").unwrap();
        assert_eq!(id, ArtistId::from("ARJIE2Y1187B994AB7"));
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"ARJIE2Y1187B994AB7\""
        );
    }

    #[test]
    fn test_songplay_id_first_of_partition_zero() {
        let id = SongplayId::from_parts(0, 0).unwrap();
        assert_eq!(id.value(), 0);
    }

    #[test]
    fn test_songplay_id_parts_roundtrip() {
        let id = SongplayId::from_parts(3, 17).unwrap();
        assert_eq!(id.value(), (3_i64 << 33) + 17);
        assert_eq!(id.partition(), 3);
        assert_eq!(id.sequence(), 17);
    }

    #[test]
    fn test_songplay_ids_do_not_collide_across_partitions() {
        let last_of_first = SongplayId::from_parts(0, MAX_SEQUENCE).unwrap();
        let first_of_second = SongplayId::from_parts(1, 0).unwrap();
        assert_ne!(last_of_first, first_of_second);
        assert!(last_of_first < first_of_second);
    }

    #[test]
    fn test_songplay_id_overflow() {
        assert!(matches!(
            SongplayId::from_parts(0, MAX_SEQUENCE + 1),
            Err(Error::KeyOverflow { .. })
        ));
        assert!(SongplayId::from_parts(MAX_PARTITION + 1, 0).is_err());
        assert!(SongplayId::from_parts(MAX_PARTITION, MAX_SEQUENCE).unwrap().value() > 0);
    }
}
