//! Serde support for filters (requires the `serde` feature).
//!
//! The persisted form is exactly the two fields of the manual persistence
//! API: the capacity in bits and the raw used bytes of the array, in that
//! order. There is no magic, version or checksum; framing is the caller's
//! responsibility. A filter deserializes only into the same compile-time
//! configuration (rounds, subfilter, bucket stride) and must be queried with
//! the same hasher it was built with.
//!
//! # Examples
//!
//! ```
//! use bloomforge::Filter;
//!
//! let mut filter: Filter<u64, 4> = Filter::new(4096)?;
//! filter.insert(&7);
//!
//! let bytes = bincode::serialize(&filter).unwrap();
//! let restored: Filter<u64, 4> = bincode::deserialize(&bytes).unwrap();
//! assert!(restored.may_contain(&7));
//! assert_eq!(restored, filter);
//! # Ok::<(), bloomforge::BloomForgeError>(())
//! ```

use std::fmt;
use std::hash::Hash;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hash::BloomHasher;
use crate::subfilter::Subfilter;
use crate::Filter;

impl<T, const K: usize, S, H, const BUCKET_SIZE: usize> Serialize
    for Filter<T, K, S, H, BUCKET_SIZE>
where
    T: Hash,
    S: Subfilter,
    H: BloomHasher,
{
    fn serialize<Ser>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error>
    where
        Ser: Serializer,
    {
        let mut state = serializer.serialize_struct("Filter", 2)?;
        state.serialize_field("capacity", &self.capacity())?;
        state.serialize_field("bytes", self.as_bytes())?;
        state.end()
    }
}

impl<'de, T, const K: usize, S, H, const BUCKET_SIZE: usize> Deserialize<'de>
    for Filter<T, K, S, H, BUCKET_SIZE>
where
    T: Hash,
    S: Subfilter,
    H: BloomHasher,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(field_identifier, rename_all = "lowercase")]
        enum Field {
            Capacity,
            Bytes,
        }

        struct FilterVisitor<T, const K: usize, S, H, const BUCKET_SIZE: usize>(
            std::marker::PhantomData<(T, S, H)>,
        );

        impl<'de, T, const K: usize, S, H, const BUCKET_SIZE: usize> Visitor<'de>
            for FilterVisitor<T, K, S, H, BUCKET_SIZE>
        where
            T: Hash,
            S: Subfilter,
            H: BloomHasher,
        {
            type Value = Filter<T, K, S, H, BUCKET_SIZE>;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("struct Filter with fields 'capacity' and 'bytes'")
            }

            fn visit_seq<V>(self, mut seq: V) -> Result<Self::Value, V::Error>
            where
                V: SeqAccess<'de>,
            {
                let capacity: usize = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let bytes: Vec<u8> = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                Filter::from_parts(capacity, &bytes).map_err(de::Error::custom)
            }

            fn visit_map<V>(self, mut map: V) -> Result<Self::Value, V::Error>
            where
                V: MapAccess<'de>,
            {
                let mut capacity: Option<usize> = None;
                let mut bytes: Option<Vec<u8>> = None;

                while let Some(key) = map.next_key()? {
                    match key {
                        Field::Capacity => {
                            if capacity.is_some() {
                                return Err(de::Error::duplicate_field("capacity"));
                            }
                            capacity = Some(map.next_value()?);
                        }
                        Field::Bytes => {
                            if bytes.is_some() {
                                return Err(de::Error::duplicate_field("bytes"));
                            }
                            bytes = Some(map.next_value()?);
                        }
                    }
                }

                let capacity = capacity.ok_or_else(|| de::Error::missing_field("capacity"))?;
                let bytes = bytes.ok_or_else(|| de::Error::missing_field("bytes"))?;
                Filter::from_parts(capacity, &bytes).map_err(de::Error::custom)
            }
        }

        const FIELDS: &[&str] = &["capacity", "bytes"];
        deserializer.deserialize_struct(
            "Filter",
            FIELDS,
            FilterVisitor::<T, K, S, H, BUCKET_SIZE>(std::marker::PhantomData),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::subfilter::Multiblock;
    use crate::Filter;

    #[test]
    fn test_bincode_round_trip() {
        let mut filter: Filter<u64, 5> = Filter::new(1 << 14).unwrap();
        for i in 0..200u64 {
            filter.insert(&i);
        }

        let encoded = bincode::serialize(&filter).unwrap();
        let restored: Filter<u64, 5> = bincode::deserialize(&encoded).unwrap();

        assert_eq!(restored, filter);
        assert!((0..200u64).all(|i| restored.may_contain(&i)));
    }

    #[test]
    fn test_empty_filter_round_trip() {
        let filter: Filter<u64, 3> = Filter::default();
        let encoded = bincode::serialize(&filter).unwrap();
        let restored: Filter<u64, 3> = bincode::deserialize(&encoded).unwrap();
        assert_eq!(restored.capacity(), 0);
        assert!(restored.may_contain(&99));
    }

    #[test]
    fn test_multiblock_round_trip() {
        let mut filter: Filter<u64, 2, Multiblock<u32, 6>> = Filter::new(1 << 15).unwrap();
        filter.insert(&123);

        let encoded = bincode::serialize(&filter).unwrap();
        let restored: Filter<u64, 2, Multiblock<u32, 6>> = bincode::deserialize(&encoded).unwrap();
        assert!(restored.may_contain(&123));
        assert_eq!(restored.as_bytes(), filter.as_bytes());
    }

    #[test]
    fn test_corrupt_length_rejected() {
        let filter: Filter<u64, 3> = Filter::new(4096).unwrap();
        let mut truncated = filter.as_bytes().to_vec();
        truncated.pop();
        assert!(Filter::<u64, 3>::from_parts(filter.capacity(), &truncated).is_err());
    }
}
