// src/backend/storage/storable.rs
use ic_stable_structures::{storable::Bound, Storable};
use serde::{de::DeserializeOwned, Serialize};
use std::borrow::Cow;

/// Wraps any serde type so it can live in stable structures as CBOR.
#[derive(Clone, Debug, PartialEq)]
pub struct Cbor<T>(pub T)
where
    T: Serialize + DeserializeOwned;

impl<T> Storable for Cbor<T>
where
    T: Serialize + DeserializeOwned,
{
    fn to_bytes(&self) -> Cow<[u8]> {
        let mut writer = vec![];
        ciborium::ser::into_writer(&self.0, &mut writer)
            .expect("Failed to serialize value to CBOR for stable storage");
        Cow::Owned(writer)
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        let value: T = ciborium::de::from_reader(bytes.as_ref())
            .expect("Failed to deserialize value from CBOR from stable storage");
        Cbor(value)
    }

    // Documents and config grow with user content.
    const BOUND: Bound = Bound::Unbounded;
}
