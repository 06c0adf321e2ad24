//! Record identity - the store's native primary key
//!
//! Every leak and email is keyed by a 12-byte object id. Outside the store
//! it travels as 24 hex characters:
//!
//! - `5f1d7a3c9b2e4a0012345678`
//!
//! Parsing happens before any lookup, so a malformed id is a caller error
//! and never degrades into "not found".

use crate::{Error, Result};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Width of a record id in bytes
pub const ID_LEN: usize = 12;

/// Opaque, comparable identity of a stored leak or email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId([u8; ID_LEN]);

impl RecordId {
    pub const fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// Parse the 24-character hex form
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::EmptyInput("id"));
        }
        if s.len() != ID_LEN * 2 {
            return Err(Error::InvalidId(format!(
                "{:?} must be {} hex characters, got {}",
                s,
                ID_LEN * 2,
                s.len()
            )));
        }

        let mut bytes = [0u8; ID_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| Error::InvalidId(format!("{:?}: {}", s, e)))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        RecordId::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl ToSql for RecordId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(&self.0[..]))
    }
}

impl FromSql for RecordId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let blob = value.as_blob()?;
        let bytes: [u8; ID_LEN] = blob.try_into().map_err(|_| FromSqlError::InvalidBlobSize {
            expected_size: ID_LEN,
            blob_size: blob.len(),
        })?;
        Ok(Self(bytes))
    }
}
