//! `.mind` buffers: MessagePack with named fields.

use serde::Deserialize;

use crate::database::{CompiledDatabase, DATABASE_VERSION};
use crate::error::ExportError;

#[derive(Deserialize)]
struct VersionHeader {
    v: u32,
}

/// Serialize a database. Nothing is returned unless the whole buffer was
/// written.
pub fn encode(db: &CompiledDatabase) -> Result<Vec<u8>, ExportError> {
    if db.v != DATABASE_VERSION {
        return Err(ExportError::UnsupportedVersion { found: db.v });
    }
    Ok(rmp_serde::to_vec_named(db)?)
}

/// Parse a `.mind` buffer, rejecting versions other than the current one.
pub fn decode(bytes: &[u8]) -> Result<CompiledDatabase, ExportError> {
    let header: VersionHeader = rmp_serde::from_slice(bytes)?;
    if header.v != DATABASE_VERSION {
        return Err(ExportError::UnsupportedVersion { found: header.v });
    }
    Ok(rmp_serde::from_slice(bytes)?)
}
