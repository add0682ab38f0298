use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use thiserror::Error;
use voxel_battle_world::{VoxelTree, WorldError};

const SNAPSHOT_DOMAIN: &str = "voxel";
const SNAPSHOT_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded snapshot payload.
pub(crate) const SNAPSHOT_HEADER: &str = "voxel:v1";
/// Delimiter used to separate the prefix, version and payload.
const FIELD_DELIMITER: char = ':';

/// Encodes the tree into a single-line transfer string.
pub(crate) fn encode(tree: &VoxelTree) -> Result<String, SnapshotTransferError> {
    let bytes = tree.to_bytes()?;
    let encoded = STANDARD_NO_PAD.encode(bytes);
    Ok(format!("{SNAPSHOT_HEADER}{FIELD_DELIMITER}{encoded}"))
}

/// Decodes a tree from a transfer string produced by [`encode`].
pub(crate) fn decode(value: &str) -> Result<VoxelTree, SnapshotTransferError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SnapshotTransferError::EmptyPayload);
    }

    let mut parts = trimmed.splitn(3, FIELD_DELIMITER);
    let domain = parts.next().ok_or(SnapshotTransferError::MissingPrefix)?;
    let version = parts.next().ok_or(SnapshotTransferError::MissingVersion)?;
    let payload = parts.next().ok_or(SnapshotTransferError::MissingPayload)?;

    if domain != SNAPSHOT_DOMAIN {
        return Err(SnapshotTransferError::InvalidPrefix(domain.to_owned()));
    }
    if version != SNAPSHOT_VERSION {
        return Err(SnapshotTransferError::UnsupportedVersion(version.to_owned()));
    }

    let bytes = STANDARD_NO_PAD.decode(payload.as_bytes())?;
    Ok(VoxelTree::from_bytes(&bytes)?)
}

/// Errors that can occur while exchanging snapshot transfer strings.
#[derive(Debug, Error)]
pub(crate) enum SnapshotTransferError {
    /// The provided string was empty or contained only whitespace.
    #[error("snapshot string was empty")]
    EmptyPayload,
    /// The prefix segment was missing.
    #[error("snapshot string is missing the prefix")]
    MissingPrefix,
    /// The version segment was missing.
    #[error("snapshot string is missing the version")]
    MissingVersion,
    /// The payload segment was missing.
    #[error("snapshot string is missing the payload")]
    MissingPayload,
    /// The string used an unexpected prefix.
    #[error("snapshot prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The string used an unsupported version identifier.
    #[error("snapshot version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The base64 payload could not be decoded.
    #[error("could not decode snapshot payload: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
    /// The decoded payload is not a valid tree.
    #[error("could not restore snapshot: {0}")]
    InvalidTree(#[from] WorldError),
}
