use thiserror::Error;

use crate::entity::{EntityId, EntityKind};

/// Errors from bulk replacement of an entity collection.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    /// Payload could not be decoded as a list of entities of the expected kind.
    #[error("malformed {kind} list: {message}")]
    Malformed { kind: EntityKind, message: String },

    /// The same identifier appeared twice in one list.
    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: EntityKind, id: EntityId },
}

/// Errors from placing a marker on the map surface.
#[derive(Debug, Error, PartialEq)]
pub enum PlaceError {
    #[error("{kind} {id} has invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates {
        kind: EntityKind,
        id: EntityId,
        latitude: f64,
        longitude: f64,
    },

    #[error(transparent)]
    Render(#[from] RenderError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("unknown template `{0}`")]
    UnknownTemplate(String),
}

/// Errors from the remote dashboard API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Request never produced a response.
    #[error("fetch error: {0}")]
    Transport(String),

    /// Response arrived with a non-success status code.
    #[error("HTTP {0}")]
    Status(u16),

    /// Response body could not be read or decoded.
    #[error("parse error: {0}")]
    Decode(String),
}

/// Errors from form submission.
#[derive(Debug, Error, PartialEq)]
pub enum SubmitError {
    /// No map location has been selected yet.
    #[error("Please select a location on the map.")]
    NoLocation,

    /// A form field failed validation.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors from encoding or decoding live channel frames.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("invalid channel frame: {0}")]
    Decode(String),

    #[error("failed to encode channel frame: {0}")]
    Encode(String),
}

/// Errors from a bulk load cycle.
#[derive(Debug, Error, PartialEq)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
