use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectaError {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Entity is not a JSON object: {0}")]
    NotAnObject(String),

    #[error("Entity has no string identifier under '@id' or 'id'")]
    MissingIdentifier,

    #[error("Entity relationship list is not an array: {0}")]
    InvalidRelationships(String),
}
