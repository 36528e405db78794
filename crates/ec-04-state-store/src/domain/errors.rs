use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{type_name} not found: {id}")]
    ObjectNotFound { type_name: &'static str, id: String },

    #[error("index conflict on {type_name}: {id}")]
    IndexConflict { type_name: &'static str, id: String },

    #[error("no undo session is open")]
    NoUndoSession,
}
