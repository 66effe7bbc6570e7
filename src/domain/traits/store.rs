use crate::application::errors::StorageError;

/// Whole-document persistence: the entire value is read once and replaced on save
pub trait DocumentStore<T>: Send + Sync {
    /// Load the document, `Ok(None)` when nothing has been stored yet
    fn load(&self) -> Result<Option<T>, StorageError>;

    /// Replace the stored document with `value`
    fn save(&self, value: &T) -> Result<(), StorageError>;
}
