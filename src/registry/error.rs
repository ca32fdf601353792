/// Errors that can occur during registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("service not found: {0}")]
    ServiceNotFound(String),
}
