use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Organization {0} not found")]
    OrganizationNotFound(String),

    #[error("Storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}
