//! Error types for registration and registry body decoding.

use meshreg_storage::StorageError;
use meshreg_types::RegistryType;
use snafu::Snafu;

/// Errors from a single reconciliation attempt.
///
/// None of these escape the background task; they are logged and the attempt
/// is retried after the fixed interval.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RegistryError {
    /// The attempt ran before `register` supplied a service spec and gates.
    #[snafu(display("registration of {service_name}/{instance_id} was never requested"))]
    NotRequested {
        /// Service name.
        service_name: String,
        /// Instance id.
        instance_id: String,
    },

    /// Reading the existing record failed.
    #[snafu(display("read instance {service_name}/{instance_id} failed: {source}"))]
    ReadInstance {
        /// Service name.
        service_name: String,
        /// Instance id.
        instance_id: String,
        /// The underlying error.
        source: StorageError,
    },

    /// Writing the desired record failed.
    #[snafu(display("write instance {service_name}/{instance_id} failed: {source}"))]
    WriteInstance {
        /// Service name.
        service_name: String,
        /// Instance id.
        instance_id: String,
        /// The underlying error.
        source: StorageError,
    },
}

impl RegistryError {
    /// Whether a conditional write lost a race with another writer.
    pub fn is_write_conflict(&self) -> bool {
        matches!(self, RegistryError::WriteInstance { source, .. } if source.is_conflict())
    }

    /// Whether the next attempt may succeed without outside intervention.
    ///
    /// A corrupted stored record keeps failing until someone repairs it.
    pub fn is_retryable(&self) -> bool {
        match self {
            RegistryError::NotRequested { .. } => true,
            RegistryError::ReadInstance { source, .. } | RegistryError::WriteInstance { source, .. } => {
                source.is_retryable()
            }
        }
    }
}

/// Errors from decoding a third-party registration body.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DecodeError {
    /// The configured registry type is not a supported dialect.
    ///
    /// This is a configuration defect, not a bad request.
    #[snafu(display("BUG: can't recognize registry type: {registry_type}"))]
    UnknownRegistryType {
        /// The unrecognized registry type.
        registry_type: String,
    },

    /// The body does not parse in the dialect's encoding.
    #[snafu(display("decode {registry_type} body (content type '{content_type}') failed: {reason}"))]
    MalformedBody {
        /// Dialect the body was decoded as.
        registry_type: RegistryType,
        /// Content type the caller supplied.
        content_type: String,
        /// Parser error description.
        reason: String,
    },
}

impl DecodeError {
    /// Whether this error indicates a defect in configuration rather than input.
    pub fn is_defect(&self) -> bool {
        matches!(self, DecodeError::UnknownRegistryType { .. })
    }
}
