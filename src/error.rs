use crate::device::{DeviceError, Extension};
use crate::image::ImageError;
use crate::view::ViewError;
use crate::InvalidPlaneError;
use std::fmt;

/// Step of a variant's run that failed to bind or dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Variant,
    Baseline,
    Map,
    Unmap,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Variant => f.write_str("variant dispatch"),
            Stage::Baseline => f.write_str("baseline dispatch"),
            Stage::Map => f.write_str("map"),
            Stage::Unmap => f.write_str("unmap"),
        }
    }
}

/// Fatal outcome of a conformance run
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("extension {extension} is required for {}", .extension.purpose())]
    Capability { extension: Extension },

    #[error("failed to create {what}: {source}")]
    ResourceCreation {
        what: &'static str,
        #[source]
        source: DeviceError,
    },

    #[error(transparent)]
    InvalidPlane(#[from] InvalidPlaneError),

    #[error("variant {variant}: {stage} failed: {source}")]
    Binding {
        variant: usize,
        stage: Stage,
        #[source]
        source: DeviceError,
    },

    #[error(
        "variant {variant}: row pitch of the reference ({reference_pitch}) differs from the candidate ({candidate_pitch})"
    )]
    Consistency {
        variant: usize,
        reference_pitch: usize,
        candidate_pitch: usize,
    },

    #[error("variant {variant}: mismatch in row {row} at byte {column}")]
    ValidationMismatch {
        variant: usize,
        row: usize,
        column: usize,
    },

    #[error(transparent)]
    Image(#[from] ImageError),
}

impl From<ViewError> for HarnessError {
    fn from(err: ViewError) -> Self {
        match err {
            ViewError::InvalidPlane(err) => HarnessError::InvalidPlane(err),
            ViewError::Device { what, source } => HarnessError::ResourceCreation { what, source },
        }
    }
}

impl HarnessError {
    /// Process exit code, the device status for device failures
    pub fn exit_code(&self) -> i32 {
        match self {
            HarnessError::ResourceCreation { source, .. } | HarnessError::Binding { source, .. } => {
                source.status
            }
            _ => 1,
        }
    }

    /// Index of the variant the error was raised for, if any
    pub fn variant(&self) -> Option<usize> {
        match self {
            HarnessError::Binding { variant, .. }
            | HarnessError::Consistency { variant, .. }
            | HarnessError::ValidationMismatch { variant, .. } => Some(*variant),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::status;

    #[test]
    fn device_failures_exit_with_their_status() {
        let err = HarnessError::Binding {
            variant: 2,
            stage: Stage::Variant,
            source: DeviceError::new(status::INVALID_KERNEL_ARGS),
        };

        assert_eq!(err.exit_code(), -52);
        assert_eq!(err.variant(), Some(2));
    }

    #[test]
    fn other_failures_exit_with_one() {
        let err = HarnessError::ValidationMismatch {
            variant: 0,
            row: 3,
            column: 7,
        };

        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "variant 0: mismatch in row 3 at byte 7");

        let err = HarnessError::Capability {
            extension: Extension::VectorImageOps,
        };

        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            err.to_string(),
            "extension cl_qcom_vector_image_ops is required for vector image reads/writes"
        );
    }
}
