// Defines the standard error codes used across dumbvec, modelled on the
// gRPC status codes. https://grpc.github.io/grpc/core/md_doc_statuscodes.html
// Custom errors map onto these codes so callers can branch on the kind of
// failure without inspecting messages.
use std::error::Error;

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum ErrorCodes {
    // OK is returned on success, we use "Success" since Ok is a keyword in Rust.
    Success = 0,
    // CANCELLED indicates the operation was cancelled (typically by the caller).
    Cancelled = 1,
    // UNKNOWN indicates an unknown error.
    Unknown = 2,
    // INVALID_ARGUMENT indicates client specified an invalid argument.
    InvalidArgument = 3,
    // DEADLINE_EXCEEDED means operation expired before completion.
    DeadlineExceeded = 4,
    // NOT_FOUND means some requested blob, document or index was not found.
    NotFound = 5,
    // ALREADY_EXISTS means a blob we attempted to create already exists.
    AlreadyExists = 6,
    // PERMISSION_DENIED indicates the caller does not have permission to execute the specified operation.
    PermissionDenied = 7,
    // RESOURCE_EXHAUSTED indicates some resource has been exhausted.
    ResourceExhausted = 8,
    // FAILED_PRECONDITION indicates operation was rejected because the system is not in a state required for the operation's execution.
    FailedPrecondition = 9,
    // ABORTED indicates the operation was aborted.
    Aborted = 10,
    // OUT_OF_RANGE means a value was outside the domain an operation accepts.
    OutOfRange = 11,
    // UNIMPLEMENTED indicates operation is not implemented or not supported/enabled.
    Unimplemented = 12,
    // INTERNAL errors are internal errors.
    Internal = 13,
    // UNAVAILABLE indicates the backing store is currently unavailable.
    Unavailable = 14,
    // DATA_LOSS indicates unrecoverable data loss or corruption, e.g. a damaged index container.
    DataLoss = 15,
    // UNAUTHENTICATED indicates the request does not have valid authentication credentials for the operation.
    Unauthenticated = 16,
    // VERSION_MISMATCH indicates a persisted format version this build does not understand.
    VersionMismatch = 17,
}

impl ErrorCodes {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCodes::InvalidArgument => "InvalidArgumentError",
            ErrorCodes::NotFound => "NotFoundError",
            ErrorCodes::AlreadyExists => "AlreadyExistsError",
            ErrorCodes::OutOfRange => "OutOfRangeError",
            ErrorCodes::DataLoss => "DataLossError",
            ErrorCodes::Internal => "InternalError",
            ErrorCodes::VersionMismatch => "VersionMismatchError",
            _ => "DumbvecError",
        }
    }
}

pub trait DumbvecError: Error + Send {
    fn code(&self) -> ErrorCodes;
    fn boxed(self) -> Box<dyn DumbvecError>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
    fn should_trace_error(&self) -> bool {
        true
    }
}

impl Error for Box<dyn DumbvecError> {}

impl DumbvecError for Box<dyn DumbvecError> {
    fn code(&self) -> ErrorCodes {
        self.as_ref().code()
    }
}

impl DumbvecError for std::io::Error {
    fn code(&self) -> ErrorCodes {
        match self.kind() {
            std::io::ErrorKind::NotFound => ErrorCodes::NotFound,
            std::io::ErrorKind::AlreadyExists => ErrorCodes::AlreadyExists,
            std::io::ErrorKind::PermissionDenied => ErrorCodes::PermissionDenied,
            _ => ErrorCodes::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxed_error_keeps_code() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let boxed = err.boxed();
        assert_eq!(boxed.code(), ErrorCodes::NotFound);
        assert_eq!(boxed.code().name(), "NotFoundError");
    }

    #[test]
    fn test_unmapped_io_error_is_unknown() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(err.code(), ErrorCodes::Unknown);
        assert_eq!(err.code().name(), "DumbvecError");
    }
}
