// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA error taxonomy.
//!
//! Every failure reported by the protocol stack carries a status code. The
//! client facade never inspects raw codes when deciding what to do next.
//! Instead it asks [`classify`] for an [`ErrorKind`] and [`is_retryable`] for
//! the retry decision, so translation and retry policy can be tested apart.
//!
//! # Error Kinds
//!
//! ```text
//! ErrorKind
//! ├── Transport (retried once with a fresh session)
//! │   ├── Connection
//! │   ├── ServerBusy
//! │   ├── Protocol
//! │   ├── Communication
//! │   └── Timeout
//! ├── Application (never retried)
//! │   ├── InvalidOperation
//! │   ├── ArgumentError
//! │   ├── Format
//! │   ├── NotSupported
//! │   └── NotImplemented
//! ├── Security (never retried)
//! │   ├── CertificateInvalid
//! │   ├── CertificateUntrusted
//! │   └── UnauthorizedAccess
//! └── BadRequest (catch-all)
//! ```
//!
//! # Examples
//!
//! ```
//! use uareg_opcua::error::{classify, is_retryable, status, ErrorKind};
//!
//! let kind = classify(status::BAD_SESSION_CLOSED);
//! assert_eq!(kind, ErrorKind::Communication);
//! assert!(is_retryable(kind));
//!
//! assert!(!is_retryable(classify(status::BAD_NOT_WRITABLE)));
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use uareg_core::RegistryError;

// =============================================================================
// Status Codes
// =============================================================================

/// OPC UA status codes the taxonomy distinguishes.
///
/// Only the severity and sub-code bits (the upper 16 bits) take part in
/// classification; info bits are masked off.
pub mod status {
    #![allow(missing_docs)]

    pub const GOOD: u32 = 0x0000_0000;
    pub const BAD: u32 = 0x8000_0000;

    pub const BAD_COMMUNICATION_ERROR: u32 = 0x8005_0000;
    pub const BAD_ENCODING_ERROR: u32 = 0x8006_0000;
    pub const BAD_DECODING_ERROR: u32 = 0x8007_0000;
    pub const BAD_ENCODING_LIMITS_EXCEEDED: u32 = 0x8008_0000;
    pub const BAD_TIMEOUT: u32 = 0x800A_0000;
    pub const BAD_SERVICE_UNSUPPORTED: u32 = 0x800B_0000;
    pub const BAD_CERTIFICATE_INVALID: u32 = 0x8012_0000;
    pub const BAD_CERTIFICATE_TIME_INVALID: u32 = 0x8014_0000;
    pub const BAD_CERTIFICATE_ISSUER_TIME_INVALID: u32 = 0x8015_0000;
    pub const BAD_CERTIFICATE_HOST_NAME_INVALID: u32 = 0x8016_0000;
    pub const BAD_CERTIFICATE_URI_INVALID: u32 = 0x8017_0000;
    pub const BAD_CERTIFICATE_USE_NOT_ALLOWED: u32 = 0x8018_0000;
    pub const BAD_CERTIFICATE_ISSUER_USE_NOT_ALLOWED: u32 = 0x8019_0000;
    pub const BAD_CERTIFICATE_UNTRUSTED: u32 = 0x801A_0000;
    pub const BAD_CERTIFICATE_REVOCATION_UNKNOWN: u32 = 0x801B_0000;
    pub const BAD_CERTIFICATE_ISSUER_REVOCATION_UNKNOWN: u32 = 0x801C_0000;
    pub const BAD_CERTIFICATE_REVOKED: u32 = 0x801D_0000;
    pub const BAD_CERTIFICATE_ISSUER_REVOKED: u32 = 0x801E_0000;
    pub const BAD_USER_ACCESS_DENIED: u32 = 0x801F_0000;
    pub const BAD_IDENTITY_TOKEN_INVALID: u32 = 0x8020_0000;
    pub const BAD_IDENTITY_TOKEN_REJECTED: u32 = 0x8021_0000;
    pub const BAD_SECURE_CHANNEL_ID_INVALID: u32 = 0x8022_0000;
    pub const BAD_NONCE_INVALID: u32 = 0x8024_0000;
    pub const BAD_SESSION_ID_INVALID: u32 = 0x8025_0000;
    pub const BAD_SESSION_CLOSED: u32 = 0x8026_0000;
    pub const BAD_NODE_ID_UNKNOWN: u32 = 0x8034_0000;
    pub const BAD_DATA_ENCODING_INVALID: u32 = 0x8038_0000;
    pub const BAD_DATA_ENCODING_UNSUPPORTED: u32 = 0x8039_0000;
    pub const BAD_NOT_READABLE: u32 = 0x803A_0000;
    pub const BAD_NOT_WRITABLE: u32 = 0x803B_0000;
    pub const BAD_OUT_OF_RANGE: u32 = 0x803C_0000;
    pub const BAD_NOT_SUPPORTED: u32 = 0x803D_0000;
    pub const BAD_NOT_IMPLEMENTED: u32 = 0x8040_0000;
    pub const BAD_SECURITY_MODE_REJECTED: u32 = 0x8054_0000;
    pub const BAD_SECURITY_POLICY_REJECTED: u32 = 0x8055_0000;
    pub const BAD_TOO_MANY_SESSIONS: u32 = 0x8056_0000;
    pub const BAD_NO_VALID_CERTIFICATES: u32 = 0x8059_0000;
    pub const BAD_WRITE_NOT_SUPPORTED: u32 = 0x8073_0000;
    pub const BAD_TYPE_MISMATCH: u32 = 0x8074_0000;
    pub const BAD_METHOD_INVALID: u32 = 0x8075_0000;
    pub const BAD_ARGUMENTS_MISSING: u32 = 0x8076_0000;
    pub const BAD_SEQUENCE_NUMBER_UNKNOWN: u32 = 0x807A_0000;
    pub const BAD_TCP_SERVER_TOO_BUSY: u32 = 0x807D_0000;
    pub const BAD_TCP_MESSAGE_TYPE_INVALID: u32 = 0x807E_0000;
    pub const BAD_TCP_MESSAGE_TOO_LARGE: u32 = 0x8080_0000;
    pub const BAD_TCP_NOT_ENOUGH_RESOURCES: u32 = 0x8081_0000;
    pub const BAD_TCP_INTERNAL_ERROR: u32 = 0x8082_0000;
    pub const BAD_TCP_ENDPOINT_URL_INVALID: u32 = 0x8083_0000;
    pub const BAD_REQUEST_TIMEOUT: u32 = 0x8085_0000;
    pub const BAD_SECURE_CHANNEL_CLOSED: u32 = 0x8086_0000;
    pub const BAD_SECURE_CHANNEL_TOKEN_UNKNOWN: u32 = 0x8087_0000;
    pub const BAD_SEQUENCE_NUMBER_INVALID: u32 = 0x8088_0000;
    pub const BAD_NOT_CONNECTED: u32 = 0x808A_0000;
    pub const BAD_INVALID_ARGUMENT: u32 = 0x80AB_0000;
    pub const BAD_CONNECTION_REJECTED: u32 = 0x80AC_0000;
    pub const BAD_DISCONNECT: u32 = 0x80AD_0000;
    pub const BAD_CONNECTION_CLOSED: u32 = 0x80AE_0000;
    pub const BAD_REQUEST_TOO_LARGE: u32 = 0x80B8_0000;
    pub const BAD_RESPONSE_TOO_LARGE: u32 = 0x80B9_0000;
    pub const BAD_PROTOCOL_VERSION_UNSUPPORTED: u32 = 0x80BE_0000;
    pub const BAD_REQUEST_NOT_ALLOWED: u32 = 0x80E4_0000;
    pub const BAD_TOO_MANY_ARGUMENTS: u32 = 0x80E5_0000;
    pub const BAD_CERTIFICATE_CHAIN_INCOMPLETE: u32 = 0x810D_0000;
    pub const BAD_LICENSE_EXPIRED: u32 = 0x810E_0000;
    pub const BAD_LICENSE_LIMITS_EXCEEDED: u32 = 0x810F_0000;
    pub const BAD_LICENSE_NOT_AVAILABLE: u32 = 0x8110_0000;

    /// Mask selecting the severity and sub-code bits.
    pub const CODE_MASK: u32 = 0xFFFF_0000;

    /// Returns `true` if the severity bits mark the code as bad.
    #[inline]
    pub const fn is_bad(code: u32) -> bool {
        code & 0x8000_0000 != 0
    }

    /// Returns `true` if the severity bits mark the code as good.
    #[inline]
    pub const fn is_good(code: u32) -> bool {
        code & 0xC000_0000 == 0
    }
}

/// Returns the symbolic name of a status code.
pub fn status_code_name(code: u32) -> &'static str {
    use status::*;

    match code & CODE_MASK {
        GOOD => "Good",
        BAD => "Bad",
        BAD_COMMUNICATION_ERROR => "BadCommunicationError",
        BAD_ENCODING_ERROR => "BadEncodingError",
        BAD_DECODING_ERROR => "BadDecodingError",
        BAD_ENCODING_LIMITS_EXCEEDED => "BadEncodingLimitsExceeded",
        BAD_TIMEOUT => "BadTimeout",
        BAD_SERVICE_UNSUPPORTED => "BadServiceUnsupported",
        BAD_CERTIFICATE_INVALID => "BadCertificateInvalid",
        BAD_CERTIFICATE_TIME_INVALID => "BadCertificateTimeInvalid",
        BAD_CERTIFICATE_ISSUER_TIME_INVALID => "BadCertificateIssuerTimeInvalid",
        BAD_CERTIFICATE_HOST_NAME_INVALID => "BadCertificateHostNameInvalid",
        BAD_CERTIFICATE_URI_INVALID => "BadCertificateUriInvalid",
        BAD_CERTIFICATE_USE_NOT_ALLOWED => "BadCertificateUseNotAllowed",
        BAD_CERTIFICATE_ISSUER_USE_NOT_ALLOWED => "BadCertificateIssuerUseNotAllowed",
        BAD_CERTIFICATE_UNTRUSTED => "BadCertificateUntrusted",
        BAD_CERTIFICATE_REVOCATION_UNKNOWN => "BadCertificateRevocationUnknown",
        BAD_CERTIFICATE_ISSUER_REVOCATION_UNKNOWN => "BadCertificateIssuerRevocationUnknown",
        BAD_CERTIFICATE_REVOKED => "BadCertificateRevoked",
        BAD_CERTIFICATE_ISSUER_REVOKED => "BadCertificateIssuerRevoked",
        BAD_USER_ACCESS_DENIED => "BadUserAccessDenied",
        BAD_IDENTITY_TOKEN_INVALID => "BadIdentityTokenInvalid",
        BAD_IDENTITY_TOKEN_REJECTED => "BadIdentityTokenRejected",
        BAD_SECURE_CHANNEL_ID_INVALID => "BadSecureChannelIdInvalid",
        BAD_NONCE_INVALID => "BadNonceInvalid",
        BAD_SESSION_ID_INVALID => "BadSessionIdInvalid",
        BAD_SESSION_CLOSED => "BadSessionClosed",
        BAD_NODE_ID_UNKNOWN => "BadNodeIdUnknown",
        BAD_DATA_ENCODING_INVALID => "BadDataEncodingInvalid",
        BAD_DATA_ENCODING_UNSUPPORTED => "BadDataEncodingUnsupported",
        BAD_NOT_READABLE => "BadNotReadable",
        BAD_NOT_WRITABLE => "BadNotWritable",
        BAD_OUT_OF_RANGE => "BadOutOfRange",
        BAD_NOT_SUPPORTED => "BadNotSupported",
        BAD_NOT_IMPLEMENTED => "BadNotImplemented",
        BAD_SECURITY_MODE_REJECTED => "BadSecurityModeRejected",
        BAD_SECURITY_POLICY_REJECTED => "BadSecurityPolicyRejected",
        BAD_TOO_MANY_SESSIONS => "BadTooManySessions",
        BAD_NO_VALID_CERTIFICATES => "BadNoValidCertificates",
        BAD_WRITE_NOT_SUPPORTED => "BadWriteNotSupported",
        BAD_TYPE_MISMATCH => "BadTypeMismatch",
        BAD_METHOD_INVALID => "BadMethodInvalid",
        BAD_ARGUMENTS_MISSING => "BadArgumentsMissing",
        BAD_SEQUENCE_NUMBER_UNKNOWN => "BadSequenceNumberUnknown",
        BAD_TCP_SERVER_TOO_BUSY => "BadTcpServerTooBusy",
        BAD_TCP_MESSAGE_TYPE_INVALID => "BadTcpMessageTypeInvalid",
        BAD_TCP_MESSAGE_TOO_LARGE => "BadTcpMessageTooLarge",
        BAD_TCP_NOT_ENOUGH_RESOURCES => "BadTcpNotEnoughResources",
        BAD_TCP_INTERNAL_ERROR => "BadTcpInternalError",
        BAD_TCP_ENDPOINT_URL_INVALID => "BadTcpEndpointUrlInvalid",
        BAD_REQUEST_TIMEOUT => "BadRequestTimeout",
        BAD_SECURE_CHANNEL_CLOSED => "BadSecureChannelClosed",
        BAD_SECURE_CHANNEL_TOKEN_UNKNOWN => "BadSecureChannelTokenUnknown",
        BAD_SEQUENCE_NUMBER_INVALID => "BadSequenceNumberInvalid",
        BAD_NOT_CONNECTED => "BadNotConnected",
        BAD_INVALID_ARGUMENT => "BadInvalidArgument",
        BAD_CONNECTION_REJECTED => "BadConnectionRejected",
        BAD_DISCONNECT => "BadDisconnect",
        BAD_CONNECTION_CLOSED => "BadConnectionClosed",
        BAD_REQUEST_TOO_LARGE => "BadRequestTooLarge",
        BAD_RESPONSE_TOO_LARGE => "BadResponseTooLarge",
        BAD_PROTOCOL_VERSION_UNSUPPORTED => "BadProtocolVersionUnsupported",
        BAD_REQUEST_NOT_ALLOWED => "BadRequestNotAllowed",
        BAD_TOO_MANY_ARGUMENTS => "BadTooManyArguments",
        BAD_CERTIFICATE_CHAIN_INCOMPLETE => "BadCertificateChainIncomplete",
        BAD_LICENSE_EXPIRED => "BadLicenseExpired",
        BAD_LICENSE_LIMITS_EXCEEDED => "BadLicenseLimitsExceeded",
        BAD_LICENSE_NOT_AVAILABLE => "BadLicenseNotAvailable",
        _ => "Unknown",
    }
}

// =============================================================================
// ErrorKind
// =============================================================================

/// Classification of an OPC UA failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Endpoint unreachable or connection refused.
    Connection,
    /// Server rejected the request due to load.
    ServerBusy,
    /// Wire protocol violation.
    Protocol,
    /// Secure channel or session dropped.
    Communication,
    /// Request timed out.
    Timeout,
    /// Operation not permitted on the target node.
    InvalidOperation,
    /// Bad request argument.
    ArgumentError,
    /// Certificate rejected.
    CertificateInvalid,
    /// Certificate not trusted.
    CertificateUntrusted,
    /// Identity rejected.
    UnauthorizedAccess,
    /// Encoding or decoding failure.
    Format,
    /// Service or encoding unsupported.
    NotSupported,
    /// Service not implemented by the server.
    NotImplemented,
    /// Any other bad status.
    BadRequest,
}

impl ErrorKind {
    /// Returns `true` if the failure is transport-class.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        is_retryable(*self)
    }

    /// Returns `true` for certificate and identity failures.
    #[inline]
    pub fn is_security(&self) -> bool {
        matches!(
            self,
            Self::CertificateInvalid | Self::CertificateUntrusted | Self::UnauthorizedAccess
        )
    }

    /// Returns the kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "Connection",
            Self::ServerBusy => "ServerBusy",
            Self::Protocol => "Protocol",
            Self::Communication => "Communication",
            Self::Timeout => "Timeout",
            Self::InvalidOperation => "InvalidOperation",
            Self::ArgumentError => "ArgumentError",
            Self::CertificateInvalid => "CertificateInvalid",
            Self::CertificateUntrusted => "CertificateUntrusted",
            Self::UnauthorizedAccess => "UnauthorizedAccess",
            Self::Format => "Format",
            Self::NotSupported => "NotSupported",
            Self::NotImplemented => "NotImplemented",
            Self::BadRequest => "BadRequest",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Maps a protocol status code to exactly one [`ErrorKind`].
pub fn classify(status_code: u32) -> ErrorKind {
    use status::*;

    match status_code & CODE_MASK {
        BAD_PROTOCOL_VERSION_UNSUPPORTED
        | BAD_CONNECTION_CLOSED
        | BAD_NOT_CONNECTED
        | BAD_TCP_ENDPOINT_URL_INVALID
        | BAD_CONNECTION_REJECTED
        | BAD_SECURITY_MODE_REJECTED
        | BAD_SECURITY_POLICY_REJECTED => ErrorKind::Connection,

        BAD_LICENSE_LIMITS_EXCEEDED | BAD_TCP_SERVER_TOO_BUSY | BAD_TOO_MANY_SESSIONS => {
            ErrorKind::ServerBusy
        }

        BAD_TCP_MESSAGE_TYPE_INVALID
        | BAD_TCP_MESSAGE_TOO_LARGE
        | BAD_SEQUENCE_NUMBER_UNKNOWN
        | BAD_SEQUENCE_NUMBER_INVALID
        | BAD_NONCE_INVALID => ErrorKind::Protocol,

        BAD_SECURE_CHANNEL_CLOSED
        | BAD_SECURE_CHANNEL_TOKEN_UNKNOWN
        | BAD_SECURE_CHANNEL_ID_INVALID
        | BAD_COMMUNICATION_ERROR
        | BAD_TCP_NOT_ENOUGH_RESOURCES
        | BAD_TCP_INTERNAL_ERROR
        | BAD_SESSION_CLOSED
        | BAD_SESSION_ID_INVALID
        | BAD_DISCONNECT => ErrorKind::Communication,

        BAD_TIMEOUT | BAD_REQUEST_TIMEOUT => ErrorKind::Timeout,

        BAD_WRITE_NOT_SUPPORTED | BAD_METHOD_INVALID | BAD_NOT_READABLE | BAD_NOT_WRITABLE => {
            ErrorKind::InvalidOperation
        }

        BAD_TYPE_MISMATCH
        | BAD_ARGUMENTS_MISSING
        | BAD_INVALID_ARGUMENT
        | BAD_TOO_MANY_ARGUMENTS
        | BAD_OUT_OF_RANGE => ErrorKind::ArgumentError,

        BAD_CERTIFICATE_REVOCATION_UNKNOWN
        | BAD_CERTIFICATE_ISSUER_REVOCATION_UNKNOWN
        | BAD_CERTIFICATE_REVOKED
        | BAD_CERTIFICATE_ISSUER_REVOKED
        | BAD_CERTIFICATE_CHAIN_INCOMPLETE
        | BAD_CERTIFICATE_ISSUER_USE_NOT_ALLOWED
        | BAD_CERTIFICATE_USE_NOT_ALLOWED
        | BAD_CERTIFICATE_URI_INVALID
        | BAD_CERTIFICATE_TIME_INVALID
        | BAD_CERTIFICATE_ISSUER_TIME_INVALID
        | BAD_CERTIFICATE_INVALID
        | BAD_CERTIFICATE_HOST_NAME_INVALID
        | BAD_NO_VALID_CERTIFICATES => ErrorKind::CertificateInvalid,

        BAD_CERTIFICATE_UNTRUSTED => ErrorKind::CertificateUntrusted,

        BAD_USER_ACCESS_DENIED
        | BAD_IDENTITY_TOKEN_INVALID
        | BAD_IDENTITY_TOKEN_REJECTED
        | BAD_REQUEST_NOT_ALLOWED
        | BAD_LICENSE_EXPIRED
        | BAD_LICENSE_NOT_AVAILABLE => ErrorKind::UnauthorizedAccess,

        BAD_ENCODING_ERROR
        | BAD_DECODING_ERROR
        | BAD_ENCODING_LIMITS_EXCEEDED
        | BAD_REQUEST_TOO_LARGE
        | BAD_RESPONSE_TOO_LARGE
        | BAD_DATA_ENCODING_INVALID => ErrorKind::Format,

        BAD_DATA_ENCODING_UNSUPPORTED | BAD_SERVICE_UNSUPPORTED | BAD_NOT_SUPPORTED => {
            ErrorKind::NotSupported
        }

        BAD_NOT_IMPLEMENTED => ErrorKind::NotImplemented,

        _ => ErrorKind::BadRequest,
    }
}

/// Returns `true` for the transport-class kinds that earn one retry.
#[inline]
pub fn is_retryable(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ServerBusy
            | ErrorKind::Timeout
            | ErrorKind::Connection
            | ErrorKind::Protocol
            | ErrorKind::Communication
    )
}

// =============================================================================
// OpcUaError
// =============================================================================

/// Result type for OPC UA operations.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

/// Error raised by the OPC UA client layer.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// The server or stack answered with a bad status code.
    #[error("{kind}: {name} (0x{status_code:08X}){}", context_suffix(.context))]
    Status {
        /// Classified kind.
        kind: ErrorKind,
        /// Raw status code.
        status_code: u32,
        /// Symbolic name of the status code.
        name: &'static str,
        /// Optional context (node, endpoint).
        context: Option<String>,
    },

    /// No session could be established or no endpoint was usable.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// The call was rejected before reaching the server.
    #[error("Invalid argument '{argument}': {message}")]
    Argument {
        /// Argument name.
        argument: String,
        /// Error message.
        message: String,
    },

    /// A client side deadline elapsed.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The protocol stack failed without a status code.
    #[error("OPC UA stack error: {message}")]
    Stack {
        /// Error message.
        message: String,
    },
}

fn context_suffix(context: &Option<String>) -> String {
    match context {
        Some(context) => format!(" [{}]", context),
        None => String::new(),
    }
}

impl OpcUaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates an error from a bad status code.
    pub fn status(status_code: u32) -> Self {
        Self::Status {
            kind: classify(status_code),
            status_code,
            name: status_code_name(status_code),
            context: None,
        }
    }

    /// Creates an error from a bad status code with context.
    pub fn status_with_context(status_code: u32, context: impl Into<String>) -> Self {
        Self::Status {
            kind: classify(status_code),
            status_code,
            name: status_code_name(status_code),
            context: Some(context.into()),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates an argument error.
    #[inline]
    pub fn argument(argument: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Argument {
            argument: argument.into(),
            message: message.into(),
        }
    }

    /// Creates a stack error.
    #[inline]
    pub fn stack(message: impl Into<String>) -> Self {
        Self::Stack {
            message: message.into(),
        }
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns the classified kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Status { kind, .. } => *kind,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Argument { .. } => ErrorKind::ArgumentError,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Stack { .. } => ErrorKind::BadRequest,
        }
    }

    /// Returns `true` if the failure earns a retry with a fresh session.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        is_retryable(self.kind())
    }

    /// Returns the raw status code, if any.
    pub fn status_code(&self) -> Option<u32> {
        match self {
            Self::Status { status_code, .. } => Some(*status_code),
            Self::Timeout(_) => Some(status::BAD_TIMEOUT),
            _ => None,
        }
    }
}

impl From<OpcUaError> for RegistryError {
    fn from(error: OpcUaError) -> Self {
        match error.kind() {
            ErrorKind::ArgumentError | ErrorKind::Format => {
                let argument = match &error {
                    OpcUaError::Argument { argument, .. } => argument.clone(),
                    _ => "request".to_string(),
                };
                RegistryError::argument(argument, error.to_string())
            }
            ErrorKind::InvalidOperation => RegistryError::invalid_state(error.to_string()),
            _ if error.status_code() == Some(status::BAD_NODE_ID_UNKNOWN) => {
                RegistryError::not_found(error.to_string())
            }
            _ => RegistryError::external("opcua", error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kinds_are_retryable() {
        for code in [
            status::BAD_CONNECTION_REJECTED,
            status::BAD_TCP_SERVER_TOO_BUSY,
            status::BAD_NONCE_INVALID,
            status::BAD_SECURE_CHANNEL_CLOSED,
            status::BAD_REQUEST_TIMEOUT,
        ] {
            assert!(is_retryable(classify(code)), "{}", status_code_name(code));
        }
    }

    #[test]
    fn test_application_kinds_are_not_retryable() {
        assert_eq!(classify(status::BAD_NOT_WRITABLE), ErrorKind::InvalidOperation);
        assert_eq!(classify(status::BAD_TYPE_MISMATCH), ErrorKind::ArgumentError);
        assert_eq!(
            classify(status::BAD_CERTIFICATE_UNTRUSTED),
            ErrorKind::CertificateUntrusted
        );
        assert_eq!(
            classify(status::BAD_CERTIFICATE_CHAIN_INCOMPLETE),
            ErrorKind::CertificateInvalid
        );
        assert_eq!(classify(status::BAD_LICENSE_EXPIRED), ErrorKind::UnauthorizedAccess);
        assert_eq!(classify(status::BAD_DECODING_ERROR), ErrorKind::Format);
        assert_eq!(classify(status::BAD_SERVICE_UNSUPPORTED), ErrorKind::NotSupported);
        assert_eq!(classify(status::BAD_NOT_IMPLEMENTED), ErrorKind::NotImplemented);

        for kind in [
            ErrorKind::InvalidOperation,
            ErrorKind::ArgumentError,
            ErrorKind::CertificateInvalid,
            ErrorKind::CertificateUntrusted,
            ErrorKind::UnauthorizedAccess,
            ErrorKind::Format,
            ErrorKind::NotSupported,
            ErrorKind::NotImplemented,
            ErrorKind::BadRequest,
        ] {
            assert!(!is_retryable(kind), "{}", kind);
        }
    }

    #[test]
    fn test_unknown_code_is_bad_request() {
        assert_eq!(classify(status::BAD_NODE_ID_UNKNOWN), ErrorKind::BadRequest);
        assert_eq!(classify(0x80FF_0000), ErrorKind::BadRequest);
    }

    #[test]
    fn test_info_bits_are_ignored() {
        assert_eq!(classify(status::BAD_TIMEOUT | 0x0400), ErrorKind::Timeout);
        assert_eq!(status_code_name(status::BAD_TIMEOUT | 0x0400), "BadTimeout");
    }

    #[test]
    fn test_error_display_and_kind() {
        let error = OpcUaError::status_with_context(status::BAD_SESSION_CLOSED, "opc.tcp://a:4840");
        assert_eq!(error.kind(), ErrorKind::Communication);
        assert!(error.is_retryable());
        assert_eq!(
            error.to_string(),
            "Communication: BadSessionClosed (0x80260000) [opc.tcp://a:4840]"
        );

        assert!(OpcUaError::connection("no endpoint").is_retryable());
        assert!(!OpcUaError::argument("url", "empty").is_retryable());
    }

    #[test]
    fn test_conversion_to_registry_error() {
        let error: RegistryError = OpcUaError::argument("url", "empty").into();
        assert_eq!(error.category(), "argument");

        let error: RegistryError = OpcUaError::status(status::BAD_NOT_WRITABLE).into();
        assert_eq!(error.category(), "resource_invalid_state");

        let error: RegistryError = OpcUaError::status(status::BAD_NODE_ID_UNKNOWN).into();
        assert!(error.is_not_found());

        let error: RegistryError = OpcUaError::status(status::BAD_TIMEOUT).into();
        assert_eq!(error.category(), "external");
    }
}
