// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The StatusCode type and the named status codes the client deals with.

use std::{error::Error, fmt};

/// A 32-bit OPC UA status code. The top two bits give the severity (good, uncertain or bad), the
/// next 14 bits the sub code and the low 16 bits are informational flags.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct StatusCode(u32);

macro_rules! status_codes {
    [ $( $name:ident = $value:literal ),* $(,)? ] => {
        #[allow(non_upper_case_globals)]
        impl StatusCode {
            $( pub const $name: StatusCode = StatusCode($value); )*

            /// Returns the symbolic name of the status, ignoring any flag bits.
            #[allow(unreachable_patterns)]
            pub fn name(&self) -> &'static str {
                match self.status().0 {
                    $( $value => stringify!($name), )*
                    _ => "Unknown",
                }
            }
        }
    }
}

status_codes![
    Good = 0x0000_0000,
    GoodSubscriptionTransferred = 0x002D_0000,
    GoodNoData = 0x00A5_0000,
    Uncertain = 0x4000_0000,
    UncertainInitialValue = 0x4092_0000,
    Bad = 0x8000_0000,
    BadUnexpectedError = 0x8001_0000,
    BadInternalError = 0x8002_0000,
    BadOutOfMemory = 0x8003_0000,
    BadCommunicationError = 0x8005_0000,
    BadEncodingError = 0x8006_0000,
    BadDecodingError = 0x8007_0000,
    BadUnknownResponse = 0x8009_0000,
    BadTimeout = 0x800A_0000,
    BadServiceUnsupported = 0x800B_0000,
    BadShutdown = 0x800C_0000,
    BadServerNotConnected = 0x800D_0000,
    BadServerHalted = 0x800E_0000,
    BadNothingToDo = 0x800F_0000,
    BadTooManyOperations = 0x8010_0000,
    BadDataTypeIdUnknown = 0x8011_0000,
    BadCertificateInvalid = 0x8012_0000,
    BadSecurityChecksFailed = 0x8013_0000,
    BadCertificateUntrusted = 0x801A_0000,
    BadUserAccessDenied = 0x801F_0000,
    BadIdentityTokenInvalid = 0x8020_0000,
    BadIdentityTokenRejected = 0x8021_0000,
    BadSecureChannelIdInvalid = 0x8022_0000,
    BadNonceInvalid = 0x8024_0000,
    BadSessionIdInvalid = 0x8025_0000,
    BadSessionClosed = 0x8026_0000,
    BadSessionNotActivated = 0x8027_0000,
    BadSubscriptionIdInvalid = 0x8028_0000,
    BadRequestHeaderInvalid = 0x802A_0000,
    BadTimestampsToReturnInvalid = 0x802B_0000,
    BadRequestCancelledByClient = 0x802C_0000,
    BadNoCommunication = 0x8031_0000,
    BadWaitingForInitialData = 0x8032_0000,
    BadNodeIdInvalid = 0x8033_0000,
    BadNodeIdUnknown = 0x8034_0000,
    BadAttributeIdInvalid = 0x8035_0000,
    BadIndexRangeInvalid = 0x8036_0000,
    BadNotReadable = 0x803A_0000,
    BadNotWritable = 0x803B_0000,
    BadNotSupported = 0x803D_0000,
    BadNotFound = 0x803E_0000,
    BadMonitoredItemIdInvalid = 0x8042_0000,
    BadMonitoredItemFilterInvalid = 0x8043_0000,
    BadMonitoredItemFilterUnsupported = 0x8044_0000,
    BadFilterNotAllowed = 0x8045_0000,
    BadContinuationPointInvalid = 0x804A_0000,
    BadNoContinuationPoints = 0x804B_0000,
    BadSecurityPolicyRejected = 0x8055_0000,
    BadTooManySessions = 0x8056_0000,
    BadHistoryOperationInvalid = 0x8071_0000,
    BadTooManySubscriptions = 0x8077_0000,
    BadTooManyPublishRequests = 0x8078_0000,
    BadNoSubscription = 0x8079_0000,
    BadSequenceNumberUnknown = 0x807A_0000,
    BadMessageNotAvailable = 0x807B_0000,
    BadTcpEndpointUrlInvalid = 0x8083_0000,
    BadRequestInterrupted = 0x8084_0000,
    BadRequestTimeout = 0x8085_0000,
    BadSecureChannelClosed = 0x8086_0000,
    BadSecureChannelTokenUnknown = 0x8087_0000,
    BadConfigurationError = 0x8089_0000,
    BadNotConnected = 0x808A_0000,
    BadInvalidArgument = 0x80AB_0000,
    BadConnectionRejected = 0x80AC_0000,
    BadDisconnect = 0x80AD_0000,
    BadConnectionClosed = 0x80AE_0000,
    BadInvalidState = 0x80AF_0000,
    BadEndOfStream = 0x80B0_0000,
    BadRequestTooLarge = 0x80B8_0000,
    BadResponseTooLarge = 0x80B9_0000,
    BadTooManyMonitoredItems = 0x80DB_0000,
    BadDataUnavailable = 0x80F5_0000,
];

impl StatusCode {
    pub const IS_ERROR: u32 = 0x8000_0000;
    pub const IS_UNCERTAIN: u32 = 0x4000_0000;
    pub const STATUS_MASK: u32 = 0xFFFF_0000;
    pub const BIT_MASK: u32 = 0x0000_FFFF;

    /// Constructs a status code from its raw value.
    pub const fn from_u32(value: u32) -> StatusCode {
        StatusCode(value)
    }

    /// The raw value of the status code.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns the bit flags of the status code, i.e. it masks out the actual status code value
    pub fn bitflags(&self) -> u32 {
        self.0 & Self::BIT_MASK
    }

    /// Returns the status only, i.e. it masks out any bit flags that come with the status code
    pub fn status(&self) -> StatusCode {
        StatusCode(self.0 & Self::STATUS_MASK)
    }

    /// Tests if the status code is bad
    pub fn is_bad(&self) -> bool {
        self.0 & Self::IS_ERROR != 0
    }

    /// Tests if the status code is uncertain
    pub fn is_uncertain(&self) -> bool {
        self.0 & (Self::IS_ERROR | Self::IS_UNCERTAIN) == Self::IS_UNCERTAIN
    }

    /// Tests if the status code is good (i.e. not bad or uncertain)
    pub fn is_good(&self) -> bool {
        !self.is_bad() && !self.is_uncertain()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bits = self.bitflags();
        if bits == 0 {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}+{:#06x}", self.name(), bits)
        }
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({:#010x})", self, self.0)
    }
}

impl Error for StatusCode {}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        StatusCode(value)
    }
}

impl From<StatusCode> for u32 {
    fn from(value: StatusCode) -> Self {
        value.0
    }
}

impl From<std::io::Error> for StatusCode {
    fn from(err: std::io::Error) -> Self {
        trace!("Converting io error {:?} to a status code", err);
        match err.kind() {
            std::io::ErrorKind::TimedOut => StatusCode::BadTimeout,
            std::io::ErrorKind::NotConnected => StatusCode::BadNotConnected,
            std::io::ErrorKind::ConnectionRefused => StatusCode::BadConnectionRejected,
            std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
                StatusCode::BadConnectionClosed
            }
            _ => StatusCode::BadCommunicationError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StatusCode;

    #[test]
    fn severity() {
        assert!(StatusCode::Good.is_good());
        assert!(StatusCode::GoodSubscriptionTransferred.is_good());
        assert!(StatusCode::UncertainInitialValue.is_uncertain());
        assert!(!StatusCode::UncertainInitialValue.is_bad());
        assert!(StatusCode::BadTimeout.is_bad());
        assert!(!StatusCode::BadTimeout.is_uncertain());
        assert!(!StatusCode::BadTimeout.is_good());
    }

    #[test]
    fn display_includes_flags() {
        assert_eq!(StatusCode::BadSessionIdInvalid.to_string(), "BadSessionIdInvalid");
        let with_flags = StatusCode::from_u32(StatusCode::BadTimeout.bits() | 0x0400);
        assert_eq!(with_flags.status(), StatusCode::BadTimeout);
        assert_eq!(with_flags.to_string(), "BadTimeout+0x0400");
        assert_eq!(StatusCode::from_u32(0x8FFF_0000).name(), "Unknown");
    }

    #[test]
    fn usable_in_patterns() {
        let matched = match StatusCode::BadNoSubscription {
            StatusCode::BadSessionClosed | StatusCode::BadSessionIdInvalid => 1,
            StatusCode::BadNoSubscription => 2,
            _ => 3,
        };
        assert_eq!(matched, 2);
    }
}
