// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Security policy names the suite of algorithms a secure channel uses. The algorithms themselves
//! belong to the transport, the client only needs to select an endpoint by policy and to know
//! whether certificates are involved at all.

use std::{fmt, str::FromStr};

pub const SECURITY_POLICY_NONE: &str = "None";
pub const SECURITY_POLICY_BASIC_128_RSA_15: &str = "Basic128Rsa15";
pub const SECURITY_POLICY_BASIC_256: &str = "Basic256";
pub const SECURITY_POLICY_BASIC_256_SHA_256: &str = "Basic256Sha256";
pub const SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP: &str = "Aes128-Sha256-RsaOaep";
pub const SECURITY_POLICY_AES_256_SHA_256_RSA_PSS: &str = "Aes256-Sha256-RsaPss";

pub const SECURITY_POLICY_NONE_URI: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";
pub const SECURITY_POLICY_BASIC_128_RSA_15_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15";
pub const SECURITY_POLICY_BASIC_256_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Basic256";
pub const SECURITY_POLICY_BASIC_256_SHA_256_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256";
pub const SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep";
pub const SECURITY_POLICY_AES_256_SHA_256_RSA_PSS_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss";

/// SecurityPolicy implies what encryption and signing algorithms and their relevant key strengths
/// are used during an encrypted session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Copy, Default, Serialize, Deserialize)]
pub enum SecurityPolicy {
    Unknown,
    #[default]
    None,
    Basic128Rsa15,
    Basic256,
    Basic256Sha256,
    Aes128Sha256RsaOaep,
    Aes256Sha256RsaPss,
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for SecurityPolicy {
    type Err = ();

    /// Accepts either the short name or the full uri. Anything else is `Unknown`, never an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            SECURITY_POLICY_NONE | SECURITY_POLICY_NONE_URI => SecurityPolicy::None,
            SECURITY_POLICY_BASIC_128_RSA_15 | SECURITY_POLICY_BASIC_128_RSA_15_URI => {
                SecurityPolicy::Basic128Rsa15
            }
            SECURITY_POLICY_BASIC_256 | SECURITY_POLICY_BASIC_256_URI => SecurityPolicy::Basic256,
            SECURITY_POLICY_BASIC_256_SHA_256 | SECURITY_POLICY_BASIC_256_SHA_256_URI => {
                SecurityPolicy::Basic256Sha256
            }
            SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP
            | SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP_URI => SecurityPolicy::Aes128Sha256RsaOaep,
            SECURITY_POLICY_AES_256_SHA_256_RSA_PSS
            | SECURITY_POLICY_AES_256_SHA_256_RSA_PSS_URI => SecurityPolicy::Aes256Sha256RsaPss,
            _ => {
                error!("Specified security policy \"{}\" is not recognized", s);
                SecurityPolicy::Unknown
            }
        })
    }
}

impl<'a> From<&'a str> for SecurityPolicy {
    fn from(value: &'a str) -> Self {
        SecurityPolicy::from_str(value).unwrap_or(SecurityPolicy::Unknown)
    }
}

impl SecurityPolicy {
    pub fn to_uri(&self) -> &'static str {
        match self {
            SecurityPolicy::None => SECURITY_POLICY_NONE_URI,
            SecurityPolicy::Basic128Rsa15 => SECURITY_POLICY_BASIC_128_RSA_15_URI,
            SecurityPolicy::Basic256 => SECURITY_POLICY_BASIC_256_URI,
            SecurityPolicy::Basic256Sha256 => SECURITY_POLICY_BASIC_256_SHA_256_URI,
            SecurityPolicy::Aes128Sha256RsaOaep => SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP_URI,
            SecurityPolicy::Aes256Sha256RsaPss => SECURITY_POLICY_AES_256_SHA_256_RSA_PSS_URI,
            SecurityPolicy::Unknown => "",
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            SecurityPolicy::None => SECURITY_POLICY_NONE,
            SecurityPolicy::Basic128Rsa15 => SECURITY_POLICY_BASIC_128_RSA_15,
            SecurityPolicy::Basic256 => SECURITY_POLICY_BASIC_256,
            SecurityPolicy::Basic256Sha256 => SECURITY_POLICY_BASIC_256_SHA_256,
            SecurityPolicy::Aes128Sha256RsaOaep => SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP,
            SecurityPolicy::Aes256Sha256RsaPss => SECURITY_POLICY_AES_256_SHA_256_RSA_PSS,
            SecurityPolicy::Unknown => "Unknown",
        }
    }

    pub fn from_uri(uri: &str) -> SecurityPolicy {
        match uri {
            SECURITY_POLICY_NONE_URI => SecurityPolicy::None,
            SECURITY_POLICY_BASIC_128_RSA_15_URI => SecurityPolicy::Basic128Rsa15,
            SECURITY_POLICY_BASIC_256_URI => SecurityPolicy::Basic256,
            SECURITY_POLICY_BASIC_256_SHA_256_URI => SecurityPolicy::Basic256Sha256,
            SECURITY_POLICY_AES_128_SHA_256_RSA_OAEP_URI => SecurityPolicy::Aes128Sha256RsaOaep,
            SECURITY_POLICY_AES_256_SHA_256_RSA_PSS_URI => SecurityPolicy::Aes256Sha256RsaPss,
            _ => {
                error!(
                    "Specified security policy uri \"{}\" is not recognized",
                    uri
                );
                SecurityPolicy::Unknown
            }
        }
    }

    /// Every policy other than `None` exchanges certificates when the channel is opened.
    pub fn requires_certificates(&self) -> bool {
        !matches!(self, SecurityPolicy::None | SecurityPolicy::Unknown)
    }

    /// Basic128Rsa15 and Basic256 are deprecated by the OPC Foundation.
    pub fn is_deprecated(&self) -> bool {
        matches!(
            self,
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256
        )
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, SecurityPolicy::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_names_and_uris() {
        for policy in [
            SecurityPolicy::None,
            SecurityPolicy::Basic128Rsa15,
            SecurityPolicy::Basic256,
            SecurityPolicy::Basic256Sha256,
            SecurityPolicy::Aes128Sha256RsaOaep,
            SecurityPolicy::Aes256Sha256RsaPss,
        ] {
            assert_eq!(SecurityPolicy::from_uri(policy.to_uri()), policy);
            assert_eq!(SecurityPolicy::from_str(policy.to_str()).unwrap(), policy);
            assert_eq!(SecurityPolicy::from_str(policy.to_uri()).unwrap(), policy);
        }
        assert_eq!(SecurityPolicy::from("xyz"), SecurityPolicy::Unknown);
        assert_eq!(SecurityPolicy::from_uri("xyz"), SecurityPolicy::Unknown);
    }

    #[test]
    fn certificates_required() {
        assert!(!SecurityPolicy::None.requires_certificates());
        assert!(SecurityPolicy::Basic256Sha256.requires_certificates());
        assert!(SecurityPolicy::Basic256.is_deprecated());
        assert!(!SecurityPolicy::Unknown.is_supported());
    }
}
