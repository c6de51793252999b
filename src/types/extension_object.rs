// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the `ExtensionObject`, an opaque structure identified by the node id of its encoding.

use crate::types::{node_id::NodeId, status_code::StatusCode};

/// Enumeration that holds the kinds of encoding that an ExtensionObject data may be encoded with.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub enum ExtensionObjectEncoding {
    /// For an extension object with nothing encoded with it
    None,
    /// For an extension object with data encoded in a ByteString. Decoding it is the business of
    /// the transport's codec.
    ByteString(Vec<u8>),
    /// For an extension object with data encoded as JSON
    Json(serde_json::Value),
}

/// An extension object holds a serialized object identified by its node id.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionObject {
    pub node_id: NodeId,
    pub body: ExtensionObjectEncoding,
}

impl ExtensionObject {
    /// Creates a null extension object, i.e. one with no value or payload
    pub fn null() -> ExtensionObject {
        ExtensionObject {
            node_id: NodeId::null(),
            body: ExtensionObjectEncoding::None,
        }
    }

    /// Tests for null node id.
    pub fn is_null(&self) -> bool {
        self.node_id.is_null()
    }

    /// Creates an extension object with the specified node id and the value serialized to JSON as
    /// its payload.
    pub fn from_json<N, T>(node_id: N, value: &T) -> Result<ExtensionObject, StatusCode>
    where
        N: Into<NodeId>,
        T: serde::Serialize,
    {
        let body = serde_json::to_value(value).map_err(|err| {
            error!("Cannot serialize extension object body, error = {}", err);
            StatusCode::BadEncodingError
        })?;
        Ok(ExtensionObject {
            node_id: node_id.into(),
            body: ExtensionObjectEncoding::Json(body),
        })
    }

    /// Decodes the inner content of the extension object and returns it. The node id is ignored
    /// for decoding. Only JSON bodies can be decoded here.
    pub fn decode_inner<T>(&self) -> Result<T, StatusCode>
    where
        T: serde::de::DeserializeOwned,
    {
        match self.body {
            ExtensionObjectEncoding::Json(ref value) => {
                serde_json::from_value::<T>(value.clone()).map_err(|err| {
                    error!(
                        "Cannot decode extension object {}, error = {}",
                        self.node_id, err
                    );
                    StatusCode::BadDecodingError
                })
            }
            ExtensionObjectEncoding::ByteString(_) => {
                warn!(
                    "Extension object {} has a binary body which must be decoded by the transport",
                    self.node_id
                );
                Err(StatusCode::BadDecodingError)
            }
            ExtensionObjectEncoding::None => Err(StatusCode::BadDecodingError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[test]
    fn json_body() {
        let v = Sample {
            a: 1,
            b: "x".into(),
        };
        let eo = ExtensionObject::from_json((1, 100u32), &v).unwrap();
        assert_eq!(eo.decode_inner::<Sample>().unwrap(), v);
        assert!(eo.decode_inner::<u32>().is_err());
    }

    #[test]
    fn binary_body_is_not_decoded() {
        let eo = ExtensionObject {
            node_id: NodeId::new(0, 811u32),
            body: ExtensionObjectEncoding::ByteString(vec![1, 2, 3]),
        };
        assert_eq!(
            eo.decode_inner::<Sample>().unwrap_err(),
            StatusCode::BadDecodingError
        );
        assert!(ExtensionObject::null().is_null());
    }
}
