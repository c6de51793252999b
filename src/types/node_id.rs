// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `NodeId` and `Identifier`.

use std::{fmt, str::FromStr};

use crate::types::status_code::StatusCode;

/// The kind of identifier, numeric, string, guid or byte
#[derive(Eq, PartialEq, Clone, Debug, Hash, Serialize, Deserialize)]
pub enum Identifier {
    Numeric(u32),
    String(String),
    Guid(String),
    ByteString(Vec<u8>),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Identifier::Numeric(v) => write!(f, "i={}", *v),
            Identifier::String(v) => write!(f, "s={}", v),
            Identifier::Guid(v) => write!(f, "g={}", v),
            Identifier::ByteString(v) => {
                write!(f, "b=")?;
                v.iter().try_for_each(|b| write!(f, "{:02x}", b))
            }
        }
    }
}

impl FromStr for Identifier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 2 {
            Err(())
        } else {
            let k = &s[..2];
            let v = &s[2..];
            match k {
                "i=" => v.parse::<u32>().map(|v| v.into()).map_err(|_| ()),
                "s=" => Ok(Identifier::String(v.to_string())),
                "g=" => Ok(Identifier::Guid(v.to_lowercase())),
                "b=" => {
                    if v.len() % 2 != 0 {
                        return Err(());
                    }
                    (0..v.len())
                        .step_by(2)
                        .map(|i| u8::from_str_radix(&v[i..i + 2], 16).map_err(|_| ()))
                        .collect::<Result<Vec<u8>, ()>>()
                        .map(Identifier::ByteString)
                }
                _ => Err(()),
            }
        }
    }
}

impl From<u32> for Identifier {
    fn from(v: u32) -> Self {
        Identifier::Numeric(v)
    }
}

impl<'a> From<&'a str> for Identifier {
    fn from(v: &'a str) -> Self {
        Identifier::String(v.to_string())
    }
}

impl From<String> for Identifier {
    fn from(v: String) -> Self {
        Identifier::String(v)
    }
}

/// An identifier for a node in the address space of an OPC UA Server.
#[derive(PartialEq, Eq, Clone, Debug, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// The index for a namespace
    pub namespace: u16,
    /// The identifier for the node in the address space
    pub identifier: Identifier,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};{}", self.namespace, self.identifier)
        } else {
            write!(f, "{}", self.identifier)
        }
    }
}

impl FromStr for NodeId {
    type Err = StatusCode;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        use regex::Regex;

        // ns=<namespaceindex>;<type>=<value>
        //
        // Where type:
        //   i = NUMERIC
        //   s = STRING
        //   g = GUID
        //   b = OPAQUE (ByteString, hex)
        //
        // If namespace == 0, the ns=0; will be omitted

        lazy_static! {
            static ref RE: Option<Regex> =
                Regex::new(r"^(ns=(?P<ns>[0-9]+);)?(?P<t>[isgb]=.+)$").ok();
        }

        let re = RE.as_ref().ok_or(StatusCode::BadInternalError)?;
        let captures = re.captures(s).ok_or(StatusCode::BadNodeIdInvalid)?;

        let namespace = if let Some(ns) = captures.name("ns") {
            ns.as_str()
                .parse::<u16>()
                .map_err(|_| StatusCode::BadNodeIdInvalid)?
        } else {
            0
        };

        let t = captures.name("t").ok_or(StatusCode::BadNodeIdInvalid)?;
        Identifier::from_str(t.as_str())
            .map(|t| NodeId::new(namespace, t))
            .map_err(|_| StatusCode::BadNodeIdInvalid)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId::null()
    }
}

impl<'a> From<&'a str> for NodeId {
    fn from(value: &'a str) -> Self {
        (0, value).into()
    }
}

impl<'a> From<(u16, &'a str)> for NodeId {
    fn from(v: (u16, &'a str)) -> Self {
        Self::new(v.0, v.1)
    }
}

impl From<(u16, u32)> for NodeId {
    fn from(v: (u16, u32)) -> Self {
        Self::new(v.0, v.1)
    }
}

impl NodeId {
    /// Constructs a new NodeId from anything that can be turned into Identifier
    /// u32, Guid, ByteString or String
    pub fn new<T>(namespace: u16, value: T) -> NodeId
    where
        T: Into<Identifier>,
    {
        NodeId {
            namespace,
            identifier: value.into(),
        }
    }

    /// Returns a null node id
    pub fn null() -> NodeId {
        NodeId::new(0, 0u32)
    }

    /// Test if the node id is null, i.e. 0 namespace and 0 identifier
    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }

    /// Returns the numeric value of a namespace 0 node id, if that is what it is.
    pub fn as_ns0_numeric(&self) -> Option<u32> {
        match self.identifier {
            Identifier::Numeric(v) if self.namespace == 0 => Some(v),
            _ => None,
        }
    }
}

/// Well known objects and data type encodings referenced by the client.
#[allow(non_camel_case_types)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ObjectId {
    Server = 2253,
    DataChangeNotification_Encoding_DefaultBinary = 811,
    StatusChangeNotification_Encoding_DefaultBinary = 820,
    EventNotificationList_Encoding_DefaultBinary = 916,
    DataChangeFilter_Encoding_DefaultBinary = 724,
    EventFilter_Encoding_DefaultBinary = 727,
    AggregateFilter_Encoding_DefaultBinary = 730,
    AggregateFunction_Average = 2342,
}

impl From<ObjectId> for NodeId {
    fn from(v: ObjectId) -> Self {
        NodeId::new(0, v as u32)
    }
}

impl ObjectId {
    pub fn from_node_id(node_id: &NodeId) -> Option<ObjectId> {
        let v = node_id.as_ns0_numeric()?;
        [
            ObjectId::Server,
            ObjectId::DataChangeNotification_Encoding_DefaultBinary,
            ObjectId::StatusChangeNotification_Encoding_DefaultBinary,
            ObjectId::EventNotificationList_Encoding_DefaultBinary,
            ObjectId::DataChangeFilter_Encoding_DefaultBinary,
            ObjectId::EventFilter_Encoding_DefaultBinary,
            ObjectId::AggregateFilter_Encoding_DefaultBinary,
            ObjectId::AggregateFunction_Average,
        ]
        .into_iter()
        .find(|id| *id as u32 == v)
    }
}

/// Well known variables read by the client.
#[allow(non_camel_case_types)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VariableId {
    Server_ServerStatus_CurrentTime = 2258,
    Server_ServerStatus_State = 2259,
    Server_ServerCapabilities_OperationLimits_MaxNodesPerRead = 11705,
    Server_ServerCapabilities_OperationLimits_MaxNodesPerWrite = 11707,
    Server_ServerCapabilities_OperationLimits_MaxNodesPerBrowse = 11710,
    Server_ServerCapabilities_OperationLimits_MaxMonitoredItemsPerCall = 11714,
}

impl From<VariableId> for NodeId {
    fn from(v: VariableId) -> Self {
        NodeId::new(0, v as u32)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn parse_node_ids() {
        assert_eq!(NodeId::from_str("i=2259").unwrap(), NodeId::new(0, 2259u32));
        assert_eq!(
            NodeId::from_str("ns=2;s=Demo.Dynamic").unwrap(),
            NodeId::new(2, "Demo.Dynamic")
        );
        assert_eq!(
            NodeId::from_str("ns=1;b=0aff").unwrap().identifier,
            Identifier::ByteString(vec![0x0a, 0xff])
        );
        assert!(NodeId::from_str("ns=x;i=1").is_err());
        assert!(NodeId::from_str("q=1").is_err());
        assert!(NodeId::from_str("b=abc").is_err());
    }

    #[test]
    fn display_round_trips() {
        for s in ["i=2253", "ns=3;s=Counter", "ns=1;b=00ff10"] {
            assert_eq!(NodeId::from_str(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn well_known_ids() {
        let node_id: NodeId = VariableId::Server_ServerStatus_State.into();
        assert_eq!(node_id.to_string(), "i=2259");
        assert!(NodeId::null().is_null());
        assert_eq!(
            ObjectId::from_node_id(&NodeId::new(0, 916u32)),
            Some(ObjectId::EventNotificationList_Encoding_DefaultBinary)
        );
        assert_eq!(ObjectId::from_node_id(&NodeId::new(1, 916u32)), None);
    }
}
