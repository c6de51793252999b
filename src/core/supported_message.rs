// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Defines all messages, request or response that are supported by the client. The
//! SupportedMessage enumeration contains a value for each of those messages enabling them to be
//! passed to and from the transport in an agnostic fashion.

use crate::types::service_types::*;

/// This macro helps avoid tedious repetition as new messages are added. Requests are listed
/// separately from responses so the header accessors can be generated for each side.
macro_rules! supported_messages {
    (
        requests: [ $( $req:ident ),* $(,)? ],
        responses: [ $( $resp:ident ),* $(,)? ]
    ) => {
        #[derive(Debug, PartialEq, Clone)]
        pub enum SupportedMessage {
            $( $req(Box<$req>), )*
            $( $resp(Box<$resp>), )*
        }

        $(
            impl From<$req> for SupportedMessage {
                fn from(value: $req) -> Self {
                    SupportedMessage::$req(Box::new(value))
                }
            }
        )*

        $(
            impl From<$resp> for SupportedMessage {
                fn from(value: $resp) -> Self {
                    SupportedMessage::$resp(Box::new(value))
                }
            }
        )*

        impl SupportedMessage {
            /// The name of the message type, e.g. `"ReadRequest"`.
            pub fn type_name(&self) -> &'static str {
                match self {
                    $( SupportedMessage::$req(_) => stringify!($req), )*
                    $( SupportedMessage::$resp(_) => stringify!($resp), )*
                }
            }

            pub fn is_request(&self) -> bool {
                match self {
                    $( SupportedMessage::$req(_) => true, )*
                    _ => false,
                }
            }

            pub fn request_header(&self) -> Option<&RequestHeader> {
                match self {
                    $( SupportedMessage::$req(r) => Some(&r.request_header), )*
                    _ => None,
                }
            }

            pub fn request_header_mut(&mut self) -> Option<&mut RequestHeader> {
                match self {
                    $( SupportedMessage::$req(r) => Some(&mut r.request_header), )*
                    _ => None,
                }
            }

            pub fn response_header(&self) -> Option<&ResponseHeader> {
                match self {
                    $( SupportedMessage::$resp(r) => Some(&r.response_header), )*
                    _ => None,
                }
            }
        }
    };
}

supported_messages! {
    requests: [
        GetEndpointsRequest,
        CreateSessionRequest,
        ActivateSessionRequest,
        CloseSessionRequest,
        ReadRequest,
        WriteRequest,
        HistoryReadRequest,
        BrowseRequest,
        BrowseNextRequest,
        TranslateBrowsePathsToNodeIdsRequest,
        RegisterNodesRequest,
        UnregisterNodesRequest,
        CallRequest,
        CreateSubscriptionRequest,
        ModifySubscriptionRequest,
        DeleteSubscriptionsRequest,
        TransferSubscriptionsRequest,
        SetPublishingModeRequest,
        PublishRequest,
        RepublishRequest,
        CreateMonitoredItemsRequest,
        ModifyMonitoredItemsRequest,
        DeleteMonitoredItemsRequest,
        SetMonitoringModeRequest,
        SetTriggeringRequest,
    ],
    responses: [
        ServiceFault,
        GetEndpointsResponse,
        CreateSessionResponse,
        ActivateSessionResponse,
        CloseSessionResponse,
        ReadResponse,
        WriteResponse,
        HistoryReadResponse,
        BrowseResponse,
        BrowseNextResponse,
        TranslateBrowsePathsToNodeIdsResponse,
        RegisterNodesResponse,
        UnregisterNodesResponse,
        CallResponse,
        CreateSubscriptionResponse,
        ModifySubscriptionResponse,
        DeleteSubscriptionsResponse,
        TransferSubscriptionsResponse,
        SetPublishingModeResponse,
        PublishResponse,
        RepublishResponse,
        CreateMonitoredItemsResponse,
        ModifyMonitoredItemsResponse,
        DeleteMonitoredItemsResponse,
        SetMonitoringModeResponse,
        SetTriggeringResponse,
    ]
}

impl SupportedMessage {
    /// Publish requests are pipelined and never wait behind other transactions.
    pub fn is_publish_request(&self) -> bool {
        matches!(self, SupportedMessage::PublishRequest(_))
    }

    pub fn is_activate_session_request(&self) -> bool {
        matches!(self, SupportedMessage::ActivateSessionRequest(_))
    }

    /// The request handle carried in either header.
    pub fn request_handle(&self) -> Option<u32> {
        self.request_header()
            .map(|h| h.request_handle)
            .or_else(|| self.response_header().map(|h| h.request_handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StatusCode;

    #[test]
    fn headers() {
        let mut msg: SupportedMessage = CloseSessionRequest {
            request_header: RequestHeader::default(),
            delete_subscriptions: true,
        }
        .into();
        assert!(msg.is_request());
        assert_eq!(msg.type_name(), "CloseSessionRequest");
        msg.request_header_mut().unwrap().request_handle = 42;
        assert_eq!(msg.request_handle(), Some(42));
        assert!(msg.response_header().is_none());

        let fault: SupportedMessage =
            ServiceFault::new(&RequestHeader::default(), StatusCode::BadSessionIdInvalid).into();
        assert!(!fault.is_request());
        assert_eq!(
            fault.response_header().unwrap().service_result,
            StatusCode::BadSessionIdInvalid
        );
        assert_eq!(fault.type_name(), "ServiceFault");
    }
}
