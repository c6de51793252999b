// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! An in-memory server behind the transport traits. Tests script its answers, hold and release
//! publish requests and inspect every request it received, in the order it received them.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;

use crate::{
    client::transport::{
        ChannelEvent, ChannelFactory, ChannelOptions, SecureChannel, TransportError,
    },
    core::supported_message::SupportedMessage,
    crypto::{SecurityPolicy, SECURITY_POLICY_BASIC_256_SHA_256_URI},
    sync::Mutex,
    types::{
        ActivateSessionResponse, CloseSessionResponse, CreateMonitoredItemsResponse,
        CreateSessionRequest, CreateSessionResponse, CreateSubscriptionResponse, DataValue,
        DeleteMonitoredItemsResponse, DeleteSubscriptionsResponse, EndpointDescription,
        GetEndpointsResponse, MessageSecurityMode, ModifyMonitoredItemsResponse,
        ModifySubscriptionResponse, MonitoredItemCreateResult, MonitoredItemModifyResult,
        NodeId, NotificationMessage, PublishRequest, PublishResponse, ReadResponse,
        RepublishResponse, RequestHeader, ResponseHeader, ServiceFault, SetMonitoringModeResponse,
        SetPublishingModeResponse, SetTriggeringResponse, SignatureData, StatusCode,
        SubscriptionAcknowledgement, TransferResult, TransferSubscriptionsResponse, VariableId,
        Variant,
    },
};

pub const ENDPOINT_URL: &str = "opc.tcp://host:4840";
pub const SECURE_ENDPOINT_URL: &str = "opc.tcp://host:4840/secure";
pub const SERVER_CERTIFICATE: &[u8] = b"mock server certificate";

/// Counts a regular request as being processed for as long as it lives.
struct Processing<'a>(&'a AtomicUsize);

impl<'a> Processing<'a> {
    fn new(active: &'a AtomicUsize, max_active: &AtomicUsize) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        max_active.fetch_max(now, Ordering::SeqCst);
        Processing(active)
    }
}

impl Drop for Processing<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct HeldPublish {
    request: PublishRequest,
    responder: oneshot::Sender<SupportedMessage>,
}

/// The scripted server. One instance outlives the channels opened to it, so sessions and
/// subscriptions survive a lost channel unless a test says otherwise.
pub struct MockServer {
    requests: Mutex<Vec<SupportedMessage>>,
    /// Authentication tokens of the sessions the server knows.
    sessions: Mutex<HashSet<NodeId>>,
    next_session: AtomicU32,
    subscriptions: Mutex<HashSet<u32>>,
    next_subscription_id: AtomicU32,
    next_monitored_item_id: AtomicU32,
    faults: Mutex<HashMap<&'static str, VecDeque<StatusCode>>>,
    delays: Mutex<HashMap<&'static str, Duration>>,
    held_publish: Mutex<VecDeque<HeldPublish>>,
    publish_limit: Mutex<Option<usize>>,
    republish: Mutex<HashMap<(u32, u32), NotificationMessage>>,
    transfer_status: Mutex<StatusCode>,
    rejected_nodes: Mutex<HashMap<NodeId, StatusCode>>,
    max_monitored_items_per_call: Mutex<Option<u32>>,
    revised_session_timeout: Mutex<Option<f64>>,
    endpoints: Vec<EndpointDescription>,
    active_regular: AtomicUsize,
    max_active_regular: AtomicUsize,
}

impl MockServer {
    pub fn new() -> Arc<Self> {
        let mut unsecure: EndpointDescription = (
            ENDPOINT_URL,
            SecurityPolicy::None.to_uri(),
            MessageSecurityMode::None,
        )
            .into();
        unsecure.server_certificate = Some(SERVER_CERTIFICATE.to_vec());
        let mut secure: EndpointDescription = (
            SECURE_ENDPOINT_URL,
            SECURITY_POLICY_BASIC_256_SHA_256_URI,
            MessageSecurityMode::SignAndEncrypt,
        )
            .into();
        secure.server_certificate = Some(SERVER_CERTIFICATE.to_vec());

        Arc::new(MockServer {
            requests: Mutex::new(Vec::new()),
            sessions: Mutex::new(HashSet::new()),
            next_session: AtomicU32::new(1),
            subscriptions: Mutex::new(HashSet::new()),
            next_subscription_id: AtomicU32::new(1),
            next_monitored_item_id: AtomicU32::new(1000),
            faults: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            held_publish: Mutex::new(VecDeque::new()),
            publish_limit: Mutex::new(None),
            republish: Mutex::new(HashMap::new()),
            transfer_status: Mutex::new(StatusCode::Good),
            rejected_nodes: Mutex::new(HashMap::new()),
            max_monitored_items_per_call: Mutex::new(None),
            revised_session_timeout: Mutex::new(None),
            endpoints: vec![unsecure, secure],
            active_regular: AtomicUsize::new(0),
            max_active_regular: AtomicUsize::new(0),
        })
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<SupportedMessage> {
        trace_lock!(self.requests).clone()
    }

    pub fn requests_named(&self, name: &str) -> Vec<SupportedMessage> {
        trace_lock!(self.requests)
            .iter()
            .filter(|r| r.type_name() == name)
            .cloned()
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        trace_lock!(self.requests)
            .iter()
            .filter(|r| r.type_name() == name)
            .count()
    }

    /// Every acknowledgement carried by the publish requests received so far.
    pub fn acknowledgements(&self) -> Vec<SubscriptionAcknowledgement> {
        trace_lock!(self.requests)
            .iter()
            .filter_map(|r| match r {
                SupportedMessage::PublishRequest(p) => p.subscription_acknowledgements.clone(),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// The next request of the named type is answered with a service fault.
    pub fn fail_next(&self, name: &'static str, status: StatusCode) {
        trace_lock!(self.faults)
            .entry(name)
            .or_default()
            .push_back(status);
    }

    /// Requests of the named type take `delay` to process.
    pub fn delay(&self, name: &'static str, delay: Duration) {
        trace_lock!(self.delays).insert(name, delay);
    }

    /// The server drops every session, later requests fail with `BadSessionIdInvalid`.
    pub fn forget_sessions(&self) {
        trace_lock!(self.sessions).clear();
    }

    /// Publish requests beyond `limit` held at once are refused with
    /// `BadTooManyPublishRequests`.
    pub fn set_publish_limit(&self, limit: Option<usize>) {
        *trace_lock!(self.publish_limit) = limit;
    }

    pub fn set_transfer_status(&self, status: StatusCode) {
        *trace_lock!(self.transfer_status) = status;
    }

    pub fn reject_node(&self, node_id: NodeId, status: StatusCode) {
        trace_lock!(self.rejected_nodes).insert(node_id, status);
    }

    pub fn set_max_monitored_items_per_call(&self, limit: Option<u32>) {
        *trace_lock!(self.max_monitored_items_per_call) = limit;
    }

    pub fn set_revised_session_timeout(&self, timeout: Option<f64>) {
        *trace_lock!(self.revised_session_timeout) = timeout;
    }

    /// Keeps a message the client may ask to have sent again.
    pub fn store_for_republish(&self, subscription_id: u32, message: NotificationMessage) {
        trace_lock!(self.republish).insert((subscription_id, message.sequence_number), message);
    }

    pub fn subscription_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = trace_lock!(self.subscriptions).iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// The highest number of regular requests processed at the same time.
    pub fn max_concurrent_regular(&self) -> usize {
        self.max_active_regular.load(Ordering::SeqCst)
    }

    /// Publish requests waiting for an answer.
    pub fn held_publish_count(&self) -> usize {
        let mut held = trace_lock!(self.held_publish);
        held.retain(|h| !h.responder.is_closed());
        held.len()
    }

    fn pop_held_publish(&self) -> Option<HeldPublish> {
        let mut held = trace_lock!(self.held_publish);
        while let Some(publish) = held.pop_front() {
            if !publish.responder.is_closed() {
                return Some(publish);
            }
        }
        None
    }

    /// Answers the oldest publish request still waiting, returning that request.
    pub fn respond_publish(
        &self,
        subscription_id: u32,
        notification_message: NotificationMessage,
        available_sequence_numbers: Option<Vec<u32>>,
    ) -> Option<PublishRequest> {
        let held = self.pop_held_publish()?;
        let response = PublishResponse {
            response_header: ResponseHeader::new_good(&held.request.request_header),
            subscription_id,
            available_sequence_numbers,
            more_notifications: false,
            notification_message,
            results: None,
            diagnostic_infos: None,
        };
        held.responder.send(response.into()).ok()?;
        Some(held.request)
    }

    /// Answers the oldest publish request still waiting with a service fault.
    pub fn fail_publish(&self, status: StatusCode) -> Option<PublishRequest> {
        let held = self.pop_held_publish()?;
        let fault = ServiceFault::new(&held.request.request_header, status);
        held.responder.send(fault.into()).ok()?;
        Some(held.request)
    }

    fn take_fault(&self, name: &str) -> Option<StatusCode> {
        trace_lock!(self.faults)
            .get_mut(name)
            .and_then(|faults| faults.pop_front())
    }

    fn knows_session(&self, header: &RequestHeader) -> bool {
        trace_lock!(self.sessions).contains(&header.authentication_token)
    }

    fn knows_subscription(&self, subscription_id: u32) -> bool {
        trace_lock!(self.subscriptions).contains(&subscription_id)
    }

    async fn handle(&self, request: SupportedMessage) -> SupportedMessage {
        trace_lock!(self.requests).push(request.clone());
        let header = request.request_header().cloned().unwrap_or_default();
        if let Some(status) = self.take_fault(request.type_name()) {
            return ServiceFault::new(&header, status).into();
        }
        match request {
            SupportedMessage::PublishRequest(publish) => self.hold_publish(*publish).await,
            request => {
                let _processing = Processing::new(&self.active_regular, &self.max_active_regular);
                let delay = trace_lock!(self.delays).get(request.type_name()).copied();
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                self.respond(request, &header)
            }
        }
    }

    async fn hold_publish(&self, request: PublishRequest) -> SupportedMessage {
        let header = request.request_header.clone();
        if !self.knows_session(&header) {
            return ServiceFault::new(&header, StatusCode::BadSessionIdInvalid).into();
        }
        let limit = *trace_lock!(self.publish_limit);
        let responded = {
            let mut held = trace_lock!(self.held_publish);
            held.retain(|h| !h.responder.is_closed());
            if limit.is_some_and(|limit| held.len() >= limit) {
                None
            } else {
                let (responder, responded) = oneshot::channel();
                held.push_back(HeldPublish { request, responder });
                Some(responded)
            }
        };
        match responded {
            Some(responded) => responded.await.unwrap_or_else(|_| {
                ServiceFault::new(&header, StatusCode::BadRequestInterrupted).into()
            }),
            None => ServiceFault::new(&header, StatusCode::BadTooManyPublishRequests).into(),
        }
    }

    fn create_session(&self, request: &CreateSessionRequest) -> SupportedMessage {
        let n = self.next_session.fetch_add(1, Ordering::SeqCst);
        let authentication_token = NodeId::new(0, format!("token-{}", n));
        trace_lock!(self.sessions).insert(authentication_token.clone());
        let revised_session_timeout = trace_lock!(self.revised_session_timeout)
            .unwrap_or(request.requested_session_timeout);
        CreateSessionResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            session_id: NodeId::new(1, n),
            authentication_token,
            revised_session_timeout,
            server_nonce: Some(vec![n as u8; 32]),
            server_certificate: Some(SERVER_CERTIFICATE.to_vec()),
            server_endpoints: Some(self.endpoints.clone()),
            server_signature: SignatureData::default(),
            max_request_message_size: 0,
        }
        .into()
    }

    fn read_value(&self, node_id: &NodeId) -> DataValue {
        if *node_id == NodeId::from(VariableId::Server_ServerStatus_State) {
            // Running
            DataValue::new_now(Variant::Int32(0))
        } else if *node_id
            == NodeId::from(
                VariableId::Server_ServerCapabilities_OperationLimits_MaxMonitoredItemsPerCall,
            )
        {
            match *trace_lock!(self.max_monitored_items_per_call) {
                Some(limit) => DataValue::new_now(Variant::UInt32(limit)),
                None => DataValue::null_with_status(StatusCode::BadNodeIdUnknown),
            }
        } else {
            DataValue::new_now(Variant::String(node_id.to_string()))
        }
    }

    fn respond(&self, request: SupportedMessage, header: &RequestHeader) -> SupportedMessage {
        let good = ResponseHeader::new_good(header);
        match request {
            SupportedMessage::GetEndpointsRequest(_) => GetEndpointsResponse {
                response_header: good,
                endpoints: Some(self.endpoints.clone()),
            }
            .into(),
            SupportedMessage::CreateSessionRequest(request) => self.create_session(&request),
            _ if !self.knows_session(header) => {
                ServiceFault::new(header, StatusCode::BadSessionIdInvalid).into()
            }
            SupportedMessage::ActivateSessionRequest(_) => ActivateSessionResponse {
                response_header: good,
                server_nonce: None,
                results: None,
            }
            .into(),
            SupportedMessage::CloseSessionRequest(_) => {
                trace_lock!(self.sessions).remove(&header.authentication_token);
                CloseSessionResponse {
                    response_header: good,
                }
                .into()
            }
            SupportedMessage::ReadRequest(request) => {
                let results = request
                    .nodes_to_read
                    .unwrap_or_default()
                    .iter()
                    .map(|n| self.read_value(&n.node_id))
                    .collect();
                ReadResponse {
                    response_header: good,
                    results: Some(results),
                    diagnostic_infos: None,
                }
                .into()
            }
            SupportedMessage::CreateSubscriptionRequest(request) => {
                let subscription_id = self.next_subscription_id.fetch_add(1, Ordering::SeqCst);
                trace_lock!(self.subscriptions).insert(subscription_id);
                CreateSubscriptionResponse {
                    response_header: good,
                    subscription_id,
                    revised_publishing_interval: request.requested_publishing_interval,
                    revised_lifetime_count: request.requested_lifetime_count,
                    revised_max_keep_alive_count: request.requested_max_keep_alive_count,
                }
                .into()
            }
            SupportedMessage::ModifySubscriptionRequest(request) => {
                if !self.knows_subscription(request.subscription_id) {
                    return ServiceFault::new(header, StatusCode::BadSubscriptionIdInvalid).into();
                }
                ModifySubscriptionResponse {
                    response_header: good,
                    revised_publishing_interval: request.requested_publishing_interval,
                    revised_lifetime_count: request.requested_lifetime_count,
                    revised_max_keep_alive_count: request.requested_max_keep_alive_count,
                }
                .into()
            }
            SupportedMessage::DeleteSubscriptionsRequest(request) => {
                let mut subscriptions = trace_lock!(self.subscriptions);
                let results = request
                    .subscription_ids
                    .unwrap_or_default()
                    .iter()
                    .map(|id| {
                        if subscriptions.remove(id) {
                            StatusCode::Good
                        } else {
                            StatusCode::BadSubscriptionIdInvalid
                        }
                    })
                    .collect();
                DeleteSubscriptionsResponse {
                    response_header: good,
                    results: Some(results),
                    diagnostic_infos: None,
                }
                .into()
            }
            SupportedMessage::TransferSubscriptionsRequest(request) => {
                let status = *trace_lock!(self.transfer_status);
                let results = request
                    .subscription_ids
                    .unwrap_or_default()
                    .iter()
                    .map(|id| TransferResult {
                        status_code: if status.is_bad() {
                            status
                        } else if self.knows_subscription(*id) {
                            StatusCode::Good
                        } else {
                            StatusCode::BadSubscriptionIdInvalid
                        },
                        available_sequence_numbers: None,
                    })
                    .collect();
                TransferSubscriptionsResponse {
                    response_header: good,
                    results: Some(results),
                    diagnostic_infos: None,
                }
                .into()
            }
            SupportedMessage::SetPublishingModeRequest(request) => SetPublishingModeResponse {
                response_header: good,
                results: Some(vec![
                    StatusCode::Good;
                    request.subscription_ids.map_or(0, |ids| ids.len())
                ]),
                diagnostic_infos: None,
            }
            .into(),
            SupportedMessage::CreateMonitoredItemsRequest(request) => {
                if !self.knows_subscription(request.subscription_id) {
                    return ServiceFault::new(header, StatusCode::BadSubscriptionIdInvalid).into();
                }
                let rejected = trace_lock!(self.rejected_nodes).clone();
                let results = request
                    .items_to_create
                    .unwrap_or_default()
                    .iter()
                    .map(|item| match rejected.get(&item.item_to_monitor.node_id) {
                        Some(status) => MonitoredItemCreateResult {
                            status_code: *status,
                            monitored_item_id: 0,
                            revised_sampling_interval: 0.0,
                            revised_queue_size: 0,
                            filter_result: None,
                        },
                        None => MonitoredItemCreateResult {
                            status_code: StatusCode::Good,
                            monitored_item_id: self
                                .next_monitored_item_id
                                .fetch_add(1, Ordering::SeqCst),
                            revised_sampling_interval: item.requested_parameters.sampling_interval,
                            revised_queue_size: item.requested_parameters.queue_size,
                            filter_result: None,
                        },
                    })
                    .collect();
                CreateMonitoredItemsResponse {
                    response_header: good,
                    results: Some(results),
                    diagnostic_infos: None,
                }
                .into()
            }
            SupportedMessage::ModifyMonitoredItemsRequest(request) => {
                let results = request
                    .items_to_modify
                    .unwrap_or_default()
                    .iter()
                    .map(|item| MonitoredItemModifyResult {
                        status_code: StatusCode::Good,
                        revised_sampling_interval: item.requested_parameters.sampling_interval,
                        revised_queue_size: item.requested_parameters.queue_size,
                        filter_result: None,
                    })
                    .collect();
                ModifyMonitoredItemsResponse {
                    response_header: good,
                    results: Some(results),
                    diagnostic_infos: None,
                }
                .into()
            }
            SupportedMessage::DeleteMonitoredItemsRequest(request) => {
                DeleteMonitoredItemsResponse {
                    response_header: good,
                    results: Some(vec![
                        StatusCode::Good;
                        request.monitored_item_ids.map_or(0, |ids| ids.len())
                    ]),
                    diagnostic_infos: None,
                }
                .into()
            }
            SupportedMessage::SetMonitoringModeRequest(request) => SetMonitoringModeResponse {
                response_header: good,
                results: Some(vec![
                    StatusCode::Good;
                    request.monitored_item_ids.map_or(0, |ids| ids.len())
                ]),
                diagnostic_infos: None,
            }
            .into(),
            SupportedMessage::SetTriggeringRequest(request) => SetTriggeringResponse {
                response_header: good,
                add_results: Some(vec![
                    StatusCode::Good;
                    request.links_to_add.map_or(0, |ids| ids.len())
                ]),
                add_diagnostic_infos: None,
                remove_results: Some(vec![
                    StatusCode::Good;
                    request.links_to_remove.map_or(0, |ids| ids.len())
                ]),
                remove_diagnostic_infos: None,
            }
            .into(),
            SupportedMessage::RepublishRequest(request) => {
                let message = trace_lock!(self.republish)
                    .get(&(request.subscription_id, request.retransmit_sequence_number))
                    .cloned();
                match message {
                    Some(notification_message) => RepublishResponse {
                        response_header: good,
                        notification_message,
                    }
                    .into(),
                    None => ServiceFault::new(header, StatusCode::BadMessageNotAvailable).into(),
                }
            }
            _ => ServiceFault::new(header, StatusCode::BadServiceUnsupported).into(),
        }
    }
}

/// A channel to the mock server. Requests in progress fail with `BadConnectionClosed` as soon
/// as the channel goes away.
pub struct MockChannel {
    server: Arc<MockServer>,
    options: ChannelOptions,
    opened: AtomicBool,
    closed: CancellationToken,
    in_progress: AtomicUsize,
    events: broadcast::Sender<ChannelEvent>,
}

impl MockChannel {
    fn new(server: Arc<MockServer>, options: ChannelOptions) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(MockChannel {
            server,
            options,
            opened: AtomicBool::new(true),
            closed: CancellationToken::new(),
            in_progress: AtomicUsize::new(0),
            events,
        })
    }

    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    /// The connection breaks, the channel reports the loss with `status`.
    pub fn lose(&self, status: StatusCode) {
        self.shut();
        let _ = self.events.send(ChannelEvent::Close(Some(status)));
    }

    fn shut(&self) {
        self.opened.store(false, Ordering::SeqCst);
        self.closed.cancel();
    }
}

#[async_trait]
impl SecureChannel for MockChannel {
    async fn send(
        &self,
        request: SupportedMessage,
        timeout: Duration,
    ) -> Result<SupportedMessage, StatusCode> {
        if !self.is_opened() {
            return Err(StatusCode::BadConnectionClosed);
        }
        let _processing = Processing::new(&self.in_progress, &AtomicUsize::new(0));
        tokio::select! {
            response = self.server.handle(request) => Ok(response),
            _ = self.closed.cancelled() => Err(StatusCode::BadConnectionClosed),
            _ = tokio::time::sleep(timeout) => Err(StatusCode::BadTimeout),
        }
    }

    fn is_opened(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    fn is_transaction_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst) > 0
    }

    async fn close(&self) -> Result<(), StatusCode> {
        self.shut();
        let _ = self.events.send(ChannelEvent::Close(None));
        Ok(())
    }

    async fn abort(&self) {
        self.shut();
        let _ = self.events.send(ChannelEvent::Abort);
    }

    fn dispose(&self) {
        self.shut();
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }
}

/// Opens channels to one mock server. Failures to open a channel can be scripted.
pub struct MockChannelFactory {
    server: Arc<MockServer>,
    channels: Mutex<Vec<Arc<MockChannel>>>,
    attempts: Mutex<Vec<ChannelOptions>>,
    failures: Mutex<VecDeque<TransportError>>,
    refuse: AtomicBool,
}

impl MockChannelFactory {
    pub fn new(server: Arc<MockServer>) -> Arc<Self> {
        Arc::new(MockChannelFactory {
            server,
            channels: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            refuse: AtomicBool::new(false),
        })
    }

    pub fn server(&self) -> &Arc<MockServer> {
        &self.server
    }

    /// The next attempt to open a channel fails with `err`.
    pub fn fail_next(&self, err: TransportError) {
        trace_lock!(self.failures).push_back(err);
    }

    /// While set, every attempt to open a channel is refused.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// The options of every attempt to open a channel, successful or not.
    pub fn attempts(&self) -> Vec<ChannelOptions> {
        trace_lock!(self.attempts).clone()
    }

    pub fn channels_opened(&self) -> usize {
        trace_lock!(self.channels).len()
    }

    /// The channel opened last.
    pub fn current_channel(&self) -> Option<Arc<MockChannel>> {
        trace_lock!(self.channels).last().cloned()
    }

    /// Breaks the channel opened last.
    pub fn drop_connection(&self, status: StatusCode) {
        if let Some(channel) = self.current_channel() {
            channel.lose(status);
        }
    }
}

#[async_trait]
impl ChannelFactory for MockChannelFactory {
    async fn create(
        &self,
        options: &ChannelOptions,
    ) -> Result<Arc<dyn SecureChannel>, TransportError> {
        trace_lock!(self.attempts).push(options.clone());
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Refused("mock server refuses connections".into()));
        }
        if let Some(err) = trace_lock!(self.failures).pop_front() {
            return Err(err);
        }
        let channel = MockChannel::new(self.server.clone(), options.clone());
        trace_lock!(self.channels).push(channel.clone());
        Ok(channel)
    }
}
