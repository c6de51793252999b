// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{sync::{atomic::Ordering, Arc}, time::Duration};

use crate::{
    client::{
        process_service_result, process_unexpected_response,
        session::{session_debug, session_error, session_warn},
        subscription::{Subscription, SubscriptionParameters},
        Error, Session,
    },
    core::supported_message::SupportedMessage,
    types::{
        CreateMonitoredItemsRequest, CreateSubscriptionRequest, CreateSubscriptionResponse,
        DeleteMonitoredItemsRequest, DeleteSubscriptionsRequest, ModifyMonitoredItemsRequest,
        ModifySubscriptionRequest, ModifySubscriptionResponse, MonitoredItemCreateRequest,
        MonitoredItemCreateResult, MonitoredItemModifyRequest, MonitoredItemModifyResult,
        MonitoringMode, NotificationMessage, PublishRequest, PublishResponse, ReadValueId,
        RepublishRequest, SetMonitoringModeRequest, SetPublishingModeRequest,
        SetTriggeringRequest, StatusCode, SubscriptionAcknowledgement, TimestampsToReturn,
        TransferResult, TransferSubscriptionsRequest, VariableId,
    },
};

impl Session {
    /// Create a subscription by sending a [`CreateSubscriptionRequest`] to the server. The
    /// subscription is not tracked by the session, use [`Session::create_subscription2`] for a
    /// subscription that receives notifications.
    ///
    /// See OPC UA Part 4 - Services 5.13.2 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `parameters` - The requested publishing interval, lifetime and keep-alive counts,
    ///   notification limit, priority and publishing mode.
    ///
    /// # Returns
    ///
    /// * `Ok(CreateSubscriptionResponse)` - The subscription id and the revised parameters.
    /// * `Err(Error)` - Request failed, the error carries the reason for failure.
    ///
    pub async fn create_subscription(
        &self,
        parameters: &SubscriptionParameters,
    ) -> Result<CreateSubscriptionResponse, Error> {
        let request = CreateSubscriptionRequest {
            request_header: self.make_request_header(),
            requested_publishing_interval: parameters.publishing_interval.as_secs_f64() * 1000.0,
            requested_lifetime_count: parameters.lifetime_count,
            requested_max_keep_alive_count: parameters.max_keep_alive_count,
            max_notifications_per_publish: parameters.max_notifications_per_publish,
            publishing_enabled: parameters.publishing_enabled,
            priority: parameters.priority,
        };
        let response = self.send(request).await?;
        if let SupportedMessage::CreateSubscriptionResponse(response) = response {
            process_service_result("CreateSubscriptionRequest", &response.response_header)?;
            session_debug!(
                self,
                "create_subscription, created a subscription with id {}",
                response.subscription_id
            );
            Ok(*response)
        } else {
            session_error!(self, "create_subscription failed {:?}", response);
            Err(process_unexpected_response(
                "CreateSubscriptionRequest",
                response,
            ))
        }
    }

    /// Creates a subscription that is tracked by the session and fed by its publish engine.
    /// Returns once the server has created the subscription.
    ///
    /// # Returns
    ///
    /// * `Ok(Arc<Subscription>)` - The active subscription.
    /// * `Err(Error)` - The parameters do not fit the session timeout, or the server refused
    ///   the subscription.
    ///
    pub async fn create_subscription2(
        &self,
        parameters: SubscriptionParameters,
    ) -> Result<Arc<Subscription>, Error> {
        let session = self
            .this
            .upgrade()
            .ok_or_else(|| Error::InvalidState("session has been dropped".to_string()))?;
        let subscription = Subscription::create(&session, parameters)?;
        subscription.wait_until_ready().await?;
        Ok(subscription)
    }

    /// Modifies a subscription by sending a [`ModifySubscriptionRequest`] to the server.
    ///
    /// See OPC UA Part 4 - Services 5.13.3 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `subscription_id` - subscription identifier returned from `create_subscription`.
    /// * `parameters` - The new requested parameters. The publishing mode is ignored, use
    ///   [`Session::set_publishing_mode`] to change it.
    ///
    /// # Returns
    ///
    /// * `Ok(ModifySubscriptionResponse)` - The revised parameters.
    /// * `Err(Error)` - Request failed, the error carries the reason for failure.
    ///
    pub async fn modify_subscription(
        &self,
        subscription_id: u32,
        parameters: &SubscriptionParameters,
    ) -> Result<ModifySubscriptionResponse, Error> {
        let request = ModifySubscriptionRequest {
            request_header: self.make_request_header(),
            subscription_id,
            requested_publishing_interval: parameters.publishing_interval.as_secs_f64() * 1000.0,
            requested_lifetime_count: parameters.lifetime_count,
            requested_max_keep_alive_count: parameters.max_keep_alive_count,
            max_notifications_per_publish: parameters.max_notifications_per_publish,
            priority: parameters.priority,
        };
        let response = self.send(request).await?;
        if let SupportedMessage::ModifySubscriptionResponse(response) = response {
            process_service_result("ModifySubscriptionRequest", &response.response_header)?;
            session_debug!(self, "modify_subscription success for {}", subscription_id);
            Ok(*response)
        } else {
            session_error!(self, "modify_subscription failed {:?}", response);
            Err(process_unexpected_response(
                "ModifySubscriptionRequest",
                response,
            ))
        }
    }

    /// Deletes subscriptions by sending a [`DeleteSubscriptionsRequest`] to the server with the list
    /// of subscriptions to delete. Tracked subscriptions the server deleted are terminated locally.
    ///
    /// See OPC UA Part 4 - Services 5.13.8 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `subscription_ids` - List of subscription identifiers to delete.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<StatusCode>)` - List of result for delete action on each id, `Good` or `BadSubscriptionIdInvalid`
    ///                           The size and order of the list matches the size and order of the input.
    /// * `Err(Error)` - Request failed, the error carries the reason for failure.
    ///
    pub async fn delete_subscriptions(
        &self,
        subscription_ids: &[u32],
    ) -> Result<Vec<StatusCode>, Error> {
        if subscription_ids.is_empty() {
            session_error!(self, "delete_subscriptions, called with no subscriptions");
            return Err(StatusCode::BadNothingToDo.into());
        }
        let request = DeleteSubscriptionsRequest {
            request_header: self.make_request_header(),
            subscription_ids: Some(subscription_ids.to_vec()),
        };
        let response = self.send(request).await?;
        if let SupportedMessage::DeleteSubscriptionsResponse(response) = response {
            process_service_result("DeleteSubscriptionsRequest", &response.response_header)?;
            let results = response.results.unwrap_or_default();
            if let Some(engine) = self.publish_engine_if_created() {
                for (id, status) in subscription_ids.iter().zip(results.iter()) {
                    if status.is_good() {
                        if let Some(subscription) = engine.subscription(*id) {
                            subscription.terminate_locally(StatusCode::Good);
                        }
                    }
                }
            }
            session_debug!(self, "delete_subscriptions success");
            Ok(results)
        } else {
            session_error!(self, "delete_subscriptions failed {:?}", response);
            Err(process_unexpected_response(
                "DeleteSubscriptionsRequest",
                response,
            ))
        }
    }

    /// Transfers subscriptions from another session, or from this session before it was
    /// recreated, by sending a [`TransferSubscriptionsRequest`].
    ///
    /// See OPC UA Part 4 - Services 5.13.7 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `subscription_ids` - The subscriptions to transfer.
    /// * `send_initial_values` - Ask the server to send the current values of the monitored items.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<TransferResult>)` - One result per subscription, in order.
    /// * `Err(Error)` - Request failed, the error carries the reason for failure.
    ///
    pub async fn transfer_subscriptions(
        &self,
        subscription_ids: &[u32],
        send_initial_values: bool,
    ) -> Result<Vec<TransferResult>, Error> {
        if subscription_ids.is_empty() {
            session_error!(self, "transfer_subscriptions, called with no subscriptions");
            return Err(StatusCode::BadNothingToDo.into());
        }
        let request = TransferSubscriptionsRequest {
            request_header: self.make_request_header(),
            subscription_ids: Some(subscription_ids.to_vec()),
            send_initial_values,
        };
        let response = self.send(request).await?;
        if let SupportedMessage::TransferSubscriptionsResponse(response) = response {
            process_service_result("TransferSubscriptionsRequest", &response.response_header)?;
            session_debug!(self, "transfer_subscriptions success");
            Ok(response.results.unwrap_or_default())
        } else {
            session_error!(self, "transfer_subscriptions failed {:?}", response);
            Err(process_unexpected_response(
                "TransferSubscriptionsRequest",
                response,
            ))
        }
    }

    /// Changes the publishing mode of subscriptions by sending a [`SetPublishingModeRequest`].
    ///
    /// See OPC UA Part 4 - Services 5.13.4 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `subscription_ids` - one or more subscription identifiers.
    /// * `publishing_enabled` - A boolean indicating whether publishing should be enabled or disabled
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<StatusCode>)` - Service return code for the action for each id, `Good` or `BadSubscriptionIdInvalid`
    /// * `Err(Error)` - Request failed, the error carries the reason for failure.
    ///
    pub async fn set_publishing_mode(
        &self,
        subscription_ids: &[u32],
        publishing_enabled: bool,
    ) -> Result<Vec<StatusCode>, Error> {
        session_debug!(
            self,
            "set_publishing_mode, for subscriptions {:?}, publishing enabled {}",
            subscription_ids,
            publishing_enabled
        );
        if subscription_ids.is_empty() {
            session_error!(self, "set_publishing_mode, subscription ids were empty");
            return Err(StatusCode::BadNothingToDo.into());
        }
        let request = SetPublishingModeRequest {
            request_header: self.make_request_header(),
            publishing_enabled,
            subscription_ids: Some(subscription_ids.to_vec()),
        };
        let response = self.send(request).await?;
        if let SupportedMessage::SetPublishingModeResponse(response) = response {
            process_service_result("SetPublishingModeRequest", &response.response_header)?;
            session_debug!(self, "set_publishing_mode success");
            Ok(response.results.unwrap_or_default())
        } else {
            session_error!(self, "set_publishing_mode failed {:?}", response);
            Err(process_unexpected_response(
                "SetPublishingModeRequest",
                response,
            ))
        }
    }

    /// Creates monitored items on a subscription by sending a [`CreateMonitoredItemsRequest`] to the server.
    ///
    /// See OPC UA Part 4 - Services 5.12.2 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `subscription_id` - The Server-assigned identifier for the Subscription that will report Notifications for this MonitoredItem
    /// * `timestamps_to_return` - An enumeration that specifies the timestamp Attributes to be transmitted for each MonitoredItem.
    /// * `items_to_create` - A list of [`MonitoredItemCreateRequest`] to be created and assigned to the specified Subscription.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<MonitoredItemCreateResult>)` - A list of [`MonitoredItemCreateResult`] corresponding to the items to create.
    ///    The size and order of the list matches the size and order of the `items_to_create` request parameter.
    /// * `Err(Error)` - Request failed, the error carries the reason for failure.
    ///
    pub async fn create_monitored_items(
        &self,
        subscription_id: u32,
        timestamps_to_return: TimestampsToReturn,
        items_to_create: &[MonitoredItemCreateRequest],
    ) -> Result<Vec<MonitoredItemCreateResult>, Error> {
        session_debug!(
            self,
            "create_monitored_items, for subscription {}, {} items",
            subscription_id,
            items_to_create.len()
        );
        if subscription_id == 0 {
            session_error!(self, "create_monitored_items, subscription id 0 is invalid");
            return Err(StatusCode::BadInvalidArgument.into());
        }
        if items_to_create.is_empty() {
            session_error!(self, "create_monitored_items, called with no items to create");
            return Err(StatusCode::BadNothingToDo.into());
        }
        let request = CreateMonitoredItemsRequest {
            request_header: self.make_request_header(),
            subscription_id,
            timestamps_to_return,
            items_to_create: Some(items_to_create.to_vec()),
        };
        let response = self.send(request).await?;
        if let SupportedMessage::CreateMonitoredItemsResponse(response) = response {
            process_service_result("CreateMonitoredItemsRequest", &response.response_header)?;
            Ok(response.results.unwrap_or_default())
        } else {
            session_error!(self, "create_monitored_items failed {:?}", response);
            Err(process_unexpected_response(
                "CreateMonitoredItemsRequest",
                response,
            ))
        }
    }

    /// Modifies monitored items on a subscription by sending a [`ModifyMonitoredItemsRequest`] to the server.
    ///
    /// See OPC UA Part 4 - Services 5.12.3 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `subscription_id` - The Server-assigned identifier for the Subscription that will report Notifications for this MonitoredItem.
    /// * `timestamps_to_return` - An enumeration that specifies the timestamp Attributes to be transmitted for each MonitoredItem.
    /// * `items_to_modify` - The list of [`MonitoredItemModifyRequest`] to modify.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<MonitoredItemModifyResult>)` - A list of [`MonitoredItemModifyResult`] corresponding to the MonitoredItems to modify.
    ///    The size and order of the list matches the size and order of the `items_to_modify` request parameter.
    /// * `Err(Error)` - Request failed, the error carries the reason for failure.
    ///
    pub async fn modify_monitored_items(
        &self,
        subscription_id: u32,
        timestamps_to_return: TimestampsToReturn,
        items_to_modify: &[MonitoredItemModifyRequest],
    ) -> Result<Vec<MonitoredItemModifyResult>, Error> {
        session_debug!(
            self,
            "modify_monitored_items, for subscription {}, {} items",
            subscription_id,
            items_to_modify.len()
        );
        if subscription_id == 0 {
            session_error!(self, "modify_monitored_items, subscription id 0 is invalid");
            return Err(StatusCode::BadInvalidArgument.into());
        }
        if items_to_modify.is_empty() {
            session_error!(self, "modify_monitored_items, called with no items to modify");
            return Err(StatusCode::BadNothingToDo.into());
        }
        let request = ModifyMonitoredItemsRequest {
            request_header: self.make_request_header(),
            subscription_id,
            timestamps_to_return,
            items_to_modify: Some(items_to_modify.to_vec()),
        };
        let response = self.send(request).await?;
        if let SupportedMessage::ModifyMonitoredItemsResponse(response) = response {
            process_service_result("ModifyMonitoredItemsRequest", &response.response_header)?;
            Ok(response.results.unwrap_or_default())
        } else {
            session_error!(self, "modify_monitored_items failed {:?}", response);
            Err(process_unexpected_response(
                "ModifyMonitoredItemsRequest",
                response,
            ))
        }
    }

    /// Deletes monitored items from a subscription by sending a [`DeleteMonitoredItemsRequest`] to the server.
    ///
    /// See OPC UA Part 4 - Services 5.12.6 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `subscription_id` - The Server-assigned identifier for the Subscription that will report Notifications for this MonitoredItem.
    /// * `items_to_delete` - List of Server-assigned ids for the MonitoredItems to be deleted.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<StatusCode>)` - List of StatusCodes for the MonitoredItems to delete. The size and
    ///   order of the list matches the size and order of the `items_to_delete` request parameter.
    /// * `Err(Error)` - Request failed, the error carries the reason for failure.
    ///
    pub async fn delete_monitored_items(
        &self,
        subscription_id: u32,
        items_to_delete: &[u32],
    ) -> Result<Vec<StatusCode>, Error> {
        session_debug!(
            self,
            "delete_monitored_items, subscription {} for items {:?}",
            subscription_id,
            items_to_delete
        );
        if subscription_id == 0 {
            session_error!(self, "delete_monitored_items, subscription id 0 is invalid");
            return Err(StatusCode::BadInvalidArgument.into());
        }
        if items_to_delete.is_empty() {
            session_error!(self, "delete_monitored_items, called with no items to delete");
            return Err(StatusCode::BadNothingToDo.into());
        }
        let request = DeleteMonitoredItemsRequest {
            request_header: self.make_request_header(),
            subscription_id,
            monitored_item_ids: Some(items_to_delete.to_vec()),
        };
        let response = self.send(request).await?;
        if let SupportedMessage::DeleteMonitoredItemsResponse(response) = response {
            process_service_result("DeleteMonitoredItemsRequest", &response.response_header)?;
            Ok(response.results.unwrap_or_default())
        } else {
            session_error!(self, "delete_monitored_items failed {:?}", response);
            Err(process_unexpected_response(
                "DeleteMonitoredItemsRequest",
                response,
            ))
        }
    }

    /// Sets the monitoring mode on one or more monitored items by sending a [`SetMonitoringModeRequest`]
    /// to the server.
    ///
    /// See OPC UA Part 4 - Services 5.12.4 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `subscription_id` - the subscription identifier containing the monitored items to be modified.
    /// * `monitoring_mode` - the monitored mode to apply to the monitored items
    /// * `monitored_item_ids` - the monitored items to be modified
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<StatusCode>)` - Individual result for each monitored item.
    /// * `Err(Error)` - Request failed, the error carries the reason for failure.
    ///
    pub async fn set_monitoring_mode(
        &self,
        subscription_id: u32,
        monitoring_mode: MonitoringMode,
        monitored_item_ids: &[u32],
    ) -> Result<Vec<StatusCode>, Error> {
        if monitored_item_ids.is_empty() {
            session_error!(self, "set_monitoring_mode, called with nothing to do");
            return Err(StatusCode::BadNothingToDo.into());
        }
        let request = SetMonitoringModeRequest {
            request_header: self.make_request_header(),
            subscription_id,
            monitoring_mode,
            monitored_item_ids: Some(monitored_item_ids.to_vec()),
        };
        let response = self.send(request).await?;
        if let SupportedMessage::SetMonitoringModeResponse(response) = response {
            process_service_result("SetMonitoringModeRequest", &response.response_header)?;
            Ok(response.results.unwrap_or_default())
        } else {
            session_error!(self, "set_monitoring_mode failed {:?}", response);
            Err(process_unexpected_response(
                "SetMonitoringModeRequest",
                response,
            ))
        }
    }

    /// Sets a monitored item so it becomes the trigger that causes other monitored items to send
    /// change events in the same update. Sends a [`SetTriggeringRequest`] to the server.
    /// Note that `items_to_remove` is applied before `items_to_add`.
    ///
    /// See OPC UA Part 4 - Services 5.12.5 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `subscription_id` - the subscription identifier containing the monitored item to be used as the trigger.
    /// * `triggering_item_id` - the monitored item that is the trigger.
    /// * `links_to_add` - zero or more items to be added to the monitored item's triggering list.
    /// * `links_to_remove` - zero or more items to be removed from the monitored item's triggering list.
    ///
    /// # Returns
    ///
    /// * `Ok((Option<Vec<StatusCode>>, Option<Vec<StatusCode>>))` - Individual result for each item added / removed for the SetTriggering call.
    /// * `Err(Error)` - Request failed, the error carries the reason for failure.
    ///
    pub async fn set_triggering(
        &self,
        subscription_id: u32,
        triggering_item_id: u32,
        links_to_add: &[u32],
        links_to_remove: &[u32],
    ) -> Result<(Option<Vec<StatusCode>>, Option<Vec<StatusCode>>), Error> {
        if links_to_add.is_empty() && links_to_remove.is_empty() {
            session_error!(self, "set_triggering, called with nothing to add or remove");
            return Err(StatusCode::BadNothingToDo.into());
        }
        let request = SetTriggeringRequest {
            request_header: self.make_request_header(),
            subscription_id,
            triggering_item_id,
            links_to_add: (!links_to_add.is_empty()).then(|| links_to_add.to_vec()),
            links_to_remove: (!links_to_remove.is_empty()).then(|| links_to_remove.to_vec()),
        };
        let response = self.send(request).await?;
        if let SupportedMessage::SetTriggeringResponse(response) = response {
            process_service_result("SetTriggeringRequest", &response.response_header)?;
            Ok((response.add_results, response.remove_results))
        } else {
            session_error!(self, "set_triggering failed {:?}", response);
            Err(process_unexpected_response("SetTriggeringRequest", response))
        }
    }

    /// Sends a [`PublishRequest`] acknowledging the supplied notifications. Publish requests
    /// do not wait behind other transactions of the session. This is normally driven by the
    /// publish engine of the session.
    ///
    /// See OPC UA Part 4 - Services 5.13.5 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `acknowledgements` - Notifications to acknowledge.
    /// * `timeout_hint` - How long the server may hold the request.
    ///
    pub async fn publish(
        &self,
        acknowledgements: &[SubscriptionAcknowledgement],
        timeout_hint: Duration,
    ) -> Result<PublishResponse, Error> {
        let request = PublishRequest {
            request_header: self.make_request_header_with_hint(timeout_hint),
            subscription_acknowledgements: if acknowledgements.is_empty() {
                None
            } else {
                Some(acknowledgements.to_vec())
            },
        };
        let response = self.send(request).await?;
        if let SupportedMessage::PublishResponse(response) = response {
            process_service_result("PublishRequest", &response.response_header)?;
            Ok(*response)
        } else {
            Err(process_unexpected_response("PublishRequest", response))
        }
    }

    /// Asks the server to send again a notification message it has not had acknowledged, by
    /// sending a [`RepublishRequest`].
    ///
    /// See OPC UA Part 4 - Services 5.13.6 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `subscription_id` - The subscription the message belongs to.
    /// * `retransmit_sequence_number` - The sequence number of the message.
    ///
    /// # Returns
    ///
    /// * `Ok(NotificationMessage)` - The requested message.
    /// * `Err(Error)` - Request failed, `BadMessageNotAvailable` when the server no longer has it.
    ///
    pub async fn republish(
        &self,
        subscription_id: u32,
        retransmit_sequence_number: u32,
    ) -> Result<NotificationMessage, Error> {
        let request = RepublishRequest {
            request_header: self.make_request_header(),
            subscription_id,
            retransmit_sequence_number,
        };
        let response = self.send(request).await?;
        if let SupportedMessage::RepublishResponse(response) = response {
            process_service_result("RepublishRequest", &response.response_header)?;
            Ok(response.notification_message)
        } else {
            session_error!(self, "republish failed {:?}", response);
            Err(process_unexpected_response("RepublishRequest", response))
        }
    }

    /// Reads the number of monitored items the server accepts in a single call. The value is
    /// remembered by the session and used to split large creations.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - The limit in effect for the session, the configured default when the
    ///   server does not advertise one.
    /// * `Err(Error)` - The read failed.
    ///
    pub async fn read_operation_limits(&self) -> Result<usize, Error> {
        let value = self
            .read_one(
                ReadValueId::from(crate::types::NodeId::from(
                    VariableId::Server_ServerCapabilities_OperationLimits_MaxMonitoredItemsPerCall,
                )),
                TimestampsToReturn::Neither,
                0.0,
            )
            .await?;
        match value.value.as_ref().and_then(|v| v.as_u32()) {
            Some(limit) if value.is_valid() && limit > 0 => {
                self.max_monitored_items_per_call
                    .store(limit as usize, Ordering::Relaxed);
            }
            _ => {
                session_warn!(
                    self,
                    "server does not advertise a monitored items limit, using {}",
                    self.max_monitored_items_per_call()
                );
            }
        }
        Ok(self.max_monitored_items_per_call())
    }
}
