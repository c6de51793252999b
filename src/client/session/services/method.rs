// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::{
    client::{
        process_service_result, process_unexpected_response,
        session::{services::attributes::single_result, session_debug, session_error},
        Error, Session,
    },
    core::supported_message::SupportedMessage,
    types::{CallMethodRequest, CallMethodResult, CallRequest, StatusCode},
};

impl Session {
    /// Calls methods on the server by sending a [`CallRequest`].
    ///
    /// See OPC UA Part 4 - Services 5.11.2 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `methods` - The methods to call, each with its object, method id and input arguments.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<CallMethodResult>)` - A [`CallMethodResult`] for each method, in order.
    /// * `Err(Error)` - Request failed, the error carries the reason for failure.
    ///
    pub async fn call(
        &self,
        methods: impl IntoIterator<Item = CallMethodRequest>,
    ) -> Result<Vec<CallMethodResult>, Error> {
        let methods_to_call: Vec<CallMethodRequest> = methods.into_iter().collect();
        if methods_to_call.is_empty() {
            session_error!(self, "call(), was not supplied with any methods to call");
            return Err(StatusCode::BadNothingToDo.into());
        }
        session_debug!(self, "call() {} methods", methods_to_call.len());
        let request = CallRequest {
            request_header: self.make_request_header(),
            methods_to_call: Some(methods_to_call),
        };
        let response = self.send(request).await?;
        if let SupportedMessage::CallResponse(response) = response {
            process_service_result("CallRequest", &response.response_header)?;
            Ok(response.results.unwrap_or_default())
        } else {
            session_error!(self, "call() failed {:?}", response);
            Err(process_unexpected_response("CallRequest", response))
        }
    }

    /// Calls a single method on an object on the server. See [`Session::call`].
    ///
    /// # Arguments
    ///
    /// * `method` - The method to call. Note this function takes anything that can be turned into
    ///   a [`CallMethodRequest`] which includes a ([`NodeId`], [`NodeId`], `Option<Vec<Variant>>`) tuple
    ///   which refers to the object id, method id, and input arguments respectively.
    ///
    /// [`NodeId`]: crate::types::NodeId
    pub async fn call_one(
        &self,
        method: impl Into<CallMethodRequest>,
    ) -> Result<CallMethodResult, Error> {
        let results = self.call([method.into()]).await?;
        single_result("CallRequest", results)
    }
}
