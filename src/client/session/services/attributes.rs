// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::{
    client::{
        process_service_result, process_unexpected_response,
        session::{session_debug, session_error},
        Error, Session,
    },
    core::supported_message::SupportedMessage,
    types::{
        DataValue, DateTime, HistoryReadDetails, HistoryReadRequest, HistoryReadResult,
        HistoryReadValueId, NodeId, ReadProcessedDetails, ReadRawModifiedDetails, ReadRequest,
        ReadValueId, StatusCode, TimestampsToReturn, WriteRequest, WriteValue,
    },
};

/// Enumeration used with Session::history_read()
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryReadAction {
    ReadRawModifiedDetails(ReadRawModifiedDetails),
    ReadProcessedDetails(ReadProcessedDetails),
}

impl From<HistoryReadAction> for HistoryReadDetails {
    fn from(action: HistoryReadAction) -> Self {
        match action {
            HistoryReadAction::ReadRawModifiedDetails(v) => HistoryReadDetails::RawModified(v),
            HistoryReadAction::ReadProcessedDetails(v) => HistoryReadDetails::Processed(v),
        }
    }
}

/// Takes the single result out of a response to a request for one item.
pub(crate) fn single_result<T>(request: &'static str, results: Vec<T>) -> Result<T, Error> {
    let count = results.len();
    let mut results = results.into_iter();
    match (results.next(), count) {
        (Some(result), 1) => Ok(result),
        _ => {
            error!("{} expected one result, received {}", request, count);
            Err(Error::Service {
                request,
                status: StatusCode::BadUnexpectedError,
                diagnostics: None,
            })
        }
    }
}

impl Session {
    /// Reads the value of nodes by sending a [`ReadRequest`] to the server.
    ///
    /// See OPC UA Part 4 - Services 5.10.2 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `nodes_to_read` - A list of [`ReadValueId`] to be read by the server.
    /// * `timestamps_to_return` - The [`TimestampsToReturn`] for each node, Both, Server, Source or None
    /// * `max_age` - The maximum age of value to read in milliseconds. If 0 the server will
    ///   attempt to read a new value from the datasource.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<DataValue>)` - A list of [`DataValue`] corresponding to each read operation.
    /// * `Err(Error)` - Request failed, the error carries the reason for failure.
    ///
    pub async fn read(
        &self,
        nodes_to_read: &[ReadValueId],
        timestamps_to_return: TimestampsToReturn,
        max_age: f64,
    ) -> Result<Vec<DataValue>, Error> {
        if nodes_to_read.is_empty() {
            session_error!(self, "read(), was not supplied with any nodes to read");
            return Err(StatusCode::BadNothingToDo.into());
        }
        session_debug!(self, "read() requested to read nodes {:?}", nodes_to_read);
        let request = ReadRequest {
            request_header: self.make_request_header(),
            max_age,
            timestamps_to_return,
            nodes_to_read: Some(nodes_to_read.to_vec()),
        };
        let response = self.send(request).await?;
        if let SupportedMessage::ReadResponse(response) = response {
            session_debug!(self, "read(), success");
            process_service_result("ReadRequest", &response.response_header)?;
            Ok(response.results.unwrap_or_default())
        } else {
            session_error!(self, "read() value failed");
            Err(process_unexpected_response("ReadRequest", response))
        }
    }

    /// Reads a single node attribute. See [`Session::read`].
    pub async fn read_one(
        &self,
        node_to_read: ReadValueId,
        timestamps_to_return: TimestampsToReturn,
        max_age: f64,
    ) -> Result<DataValue, Error> {
        let results = self
            .read(&[node_to_read], timestamps_to_return, max_age)
            .await?;
        single_result("ReadRequest", results)
    }

    /// Reads historical values of one or more nodes.
    ///
    /// See OPC UA Part 4 - Services 5.10.3 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `history_read_details` - A history read operation.
    /// * `timestamps_to_return` - Enumeration of which timestamps to return.
    /// * `release_continuation_points` - Flag indicating whether to release the continuation point for the operation.
    /// * `nodes_to_read` - The list of [`HistoryReadValueId`] of the nodes to apply the history read operation to.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<HistoryReadResult>)` - A list of [`HistoryReadResult`] results corresponding to history read operation.
    /// * `Err(Error)` - Request failed, the error carries the reason for failure.
    ///
    pub async fn history_read(
        &self,
        history_read_details: HistoryReadAction,
        timestamps_to_return: TimestampsToReturn,
        release_continuation_points: bool,
        nodes_to_read: &[HistoryReadValueId],
    ) -> Result<Vec<HistoryReadResult>, Error> {
        let request = HistoryReadRequest {
            request_header: self.make_request_header(),
            history_read_details: history_read_details.into(),
            timestamps_to_return,
            release_continuation_points,
            nodes_to_read: if nodes_to_read.is_empty() {
                None
            } else {
                Some(nodes_to_read.to_vec())
            },
        };
        session_debug!(
            self,
            "history_read() requested to read nodes {:?}",
            nodes_to_read
        );
        let response = self.send(request).await?;
        if let SupportedMessage::HistoryReadResponse(response) = response {
            session_debug!(self, "history_read(), success");
            process_service_result("HistoryReadRequest", &response.response_header)?;
            Ok(response.results.unwrap_or_default())
        } else {
            session_error!(self, "history_read() value failed");
            Err(process_unexpected_response("HistoryReadRequest", response))
        }
    }

    /// Reads the history of a single node. See [`Session::history_read`].
    pub async fn history_read_one(
        &self,
        history_read_details: HistoryReadAction,
        timestamps_to_return: TimestampsToReturn,
        release_continuation_points: bool,
        node_to_read: HistoryReadValueId,
    ) -> Result<HistoryReadResult, Error> {
        let results = self
            .history_read(
                history_read_details,
                timestamps_to_return,
                release_continuation_points,
                &[node_to_read],
            )
            .await?;
        single_result("HistoryReadRequest", results)
    }

    /// Reads aggregated history values, e.g. an average over each processing interval, of one
    /// or more nodes. The same aggregate is applied to every node.
    ///
    /// # Arguments
    ///
    /// * `nodes` - The nodes to read the aggregate of.
    /// * `start_time` - Start of the period.
    /// * `end_time` - End of the period.
    /// * `processing_interval` - Length of each aggregation interval in milliseconds.
    /// * `aggregate_type` - The aggregate function, e.g. `ObjectId::AggregateFunction_Average`.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<HistoryReadResult>)` - One result per node.
    /// * `Err(Error)` - Request failed, the error carries the reason for failure.
    ///
    pub async fn read_aggregate_value(
        &self,
        nodes: &[NodeId],
        start_time: DateTime,
        end_time: DateTime,
        processing_interval: f64,
        aggregate_type: NodeId,
    ) -> Result<Vec<HistoryReadResult>, Error> {
        if nodes.is_empty() {
            session_error!(self, "read_aggregate_value() was not supplied with any nodes");
            return Err(StatusCode::BadNothingToDo.into());
        }
        let details = ReadProcessedDetails {
            start_time,
            end_time,
            processing_interval,
            aggregate_type: Some(vec![aggregate_type; nodes.len()]),
        };
        let nodes_to_read: Vec<HistoryReadValueId> =
            nodes.iter().cloned().map(HistoryReadValueId::from).collect();
        self.history_read(
            HistoryReadAction::ReadProcessedDetails(details),
            TimestampsToReturn::Source,
            false,
            &nodes_to_read,
        )
        .await
    }

    /// Writes values to nodes by sending a [`WriteRequest`] to the server. Note that some servers may reject DataValues
    /// containing source or server timestamps.
    ///
    /// See OPC UA Part 4 - Services 5.10.4 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `nodes_to_write` - A list of [`WriteValue`] to be sent to the server.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<StatusCode>)` - A list of [`StatusCode`] results corresponding to each write operation.
    /// * `Err(Error)` - Request failed, the error carries the reason for failure.
    ///
    pub async fn write(&self, nodes_to_write: &[WriteValue]) -> Result<Vec<StatusCode>, Error> {
        if nodes_to_write.is_empty() {
            session_error!(self, "write() was not supplied with any nodes to write");
            return Err(StatusCode::BadNothingToDo.into());
        }
        let request = WriteRequest {
            request_header: self.make_request_header(),
            nodes_to_write: Some(nodes_to_write.to_vec()),
        };
        let response = self.send(request).await?;
        if let SupportedMessage::WriteResponse(response) = response {
            session_debug!(self, "write(), success");
            process_service_result("WriteRequest", &response.response_header)?;
            Ok(response.results.unwrap_or_default())
        } else {
            session_error!(self, "write() failed {:?}", response);
            Err(process_unexpected_response("WriteRequest", response))
        }
    }

    /// Writes a single value. See [`Session::write`].
    pub async fn write_one(&self, node_to_write: WriteValue) -> Result<StatusCode, Error> {
        let results = self.write(&[node_to_write]).await?;
        single_result("WriteRequest", results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_result_requires_exactly_one() {
        assert_eq!(single_result("ReadRequest", vec![1]).unwrap(), 1);
        assert_eq!(
            single_result::<u32>("ReadRequest", vec![]).unwrap_err().status(),
            StatusCode::BadUnexpectedError
        );
        assert!(single_result("ReadRequest", vec![1, 2]).is_err());
    }
}
