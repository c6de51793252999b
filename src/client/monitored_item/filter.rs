// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::{
    client::Error,
    types::{AttributeId, MonitoringFilter, ReadValueId},
};

/// Checks that the filter of a monitored item suits the attribute it monitors. Events require an
/// event filter, values may have a data change or aggregate filter and other attributes take
/// no filter at all.
pub(crate) fn validate_filter(
    item_to_monitor: &ReadValueId,
    filter: Option<&MonitoringFilter>,
) -> Result<(), Error> {
    match (item_to_monitor.attribute(), filter) {
        (Some(AttributeId::EventNotifier), Some(MonitoringFilter::Event(_))) => Ok(()),
        (Some(AttributeId::EventNotifier), filter) => Err(Error::Configuration(format!(
            "monitoring the event notifier of {} requires an EventFilter, got {}",
            item_to_monitor.node_id,
            filter.map_or("no filter", |f| f.kind())
        ))),
        (Some(AttributeId::Value), None)
        | (Some(AttributeId::Value), Some(MonitoringFilter::DataChange(_)))
        | (Some(AttributeId::Value), Some(MonitoringFilter::Aggregate(_))) => Ok(()),
        (_, None) => Ok(()),
        (_, Some(filter)) => Err(Error::Configuration(format!(
            "a {} cannot be applied to attribute {} of {}",
            filter.kind(),
            item_to_monitor.attribute_id,
            item_to_monitor.node_id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AggregateFilter, DataChangeFilter, EventFilter, NodeId, ObjectId,
    };

    fn item(attribute_id: AttributeId) -> ReadValueId {
        ReadValueId::new(NodeId::new(2, "Demo"), attribute_id)
    }

    #[test]
    fn event_notifier_requires_event_filter() {
        let notifier = item(AttributeId::EventNotifier);
        assert!(validate_filter(
            &notifier,
            Some(&MonitoringFilter::Event(EventFilter::default()))
        )
        .is_ok());
        assert!(validate_filter(&notifier, None).is_err());
        assert!(validate_filter(
            &notifier,
            Some(&MonitoringFilter::DataChange(DataChangeFilter::default()))
        )
        .is_err());
    }

    #[test]
    fn value_accepts_data_change_and_aggregate() {
        let value = item(AttributeId::Value);
        assert!(validate_filter(&value, None).is_ok());
        assert!(validate_filter(
            &value,
            Some(&MonitoringFilter::DataChange(DataChangeFilter::default()))
        )
        .is_ok());
        let aggregate = MonitoringFilter::Aggregate(AggregateFilter {
            start_time: chrono::Utc::now(),
            aggregate_type: ObjectId::AggregateFunction_Average.into(),
            processing_interval: 1000.0,
        });
        assert!(validate_filter(&value, Some(&aggregate)).is_ok());
        assert!(validate_filter(
            &value,
            Some(&MonitoringFilter::Event(EventFilter::default()))
        )
        .is_err());
    }

    #[test]
    fn other_attributes_take_no_filter() {
        let display_name = item(AttributeId::DisplayName);
        assert!(validate_filter(&display_name, None).is_ok());
        let err = validate_filter(
            &display_name,
            Some(&MonitoringFilter::DataChange(DataChangeFilter::default())),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
