// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Notification payloads carried by publish responses, and helpers to build them.

use crate::types::{
    data_value::{DataValue, DateTime, Variant},
    extension_object::ExtensionObject,
    node_id::ObjectId,
    service_types::DiagnosticInfo,
    status_code::StatusCode,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredItemNotification {
    pub client_handle: u32,
    pub value: DataValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DataChangeNotification {
    pub monitored_items: Option<Vec<MonitoredItemNotification>>,
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFieldList {
    pub client_handle: u32,
    pub event_fields: Option<Vec<Variant>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EventNotificationList {
    pub events: Option<Vec<EventFieldList>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangeNotification {
    pub status: StatusCode,
    pub diagnostic_info: DiagnosticInfo,
}

/// One entry of a notification message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotificationData {
    DataChange(DataChangeNotification),
    Event(EventNotificationList),
    StatusChange(StatusChangeNotification),
    /// A payload still wrapped in its extension object. It is resolved into one of the other
    /// variants before dispatch.
    ExtensionObject(ExtensionObject),
}

impl NotificationData {
    /// The declared type name of the notification.
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationData::DataChange(_) => "DataChangeNotification",
            NotificationData::Event(_) => "EventNotificationList",
            NotificationData::StatusChange(_) => "StatusChangeNotification",
            NotificationData::ExtensionObject(_) => "ExtensionObject",
        }
    }

    /// Unwraps an opaque payload into the notification its encoding id names. Notifications that are
    /// already typed are returned as they are.
    pub fn resolve(self) -> Result<NotificationData, StatusCode> {
        let NotificationData::ExtensionObject(eo) = self else {
            return Ok(self);
        };
        match ObjectId::from_node_id(&eo.node_id) {
            Some(ObjectId::DataChangeNotification_Encoding_DefaultBinary) => {
                eo.decode_inner().map(NotificationData::DataChange)
            }
            Some(ObjectId::EventNotificationList_Encoding_DefaultBinary) => {
                eo.decode_inner().map(NotificationData::Event)
            }
            Some(ObjectId::StatusChangeNotification_Encoding_DefaultBinary) => {
                eo.decode_inner().map(NotificationData::StatusChange)
            }
            _ => {
                debug!("Ignoring a notification of type {}", eo.node_id);
                Err(StatusCode::BadDataTypeIdUnknown)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub sequence_number: u32,
    pub publish_time: DateTime,
    pub notification_data: Option<Vec<NotificationData>>,
}

impl NotificationMessage {
    /// Create a notification message which contains data change AND / OR events.
    pub fn data_change(
        sequence_number: u32,
        publish_time: DateTime,
        data_change_notifications: Vec<MonitoredItemNotification>,
        event_notifications: Vec<EventFieldList>,
    ) -> NotificationMessage {
        let mut notification_data = Vec::with_capacity(2);
        if !data_change_notifications.is_empty() {
            notification_data.push(NotificationData::DataChange(DataChangeNotification {
                monitored_items: Some(data_change_notifications),
                diagnostic_infos: None,
            }));
        }
        if !event_notifications.is_empty() {
            notification_data.push(NotificationData::Event(EventNotificationList {
                events: Some(event_notifications),
            }));
        }
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: Some(notification_data),
        }
    }

    /// Create a status change notification message
    pub fn status_change(
        sequence_number: u32,
        publish_time: DateTime,
        status: StatusCode,
    ) -> NotificationMessage {
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: Some(vec![NotificationData::StatusChange(
                StatusChangeNotification {
                    status,
                    diagnostic_info: DiagnosticInfo::null(),
                },
            )]),
        }
    }

    /// Create a keep-alive notification message
    pub fn keep_alive(sequence_number: u32, publish_time: DateTime) -> NotificationMessage {
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: None,
        }
    }

    /// A message with no notification data is a keep-alive.
    pub fn is_keep_alive(&self) -> bool {
        self.notification_data
            .as_ref()
            .map_or(true, |data| data.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_alive_detection() {
        let now = chrono::Utc::now();
        assert!(NotificationMessage::keep_alive(1, now).is_keep_alive());
        assert!(NotificationMessage::data_change(2, now, vec![], vec![]).is_keep_alive());
        assert!(!NotificationMessage::status_change(3, now, StatusCode::BadTimeout).is_keep_alive());
    }

    #[test]
    fn resolve_json_payload() {
        let notification = DataChangeNotification {
            monitored_items: Some(vec![MonitoredItemNotification {
                client_handle: 7,
                value: DataValue {
                    value: Some(Variant::Double(1.5)),
                    ..Default::default()
                },
            }]),
            diagnostic_infos: None,
        };
        let eo = ExtensionObject::from_json(
            ObjectId::DataChangeNotification_Encoding_DefaultBinary,
            &notification,
        )
        .unwrap();
        let resolved = NotificationData::ExtensionObject(eo).resolve().unwrap();
        assert_eq!(resolved, NotificationData::DataChange(notification));
    }

    #[test]
    fn resolve_unknown_payload() {
        let eo = ExtensionObject::from_json((0, 12345u32), &1u32).unwrap();
        assert!(NotificationData::ExtensionObject(eo).resolve().is_err());
        let typed = NotificationData::Event(EventNotificationList::default());
        assert_eq!(typed.clone().resolve().unwrap(), typed);
    }
}
