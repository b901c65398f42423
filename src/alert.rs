//! data structures for deserializing incoming alerts
use std::collections::HashMap;

use serde::Deserialize;

/// overall status of an alert group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
	Resolved,
	/// everything that isn't `resolved` is treated as firing
	#[serde(other)]
	Firing,
}

impl GroupStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Resolved => "resolved",
			Self::Firing => "firing",
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
/// data from prometheus received by the alertmanager webhook receiver
///
/// only `version` and `status` are mandatory, alertmanager leaves the rest
/// out or empty depending on the route configuration
#[allow(clippy::missing_docs_in_private_items)]
pub struct AlertGroup {
	pub version: String,
	#[serde(default)]
	pub group_key: String,

	pub status: GroupStatus,
	#[serde(default)]
	pub receiver: String,
	#[serde(default)]
	pub alerts: Vec<AlertDetail>,
	#[serde(default)]
	pub group_labels: HashMap<String, String>,
	#[serde(default)]
	pub common_labels: HashMap<String, String>,
	#[serde(default)]
	pub common_annotations: HashMap<String, String>,
	#[serde(default, rename = "externalURL")]
	pub external_url: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::missing_docs_in_private_items)]
pub struct AlertDetail {
	#[serde(default)]
	pub labels: HashMap<String, String>,
	#[serde(default)]
	pub annotations: HashMap<String, String>,
	/// informational, kept as sent since alertmanager uses the zero time for
	/// alerts that haven't ended yet
	#[serde(default)]
	pub starts_at: String,
	#[serde(default)]
	pub ends_at: String,
}

impl AlertDetail {
	/// value of the label used to look up the status page component
	pub fn component_label(&self, label_name: &str) -> Option<&str> {
		self.labels.get(label_name).map(String::as_str)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn minimal_payload() {
		let group: AlertGroup = serde_json::from_str(
			r#"{"version":"4","status":"firing","alerts":[{"labels":{"service":"api"}}]}"#,
		)
		.unwrap();

		assert_eq!(group.status, GroupStatus::Firing);
		assert_eq!(group.alerts.len(), 1);
		assert_eq!(group.alerts[0].component_label("service"), Some("api"));
		assert_eq!(group.alerts[0].component_label("instance"), None);
		assert!(group.group_key.is_empty());
	}

	#[test]
	fn unknown_status_is_firing() {
		let group: AlertGroup =
			serde_json::from_str(r#"{"version":"4","status":"pending"}"#).unwrap();
		assert_eq!(group.status, GroupStatus::Firing);

		let group: AlertGroup =
			serde_json::from_str(r#"{"version":"4","status":"resolved"}"#).unwrap();
		assert_eq!(group.status, GroupStatus::Resolved);
	}

	#[test]
	fn full_alertmanager_payload() {
		let group: AlertGroup = serde_json::from_str(
			r#"{
				"version": "4",
				"groupKey": "{}:{alertname=\"ServiceDown\"}",
				"status": "resolved",
				"receiver": "cachet",
				"groupLabels": {"alertname": "ServiceDown"},
				"commonLabels": {"alertname": "ServiceDown", "severity": "critical"},
				"commonAnnotations": {"summary": "service down"},
				"externalURL": "http://alertmanager:9093",
				"alerts": [
					{
						"labels": {"alertname": "ServiceDown", "service": "api"},
						"annotations": {},
						"startsAt": "2022-05-01T10:00:00Z",
						"endsAt": "2022-05-01T10:42:00Z"
					}
				]
			}"#,
		)
		.unwrap();

		assert_eq!(group.receiver, "cachet");
		assert_eq!(group.external_url, "http://alertmanager:9093");
		assert_eq!(group.common_labels.get("severity").map(String::as_str), Some("critical"));
		assert_eq!(group.alerts[0].ends_at, "2022-05-01T10:42:00Z");
	}

	#[test]
	fn version_and_status_are_required() {
		assert!(serde_json::from_str::<AlertGroup>(r#"{"status":"firing"}"#).is_err());
		assert!(serde_json::from_str::<AlertGroup>(r#"{"version":"4"}"#).is_err());
	}
}
