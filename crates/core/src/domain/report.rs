use serde::{Deserialize, Serialize};

/// Service types offered by the incident and balance forms. The wire field
/// stays a free string so unknown values from older clients still load.
pub const SERVICE_TYPES: [&str; 4] = ["Mobile", "Fiber", "PEOTV", "Enterprise"];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentReport {
    pub customer_name: String,
    pub email: String,
    pub service_type: String,
    pub issue_description: String,
    pub location: String,
}

impl IncidentReport {
    /// Names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("customerName", &self.customer_name),
            ("email", &self.email),
            ("serviceType", &self.service_type),
            ("issueDescription", &self.issue_description),
            ("location", &self.location),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::IncidentReport;

    #[test]
    fn report_uses_camel_case_wire_names() {
        let report = IncidentReport {
            customer_name: "Alice".to_string(),
            email: "alice@x.com".to_string(),
            service_type: "Fiber".to_string(),
            issue_description: "No signal".to_string(),
            location: "Colombo".to_string(),
        };

        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["customerName"], "Alice");
        assert_eq!(json["issueDescription"], "No signal");
        assert!(report.missing_fields().is_empty());
    }

    #[test]
    fn blank_fields_are_reported_missing() {
        let report = IncidentReport {
            customer_name: "Bob".to_string(),
            location: "  ".to_string(),
            ..IncidentReport::default()
        };

        assert_eq!(
            report.missing_fields(),
            vec!["email", "serviceType", "issueDescription", "location"]
        );
    }
}
