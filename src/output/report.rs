use crate::extract::Endpoint;
use chrono::{DateTime, Utc};

/// Endpoints discovered in one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReport {
    /// URL (or `file://` path) of the resource
    pub resource: String,

    /// Endpoints in the order they appear in the resource
    pub endpoints: Vec<Endpoint>,
}

impl ResourceReport {
    pub fn new(resource: impl Into<String>, endpoints: Vec<Endpoint>) -> Self {
        Self {
            resource: resource.into(),
            endpoints,
        }
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }
}

/// Aggregate totals for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub generated_at: DateTime<Utc>,
    pub total_resources: usize,
    pub total_endpoints: usize,
}

impl Metadata {
    /// Summarizes a set of reports
    pub fn from_reports(reports: &[ResourceReport], generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            total_resources: reports.len(),
            total_endpoints: reports.iter().map(ResourceReport::endpoint_count).sum(),
        }
    }
}
