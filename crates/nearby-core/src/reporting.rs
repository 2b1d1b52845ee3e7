//! Error reporting sinks for failed remote calls.
//!
//! Failures of the friend service never reach the callers of the cache; they
//! are handed to an `ErrorReporter` instead. Reporting is fire-and-forget and
//! must not block the caller.

use std::collections::BTreeMap;

use tracing::{debug, error};

use crate::api::{ApiClient, RemoteCallFailure};

/// Name of the analytics event recorded for every failed remote call
const ERROR_EVENT: &str = "error";

pub trait ErrorReporter: Send + Sync {
    fn report(&self, failure: &RemoteCallFailure);
}

/// Reports failures as structured log events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, failure: &RemoteCallFailure) {
        error!(code = failure.code, message = %failure.message, "Remote call failed");
    }
}

/// Logs failures and records them as `error` analytics events on the server.
///
/// The analytics request runs on a spawned task, so `report` must be called
/// from within a Tokio runtime.
#[derive(Clone)]
pub struct AnalyticsReporter {
    api: ApiClient,
}

impl AnalyticsReporter {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn dimensions(failure: &RemoteCallFailure) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("code".to_string(), failure.code.to_string()),
            ("message".to_string(), failure.message.clone()),
        ])
    }
}

impl ErrorReporter for AnalyticsReporter {
    fn report(&self, failure: &RemoteCallFailure) {
        TracingReporter.report(failure);

        let api = self.api.clone();
        let dimensions = Self::dimensions(failure);
        tokio::spawn(async move {
            if let Err(e) = api.track_event(ERROR_EVENT, &dimensions).await {
                // Reporting the reporting failure would loop
                debug!(error = %e, "Failed to record error event");
            }
        });
    }
}
