//! Fire-and-forget audit logging.

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;
use vellum_core::models::activity::CreateActivityLog;
use vellum_core::repository::ActivityLogRepository;

use crate::middleware::ClientInfo;
use crate::state::AppState;

/// An activity entry under construction. Nothing is written until
/// [`Activity::record`] is called.
pub struct Activity {
    input: CreateActivityLog,
}

impl Activity {
    pub fn new(state: &AppState, tenant_id: Uuid, user_id: Option<Uuid>, action: &str) -> Self {
        Self {
            input: CreateActivityLog {
                tenant_id,
                user_id,
                action: action.to_string(),
                resource_type: None,
                resource_id: None,
                ip_address: None,
                user_agent: None,
                metadata: None,
                expires_at: state.activity_expires_at(),
            },
        }
    }

    pub fn resource(mut self, resource_type: &str, resource_id: impl ToString) -> Self {
        self.input.resource_type = Some(resource_type.to_string());
        self.input.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn client(mut self, client: &ClientInfo) -> Self {
        self.input.ip_address = Some(client.ip.clone());
        self.input.user_agent = client.user_agent.clone();
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.input.metadata = Some(metadata);
        self
    }

    /// Write the entry in the background. Failures are logged and
    /// never reach the caller.
    pub fn record(self, state: &AppState) {
        let repo = state.activity.clone();
        let input = self.input;
        tokio::spawn(async move {
            let action = input.action.clone();
            let tenant_id = input.tenant_id;
            if let Err(e) = repo.append(input).await {
                warn!(error = %e, %action, %tenant_id, "Failed to write activity log entry");
            }
        });
    }
}
