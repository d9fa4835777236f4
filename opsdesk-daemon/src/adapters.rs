//! Local collaborator adapters
//!
//! Stand-ins for the external delivery channel and the canonical
//! persistence layer, used when the daemon runs without a real transport or
//! storage adapter attached. The echo channel acknowledges every message;
//! the logging persistence records every write at debug level. Both honor
//! the real contracts, so swapping in production adapters is a wiring
//! change only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opsdesk_core::{
    DeliveryChannel, DeliveryRequest, DeliveryResponse, Message, Persistence, Result, ThreadStatus,
};
use tracing::{debug, info};

/// Delivery channel that acknowledges locally instead of transmitting
pub struct EchoDelivery;

#[async_trait]
impl DeliveryChannel for EchoDelivery {
    async fn deliver(&self, request: DeliveryRequest) -> Result<DeliveryResponse> {
        info!(
            target_id = %request.target_id,
            kind = ?request.kind,
            has_media = request.media_ref.is_some(),
            "echo delivery accepted outbound message"
        );
        Ok(DeliveryResponse::ok())
    }
}

/// Persistence that logs canonical writes without storing them
pub struct LoggingPersistence;

#[async_trait]
impl Persistence for LoggingPersistence {
    async fn append_message(&self, thread_id: &str, message: &Message) -> Result<()> {
        debug!(thread = thread_id, message = %message.id, "append message");
        Ok(())
    }

    async fn update_thread_preview(
        &self,
        thread_id: &str,
        preview: &str,
        _last_activity: DateTime<Utc>,
    ) -> Result<()> {
        debug!(thread = thread_id, preview, "update thread preview");
        Ok(())
    }

    async fn set_status_and_assignee(
        &self,
        thread_id: &str,
        status: ThreadStatus,
        assignee: &str,
    ) -> Result<()> {
        debug!(thread = thread_id, %status, assignee, "update status/assignee");
        Ok(())
    }

    async fn clear_unread(&self, thread_id: &str) -> Result<()> {
        debug!(thread = thread_id, "clear unread count");
        Ok(())
    }
}
