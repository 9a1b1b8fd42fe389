use serde_json::Value;
use tracing::{info, warn};

use super::diff::changed_fields;
use super::transport::Transport;
use super::ClientError;
use crate::details::DetailResource;
use crate::models::Envelope;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing differed from the last fetched state; no request was sent.
    Unchanged,
    /// The listed fields were sent and accepted.
    Saved { fields: Vec<String> },
}

/// Form state for one detail resource. Keeps the last state the server
/// confirmed and submits only the difference.
pub struct DetailEditor<R, T> {
    transport: T,
    original: R,
}

impl<R: DetailResource, T: Transport> DetailEditor<R, T> {
    /// Fetches the current record.
    pub async fn load(transport: T) -> Result<Self, ClientError> {
        let envelope = transport.get(R::PATH).await?;
        let original = decode_record(accept(envelope)?)?;
        Ok(Self {
            transport,
            original,
        })
    }

    /// Last state confirmed by the server.
    pub fn original(&self) -> &R {
        &self.original
    }

    pub async fn submit(&mut self, edited: &R) -> Result<SubmitOutcome, ClientError> {
        if let Some(field) = edited.missing_required() {
            warn!("{} not submitted: {field} is required", R::LABEL);
            return Err(ClientError::Validation { field });
        }

        let changes = changed_fields(
            &serde_json::to_value(&self.original)?,
            &serde_json::to_value(edited)?,
        );
        if changes.is_empty() {
            return Ok(SubmitOutcome::Unchanged);
        }

        let fields: Vec<String> = changes.keys().cloned().collect();
        let envelope = self
            .transport
            .patch(R::PATH, Value::Object(changes))
            .await?;
        let confirmed = accept(envelope)?;

        self.original = match confirmed {
            Some(data) if !data.is_null() => serde_json::from_value(data)?,
            _ => edited.clone(),
        };
        info!("{} saved ({})", R::LABEL, fields.join(", "));
        Ok(SubmitOutcome::Saved { fields })
    }
}

/// Unwraps a successful envelope; `success: false` becomes `Rejected`.
pub(crate) fn accept(envelope: Envelope<Value>) -> Result<Option<Value>, ClientError> {
    if envelope.success {
        Ok(envelope.data)
    } else {
        warn!("Request rejected: {}", envelope.message);
        Err(ClientError::Rejected(envelope.message))
    }
}

fn decode_record<R: DetailResource>(data: Option<Value>) -> Result<R, ClientError> {
    match data {
        Some(value) if !value.is_null() => Ok(serde_json::from_value(value)?),
        _ => Ok(R::default()),
    }
}
