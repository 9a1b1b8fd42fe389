use tracing::info;

use super::editor::accept;
use super::transport::Transport;
use super::ClientError;
use crate::metadata::{apply, ResumeMetadata, SectionPatch};

const PATH: &str = "resume-metadata";

/// Style editors write through here. Every change goes through the reducer
/// synchronously; `save` later sends the queued section patches in order.
pub struct MetadataEditor<T> {
    transport: T,
    document: ResumeMetadata,
    pending: Vec<SectionPatch>,
}

impl<T: Transport> MetadataEditor<T> {
    pub async fn load(transport: T) -> Result<Self, ClientError> {
        let data = accept(transport.get(PATH).await?)?;
        let document = match data {
            Some(value) if !value.is_null() => serde_json::from_value(value)?,
            _ => ResumeMetadata::default(),
        };
        Ok(Self {
            transport,
            document,
            pending: Vec::new(),
        })
    }

    pub fn document(&self) -> &ResumeMetadata {
        &self.document
    }

    pub fn has_unsaved_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Applies a change locally and queues it for the next `save`.
    pub fn change(&mut self, patch: SectionPatch) -> &ResumeMetadata {
        self.document = apply(std::mem::take(&mut self.document), patch.clone());
        self.pending.push(patch);
        &self.document
    }

    /// Sends queued patches. Stops at the first failure, leaving it and
    /// everything after it queued.
    ///
    /// Each confirmation carries the server's copy of the document; the
    /// patches still queued are replayed on top of it, so `document()`
    /// always shows every change the user made, saved or not.
    pub async fn save(&mut self) -> Result<usize, ClientError> {
        let mut sent = 0;
        while let Some(patch) = self.pending.first() {
            let body = serde_json::to_value(patch)?;
            let confirmed = accept(self.transport.patch(PATH, body).await?)?;
            self.pending.remove(0);
            sent += 1;

            if let Some(value) = confirmed.filter(|v| !v.is_null()) {
                let server = serde_json::from_value::<ResumeMetadata>(value)?;
                self.document = self.pending.iter().cloned().fold(server, apply);
            }
        }
        if sent > 0 {
            info!("Saved {sent} resume metadata change(s)");
        }
        Ok(sent)
    }
}
