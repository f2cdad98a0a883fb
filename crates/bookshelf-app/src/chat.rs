// Assembles chat questions from the query, the reader's current selection
// and the signed-in user, then sends them.

use std::sync::Arc;

use tracing::{info, warn};

use bookshelf_api::{ApiError, ContentApi};
use bookshelf_core::protocol::{ChatRequest, ChatResponse, UserProfile, ValidationError};
use bookshelf_core::selection::SelectionObserver;

pub struct ChatComposer<C: ContentApi> {
    api: C,
    selection: Arc<SelectionObserver>,
}

impl<C: ContentApi> ChatComposer<C> {
    pub fn new(api: C, selection: Arc<SelectionObserver>) -> Self {
        Self { api, selection }
    }

    pub fn selection(&self) -> &SelectionObserver {
        &self.selection
    }

    /// Build the request as it would be sent right now. The selection is
    /// read at this moment, not tracked.
    pub fn compose(
        &self,
        query: &str,
        user: Option<&UserProfile>,
    ) -> Result<ChatRequest, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::new("query", "Please enter a question").into());
        }
        Ok(ChatRequest {
            query: query.to_string(),
            user_id: user.map(|u| u.id.clone()).filter(|id| !id.is_empty()),
            selected_text: self.selection.selected_text(),
        })
    }

    pub async fn send(
        &self,
        query: &str,
        user: Option<&UserProfile>,
    ) -> Result<ChatResponse, ApiError> {
        let request = self.compose(query, user)?;
        info!(
            with_selection = request.selected_text.is_some(),
            signed_in = request.user_id.is_some(),
            "sending chat question"
        );
        let response = self.api.chat(&request).await.inspect_err(|e| {
            warn!("chat failed: {e}");
        })?;
        info!(citations = response.citations.len(), "chat answered");
        Ok(response)
    }
}
