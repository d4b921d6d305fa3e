/// Label service
///
/// Labels belong to one user. Deleting a label leaves its ID on any task
/// that carries it; such IDs are simply not resolved anymore.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::auth::authorization::AuthzError;
use crate::models::label::{is_valid_color, Label};
use crate::store::LabelStore;

/// Label operations
#[derive(Clone)]
pub struct LabelService {
    labels: Arc<dyn LabelStore>,
}

impl LabelService {
    pub fn new(labels: Arc<dyn LabelStore>) -> Self {
        Self { labels }
    }

    pub async fn create_label(
        &self,
        user_id: &str,
        name: &str,
        color: Option<String>,
    ) -> ServiceResult<Label> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidInput("Label name cannot be empty".to_string()));
        }
        if let Some(color) = &color {
            if !is_valid_color(color) {
                return Err(ServiceError::InvalidInput(format!(
                    "Invalid color '{}', expected #RRGGBB",
                    color
                )));
            }
        }

        let label = self.labels.insert_label(Label::new(user_id, name, color)).await?;

        info!(label_id = %label.id, user_id, "Label created");
        Ok(label)
    }

    /// The user's labels, by name
    pub async fn list_labels(&self, user_id: &str) -> ServiceResult<Vec<Label>> {
        Ok(self.labels.list_labels(user_id).await?)
    }

    /// Deletes a label (owner only)
    pub async fn delete_label(&self, user_id: &str, label_id: Uuid) -> ServiceResult<()> {
        let label = self
            .labels
            .get_label(label_id)
            .await?
            .ok_or(ServiceError::LabelNotFound(label_id))?;

        if label.user_id != user_id {
            return Err(AuthzError::NotAuthorized.into());
        }

        if !self.labels.delete_label(label_id).await? {
            return Err(ServiceError::LabelNotFound(label_id));
        }

        info!(%label_id, user_id, "Label deleted");
        Ok(())
    }
}
