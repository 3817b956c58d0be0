//! REST client for the annotation backend.
//!
//! Wraps the dataset, annotation and model endpoints under `/api/v1`
//! using [`reqwest`]. Responses are decoded into `labelforge_core` records;
//! non-2xx statuses become [`ClientError::Api`].

use labelforge_core::annotation::{
    AnnotationsResponse, PersistedAnnotation, SaveAnnotationsRequest, SaveAnnotationsResponse,
};
use labelforge_core::dataset::{DatasetImagesResponse, DatasetRecord, DatasetUpdate, ImageRecord};
use labelforge_core::error::CoreError;
use labelforge_core::model::{ModelImport, ModelRecord, ModelTypesResponse};
use labelforge_core::sequence::{SaveTicket, SAVE_SEQUENCE_HEADER};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Path prefix shared by every backend endpoint.
pub const API_PREFIX: &str = "/api/v1";

/// HTTP client for one backend instance.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Create a client from configuration, applying the request timeout.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(client, &config.api_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    ///
    /// * `api_url` - Base URL without the `/api/v1` prefix, e.g.
    ///   `http://localhost:12000`.
    pub fn with_client(client: reqwest::Client, api_url: &str) -> Self {
        Self {
            client,
            base_url: format!("{}{API_PREFIX}", api_url.trim_end_matches('/')),
        }
    }

    /// Base URL including the `/api/v1` prefix.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    // ---- datasets ----

    /// `GET /datasets/`
    pub async fn list_datasets(&self) -> ClientResult<Vec<DatasetRecord>> {
        let response = self.client.get(self.url("/datasets/")).send().await?;
        Self::parse_response(response).await
    }

    /// `GET /datasets/{id}`
    pub async fn get_dataset(&self, dataset_id: &str) -> ClientResult<DatasetRecord> {
        let response = self
            .client
            .get(self.url(&format!("/datasets/{dataset_id}")))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// `PUT /datasets/{id}`
    ///
    /// Renames a dataset or changes its description. The update is validated
    /// locally and the name trimmed before sending.
    pub async fn update_dataset(
        &self,
        dataset_id: &str,
        update: &DatasetUpdate,
    ) -> ClientResult<DatasetRecord> {
        update.validate()?;
        let body = DatasetUpdate {
            name: update.name.trim().to_string(),
            description: update.description.clone(),
        };
        let response = self
            .client
            .put(self.url(&format!("/datasets/{dataset_id}")))
            .json(&body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// `DELETE /datasets/{id}`
    ///
    /// The backend removes the dataset together with its images and
    /// annotations.
    pub async fn delete_dataset(&self, dataset_id: &str) -> ClientResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/datasets/{dataset_id}")))
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// `GET /datasets/{id}/images`
    pub async fn list_dataset_images(&self, dataset_id: &str) -> ClientResult<Vec<ImageRecord>> {
        let response = self
            .client
            .get(self.url(&format!("/datasets/{dataset_id}/images")))
            .send()
            .await?;
        let body: DatasetImagesResponse = Self::parse_response(response).await?;
        Ok(body.images)
    }

    // ---- annotations ----

    /// `GET /annotations/{image_id}/annotations`
    pub async fn get_annotations(&self, image_id: &str) -> ClientResult<Vec<PersistedAnnotation>> {
        let response = self
            .client
            .get(self.url(&format!("/annotations/{image_id}/annotations")))
            .send()
            .await?;
        let body: AnnotationsResponse = Self::parse_response(response).await?;
        Ok(body.annotations)
    }

    /// `POST /annotations/{image_id}/annotations`
    ///
    /// Replaces the full annotation set of the image. The ticket's sequence
    /// number travels in the `x-save-sequence` header.
    pub async fn save_annotations(
        &self,
        ticket: &SaveTicket,
        annotations: Vec<PersistedAnnotation>,
    ) -> ClientResult<SaveAnnotationsResponse> {
        let body = SaveAnnotationsRequest { annotations };
        let response = self
            .client
            .post(self.url(&format!("/annotations/{}/annotations", ticket.image_id)))
            .header(SAVE_SEQUENCE_HEADER, ticket.sequence.to_string())
            .json(&body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    // ---- models ----

    /// `GET /models/`
    pub async fn list_models(&self) -> ClientResult<Vec<ModelRecord>> {
        let response = self.client.get(self.url("/models/")).send().await?;
        Self::parse_response(response).await
    }

    /// `GET /models/{id}`
    pub async fn get_model(&self, model_id: &str) -> ClientResult<ModelRecord> {
        let response = self
            .client
            .get(self.url(&format!("/models/{model_id}")))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// `GET /models/types`
    pub async fn supported_model_types(&self) -> ClientResult<Vec<String>> {
        let response = self.client.get(self.url("/models/types")).send().await?;
        let body: ModelTypesResponse = Self::parse_response(response).await?;
        Ok(body.model_types)
    }

    /// `POST /models/import` as multipart form data.
    ///
    /// The import is validated against `supported_types` before anything is
    /// sent.
    pub async fn import_model(&self, import: ModelImport, supported_types: &[String]) -> ClientResult<()> {
        import.validate(supported_types)?;

        let file = reqwest::multipart::Part::bytes(import.bytes).file_name(import.file_name);
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("name", import.name.trim().to_string())
            .text("description", import.description.unwrap_or_default())
            .text("type", import.model_type);

        let response = self
            .client
            .post(self.url("/models/import"))
            .multipart(form)
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// `DELETE /models/{id}`
    ///
    /// Refuses pre-trained models locally; the backend only accepts deletion
    /// of custom imports.
    pub async fn delete_model(&self, model: &ModelRecord) -> ClientResult<()> {
        if !model.can_delete() {
            return Err(ClientError::Core(CoreError::Conflict(format!(
                "model '{}' is pre-trained and cannot be deleted",
                model.name
            ))));
        }

        let response = self
            .client
            .delete(self.url(&format!("/models/{}", model.id)))
            .send()
            .await?;
        Self::check_status(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ClientError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> ClientResult<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> ClientResult<T> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> ClientResult<()> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
