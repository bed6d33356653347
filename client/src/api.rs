use gloo_net::http::{Request, Response};
use serde_json::Value;
use wasm_bindgen::JsCast;
use web_sys::{Blob, File, FormData};

use relief_shared::api::{AUDIO_FILE_NAME, INCIDENTS_PATH, RESOURCES_PATH, SHELTERS_PATH, verify_path};
use relief_shared::{ApiError, DashboardApi, DashboardConfig, EntityId, IncidentReport, NewShelter};

const IMAGE_FILE_NAME: &str = "report-image";

/// [`DashboardApi`] over `fetch`, rooted at the configured API base.
#[derive(Debug, Clone)]
pub(crate) struct HttpApi {
    config: DashboardConfig,
}

impl HttpApi {
    pub(crate) fn new(config: DashboardConfig) -> Self {
        Self { config }
    }

    fn url(&self, path: &str) -> String {
        self.config.endpoint(path)
    }

    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        let resp = Request::get(&self.url(path))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        read_json(resp).await
    }
}

async fn read_json(resp: Response) -> Result<Value, ApiError> {
    if !resp.ok() {
        return Err(ApiError::Status(resp.status()));
    }
    resp.json::<Value>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

fn js_error(error: wasm_bindgen::JsValue) -> ApiError {
    ApiError::Transport(format!("{error:?}"))
}

fn multipart(report: IncidentReport<Blob>) -> Result<FormData, ApiError> {
    let form = FormData::new().map_err(js_error)?;
    for (name, value) in report.text_parts() {
        form.append_with_str(name, &value).map_err(js_error)?;
    }
    if let Some(image) = &report.image {
        let file_name = image
            .dyn_ref::<File>()
            .map(File::name)
            .unwrap_or_else(|| IMAGE_FILE_NAME.to_string());
        form.append_with_blob_and_filename("image", image, &file_name)
            .map_err(js_error)?;
    }
    if let Some(audio) = &report.audio {
        form.append_with_blob_and_filename("audio", audio, AUDIO_FILE_NAME)
            .map_err(js_error)?;
    }
    Ok(form)
}

impl DashboardApi for HttpApi {
    type Attachment = Blob;

    async fn fetch_incidents(&self, path: &str) -> Result<Value, ApiError> {
        self.get(path).await
    }

    async fn fetch_resources(&self) -> Result<Value, ApiError> {
        self.get(RESOURCES_PATH).await
    }

    async fn fetch_shelters(&self) -> Result<Value, ApiError> {
        self.get(SHELTERS_PATH).await
    }

    async fn create_incident(&self, report: IncidentReport<Blob>) -> Result<Value, ApiError> {
        let form = multipart(report)?;
        let resp = Request::post(&self.url(INCIDENTS_PATH))
            .body(form)
            .map_err(|e| ApiError::Transport(e.to_string()))?
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        read_json(resp).await
    }

    async fn create_shelter(&self, shelter: &NewShelter) -> Result<Value, ApiError> {
        let resp = Request::post(&self.url(SHELTERS_PATH))
            .json(shelter)
            .map_err(|e| ApiError::Transport(e.to_string()))?
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        read_json(resp).await
    }

    async fn verify_incident(&self, id: &EntityId) -> Result<Value, ApiError> {
        let resp = Request::post(&self.url(&verify_path(id)))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        read_json(resp).await
    }
}
