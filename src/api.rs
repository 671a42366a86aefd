//! Blocking client for an OpenAI-compatible HTTP surface: chat completions
//! for online classification and the files/batches endpoints for sharded
//! submission.

use anyhow::{Context, Result};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;

use crate::batch::{BatchFacility, FileHandle, JobHandle};
use crate::classifier::{ChatMessage, CompletionOptions, InferenceBackend};
use crate::config::ApiConfig;
use crate::error::{ClassifyError, SubmissionError};

pub struct ApiClient {
    http: Client,
    config: ApiConfig,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BatchObject {
    id: String,
    status: String,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    output_file_id: Option<String>,
    #[serde(default)]
    error_file_id: Option<String>,
}

impl From<BatchObject> for JobHandle {
    fn from(batch: BatchObject) -> Self {
        Self {
            id: batch.id,
            status: batch.status,
            created_at: batch.created_at,
            output_file_id: batch.output_file_id,
            error_file_id: batch.error_file_id,
        }
    }
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn send_batch_request(&self, request: RequestBuilder) -> Result<Response, SubmissionError> {
        let response = self
            .authorize(request)
            .send()
            .map_err(|err| SubmissionError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SubmissionError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

impl InferenceBackend for ApiClient {
    fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, ClassifyError> {
        let mut body = json!({
            "model": model,
            "messages": messages,
            "temperature": options.temperature,
            "top_p": 1.0,
            "max_completion_tokens": options.max_completion_tokens,
            "stream": false,
        });
        if options.json_object {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .authorize(self.http.post(self.url("chat/completions")))
            .json(&body)
            .send()
            .map_err(|err| ClassifyError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ClassifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|err| ClassifyError::Parse(err.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or(ClassifyError::EmptyChoices)
    }
}

impl BatchFacility for ApiClient {
    fn upload_batch_file(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<FileHandle, SubmissionError> {
        let part = Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str("application/jsonl")
            .map_err(|err| SubmissionError::Transport(err.to_string()))?;
        let form = Form::new().text("purpose", "batch").part("file", part);

        let response = self.send_batch_request(self.http.post(self.url("files")).multipart(form))?;
        let file: FileObject = response
            .json()
            .map_err(|err| SubmissionError::Decode(err.to_string()))?;
        Ok(FileHandle { id: file.id })
    }

    fn create_batch_job(
        &self,
        input_file_id: &str,
        endpoint: &str,
        completion_window: &str,
    ) -> Result<JobHandle, SubmissionError> {
        let body = json!({
            "input_file_id": input_file_id,
            "endpoint": endpoint,
            "completion_window": completion_window,
        });
        let response = self.send_batch_request(self.http.post(self.url("batches")).json(&body))?;
        let batch: BatchObject = response
            .json()
            .map_err(|err| SubmissionError::Decode(err.to_string()))?;
        Ok(batch.into())
    }

    fn retrieve_batch_job(&self, job_id: &str) -> Result<JobHandle, SubmissionError> {
        let response =
            self.send_batch_request(self.http.get(self.url(&format!("batches/{job_id}"))))?;
        let batch: BatchObject = response
            .json()
            .map_err(|err| SubmissionError::Decode(err.to_string()))?;
        Ok(batch.into())
    }

    fn download_file_content(&self, file_id: &str) -> Result<String, SubmissionError> {
        let response = self
            .send_batch_request(self.http.get(self.url(&format!("files/{file_id}/content"))))?;
        response
            .text()
            .map_err(|err| SubmissionError::Decode(err.to_string()))
    }
}

