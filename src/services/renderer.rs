use std::time::Duration;

use anyhow::bail;
use serde::Serialize;
use serde_json::Value;

/// Client for the external PDF rendering collaborator. Rendering is fully
/// delegated; this service only ships the receipt data and gets back the
/// URL of the stored document.
#[derive(Clone)]
pub struct RendererClient {
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest<'a> {
    pub receipt_id: &'a str,
    pub receipt_number: &'a str,
    pub issuer_name: &'a str,
    pub issuer_document: &'a str,
    pub client_name: &'a str,
    pub client_document: &'a str,
    pub service_name: &'a str,
    pub service_description: &'a str,
    pub amount: &'a str,
    pub date: &'a str,
    pub document_hash: &'a str,
}

impl RendererClient {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            url,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    /// Renders and stores the PDF, returning its URL. The timeout bounds
    /// the whole call; hitting it fails the render, never the process.
    pub async fn render(&self, request: &RenderRequest<'_>) -> Result<String, anyhow::Error> {
        let response = self
            .client
            .post(format!("{}/render", self.url))
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let response_json: Value = serde_json::from_str(&response)?;
        match response_json.get("pdfUrl").and_then(Value::as_str) {
            Some(pdf_url) => Ok(pdf_url.to_string()),
            None => bail!("Renderer: bad response format."),
        }
    }
}
