//! Authenticated calls against the vendor's assignment-submission resource.
//!
//! Every call carries the caller's bearer token and nothing else. A 401 from the vendor is not
//! retried here; it goes back to the caller like any other failure.

use reqwest::{Client as HttpClient, Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::info;
use url::Url;

use crate::config::VendorConfig;
use crate::model::{FeedbackUpdate, ParseError, Submission, SubmissionList, UpdateOutcome};

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("request to the learning platform failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Clone)]
pub struct RemoteClient {
    http: HttpClient,
    submissions_url: Url,
}

impl RemoteClient {
    pub fn new(http: HttpClient, vendor: &VendorConfig) -> Result<Self, url::ParseError> {
        let submissions_url = Url::parse(&vendor.base_url)?.join(&vendor.submissions_path)?;
        Ok(Self {
            http,
            submissions_url,
        })
    }

    fn submission_url(&self, id: &str) -> Url {
        let mut url = self.submissions_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(id);
        }
        url
    }

    fn request(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
        info!(%url, %method, "preparing vendor request");
        self.http.request(method, url).bearer_auth(token)
    }

    /// Sends the request and returns the body of a 2xx response as text.
    async fn send(&self, request: RequestBuilder) -> Result<String, RemoteError> {
        let response = request.send().await?;
        let response = error_for_status(response).await?;
        Ok(response.text().await?)
    }

    async fn send_for_json(&self, request: RequestBuilder) -> Result<Value, RemoteError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|e| ParseError::NotJson(e).into())
    }

    /// Lists submissions. `filters` is the caller's raw query string and is forwarded verbatim.
    #[tracing::instrument(skip(self, token))]
    pub async fn list_submissions(
        &self,
        token: &str,
        filters: Option<&str>,
    ) -> Result<SubmissionList, RemoteError> {
        let mut url = self.submissions_url.clone();
        url.set_query(filters.filter(|q| !q.is_empty()));

        let body = self.send_for_json(self.request(Method::GET, url, token)).await?;
        Ok(SubmissionList::from_remote(body)?)
    }

    #[tracing::instrument(skip(self, token))]
    pub async fn get_submission(&self, token: &str, id: &str) -> Result<Submission, RemoteError> {
        let url = self.submission_url(id);
        let body = self.send_for_json(self.request(Method::GET, url, token)).await?;
        Ok(Submission::from_remote(body)?)
    }

    #[tracing::instrument(skip(self, token, update))]
    pub async fn update_submission(
        &self,
        token: &str,
        id: &str,
        update: &FeedbackUpdate,
    ) -> Result<UpdateOutcome, RemoteError> {
        let url = self.submission_url(id);
        let request = self.request(Method::PUT, url, token).json(update);
        // A 2xx means the vendor applied the update, whatever the body looks like.
        let body = self.send(request).await?;
        Ok(UpdateOutcome::from_remote(&body))
    }
}

/// Turns a non-2xx response into [`RemoteError::Status`], keeping whatever message the vendor
/// put in the body.
async fn error_for_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = vendor_message(&text)
        .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));

    Err(RemoteError::Status {
        status: status.as_u16(),
        message,
    })
}

fn vendor_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .or_else(|| {
            value
                .get("errors")?
                .as_array()?
                .first()?
                .get("message")?
                .as_str()
        })
        .map(str::to_owned)
}
