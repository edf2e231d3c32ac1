//! REST access to the chat backend. Every response passes through
//! [`ApiClient::dispatch`], which owns the unauthorized-response rule.

use std::{path::Path, sync::Arc};

use reqwest::{multipart, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{GroupId, GroupSummary, RoomId, UserId, UserSummary},
    error::{ApiError, ApiException},
    protocol::{
        AuthResponse, CreateGroupRequest, CreateGroupResponse, HistoryRecord, LoginRequest,
        RegisterRequest, UploadResponse,
    },
};
use tracing::{debug, warn};

use crate::{config::ClientSettings, error::ApiClientError, session::SessionHandle};

type ApiResult<T> = std::result::Result<T, ApiClientError>;

pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<SessionHandle>,
}

impl ApiClient {
    pub fn new(settings: &ClientSettings, session: Arc<SessionHandle>) -> ApiResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.http_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: settings.server_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionHandle> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{path}", self.base_url)
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn dispatch(&self, request: RequestBuilder, authenticated: bool) -> ApiResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "api: response");

        if status == StatusCode::UNAUTHORIZED && authenticated {
            self.session.invalidate().await;
            return Err(ApiClientError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.json::<ApiError>().await.ok();
            let exception = ApiException::from_response(
                status.as_u16(),
                body,
                status.canonical_reason().unwrap_or("request failed"),
            );
            warn!(
                status = status.as_u16(),
                "api: request rejected: {}", exception.message
            );
            return Err(ApiClientError::Status {
                status: status.as_u16(),
                code: exception.code,
                message: exception.message,
            });
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let request = self.authorized(self.http.get(self.url(path))).await;
        Ok(self.dispatch(request, true).await?.json().await?)
    }

    pub async fn login(&self, request: &LoginRequest) -> ApiResult<AuthResponse> {
        let response = self
            .dispatch(self.http.post(self.url("/auth/login")).json(request), false)
            .await?;
        Ok(response.json().await?)
    }

    pub async fn register(&self, request: &RegisterRequest) -> ApiResult<AuthResponse> {
        let response = self
            .dispatch(
                self.http.post(self.url("/auth/register")).json(request),
                false,
            )
            .await?;
        Ok(response.json().await?)
    }

    /// Users the given account can talk to.
    pub async fn list_users(&self, user_id: UserId) -> ApiResult<Vec<UserSummary>> {
        self.get_json(&format!("/auth/users/{}", user_id.0)).await
    }

    pub async fn list_groups(&self, user_id: UserId) -> ApiResult<Vec<GroupSummary>> {
        self.get_json(&format!("/chat/groups/{}", user_id.0)).await
    }

    pub async fn direct_history(&self, room_id: &RoomId) -> ApiResult<Vec<HistoryRecord>> {
        self.get_json(&format!("/auth/messages/{}", room_id.as_str()))
            .await
    }

    pub async fn group_history(&self, group_id: GroupId) -> ApiResult<Vec<HistoryRecord>> {
        self.get_json(&format!("/chat/group/messages/{}", group_id.0))
            .await
    }

    pub async fn create_group(&self, request: &CreateGroupRequest) -> ApiResult<CreateGroupResponse> {
        let http_request = self
            .authorized(self.http.post(self.url("/chat/create-group")).json(request))
            .await;
        let bytes = self.dispatch(http_request, true).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes).unwrap_or(CreateGroupResponse { message: None }))
    }

    pub async fn upload_file(&self, path: &Path) -> ApiResult<UploadResponse> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ApiClientError::Validation(format!("not a file path: {}", path.display()))
            })?;
        let mime_type = mime_guess::from_path(path).first_or_octet_stream();
        self.upload_bytes(filename, bytes, mime_type.essence_str())
            .await
    }

    pub async fn upload_bytes(
        &self,
        filename: String,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> ApiResult<UploadResponse> {
        let part = multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str(mime_type)?;
        let form = multipart::Form::new().part("file", part);
        let request = self
            .authorized(self.http.post(self.url("/auth/upload")).multipart(form))
            .await;
        Ok(self.dispatch(request, true).await?.json().await?)
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
