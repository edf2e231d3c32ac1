//! Login and signup flow.

use std::sync::Arc;

use shared::protocol::{AuthResponse, LoginRequest, RegisterRequest};
use tracing::{info, warn};

use crate::{
    api::ApiClient,
    error::ApiClientError,
    events::{ClientEvent, Route},
    session::Session,
};

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), ApiClientError> {
        if self.password != self.confirm_password {
            return Err(ApiClientError::Validation(
                "Passwords do not match".to_string(),
            ));
        }
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(ApiClientError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct AuthController {
    api: Arc<ApiClient>,
}

impl AuthController {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiClientError> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let result = self.api.login(&request).await;
        self.finish(result).await
    }

    pub async fn register(&self, form: &SignupForm) -> Result<Session, ApiClientError> {
        if let Err(err) = form.validate() {
            self.notify(err.user_message());
            return Err(err);
        }
        let request = RegisterRequest {
            name: form.name.trim().to_string(),
            email: form.email.trim().to_string(),
            password: form.password.clone(),
        };
        let result = self.api.register(&request).await;
        self.finish(result).await
    }

    async fn finish(
        &self,
        result: Result<AuthResponse, ApiClientError>,
    ) -> Result<Session, ApiClientError> {
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!("auth: request failed: {err}");
                self.notify(err.user_message());
                return Err(err);
            }
        };

        let (Some(user), Some(token)) = (response.user, response.token) else {
            let err = ApiClientError::Validation(
                "server response is missing user or token".to_string(),
            );
            self.notify(err.user_message());
            return Err(err);
        };

        let session = Session { user, token };
        self.api
            .session()
            .establish(session.clone())
            .await
            .map_err(|err| ApiClientError::Storage(format!("{err:#}")))?;
        info!(user_id = session.user_id().0, "auth: signed in");

        self.notify(response.message.unwrap_or_else(|| "Success".to_string()));
        let _ = self
            .api
            .session()
            .events()
            .send(ClientEvent::Navigate(Route::Dashboard));
        Ok(session)
    }

    fn notify(&self, message: String) {
        let _ = self.api.session().events().send(ClientEvent::Notice(message));
    }
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
