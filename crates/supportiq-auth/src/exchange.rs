//! Token endpoint calls: authorization code exchange and refresh.
//!
//! Neither call retries. Authorization codes are single-use, so a second
//! attempt with the same code can only fail at the provider.

use serde::Serialize;

use crate::config::OAuthConfig;
use crate::error::{AuthError, Result};
use crate::token_store::TokenSet;

#[derive(Serialize)]
struct CodeExchangeForm<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
    code_verifier: &'a str,
}

#[derive(Serialize)]
struct RefreshForm<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    refresh_token: &'a str,
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code(
    http: &reqwest::Client,
    config: &OAuthConfig,
    code: &str,
    verifier: &str,
) -> Result<TokenSet> {
    let form = CodeExchangeForm {
        grant_type: "authorization_code",
        client_id: &config.client_id,
        code,
        redirect_uri: &config.redirect_uri,
        code_verifier: verifier,
    };

    tracing::debug!(token_url = %config.token_url, "Exchanging authorization code");
    let response = http
        .post(&config.token_url)
        .form(&form)
        .send()
        .await
        .map_err(|e| AuthError::Network(format!("Token exchange request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        tracing::warn!(status = status.as_u16(), "Token exchange rejected");
        return Err(AuthError::TokenExchangeFailed {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<TokenSet>()
        .await
        .map_err(|e| AuthError::Serialization(format!("Failed to parse token response: {}", e)))
}

/// Obtain fresh tokens with a refresh token.
pub async fn refresh_tokens(
    http: &reqwest::Client,
    config: &OAuthConfig,
    refresh_token: &str,
) -> Result<TokenSet> {
    let form = RefreshForm {
        grant_type: "refresh_token",
        client_id: &config.client_id,
        refresh_token,
    };

    tracing::debug!(token_url = %config.token_url, "Refreshing tokens");
    let response = http
        .post(&config.token_url)
        .form(&form)
        .send()
        .await
        .map_err(|e| AuthError::Network(format!("Token refresh request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        tracing::warn!(status = status.as_u16(), "Token refresh rejected");
        return Err(AuthError::RefreshFailed {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<TokenSet>()
        .await
        .map_err(|e| AuthError::Serialization(format!("Failed to parse refresh response: {}", e)))
}

/// Token endpoint client bound to one provider config.
#[derive(Debug, Clone)]
pub struct TokenRefresher {
    http: reqwest::Client,
    config: OAuthConfig,
}

impl TokenRefresher {
    pub fn new(http: reqwest::Client, config: OAuthConfig) -> Self {
        Self { http, config }
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        refresh_tokens(&self.http, &self.config, refresh_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> OAuthConfig {
        OAuthConfig::for_provider(
            &server.uri(),
            "client-123",
            "http://127.0.0.1:5173/oauth/callback",
            ["openid"],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_exchange_sends_form_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("client_id=client-123"))
            .and(body_string_contains("code=C1"))
            .and(body_string_contains(
                "redirect_uri=http%3A%2F%2F127.0.0.1%3A5173%2Foauth%2Fcallback",
            ))
            .and(body_string_contains("code_verifier=V1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id_token": "ID1",
                "access_token": "AT1",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = exchange_code(&reqwest::Client::new(), &config_for(&server), "C1", "V1")
            .await
            .unwrap();
        assert_eq!(tokens.access_token.as_deref(), Some("AT1"));
        assert_eq!(tokens.refresh_token, None);
    }

    #[tokio::test]
    async fn test_exchange_failure_captures_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let err = exchange_code(&reqwest::Client::new(), &config_for(&server), "C1", "V1")
            .await
            .unwrap_err();
        match err {
            AuthError::TokenExchangeFailed { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_sends_refresh_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=RT1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "AT2"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let refresher = TokenRefresher::new(reqwest::Client::new(), config_for(&server));
        let tokens = refresher.refresh("RT1").await.unwrap();
        assert_eq!(tokens.access_token.as_deref(), Some("AT2"));
    }

    #[tokio::test]
    async fn test_refresh_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("revoked"))
            .mount(&server)
            .await;

        let refresher = TokenRefresher::new(reqwest::Client::new(), config_for(&server));
        assert!(matches!(
            refresher.refresh("RT1").await,
            Err(AuthError::RefreshFailed { status: 401, .. })
        ));
    }
}
