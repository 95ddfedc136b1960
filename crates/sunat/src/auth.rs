//! SOL credential handling and token acquisition.
//!
//! SUNAT's OAuth2 endpoint takes the password grant with the client pair and
//! SOL user of the taxpayer. Credential values stay out of `Debug` output and
//! error messages; transport errors are stripped of the request URL because
//! it embeds the client id.

use std::fmt;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::error::Error;

/// The four SOL credential values required by the token endpoint.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

/// Exchanges SOL credentials for a bearer token.
///
/// Posts the password grant as a url-encoded form, fields in the order the
/// endpoint documents them: `scope`, `grant_type`, `client_id`,
/// `client_secret`, `username`, `password`.
pub fn request_token(
    http: &Client,
    auth_base_url: &str,
    scope: &str,
    credentials: &Credentials,
) -> Result<String, Error> {
    let url = format!(
        "{}/v1/clientessol/{}/oauth2/token/",
        auth_base_url.trim_end_matches('/'),
        credentials.client_id
    );

    let form = [
        ("scope", scope),
        ("grant_type", "password"),
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
        ("username", credentials.username.as_str()),
        ("password", credentials.password.as_str()),
    ];

    let resp = http
        .post(&url)
        .form(&form)
        .send()
        .map_err(|e| Error::Authentication {
            message: e.without_url().to_string(),
        })?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().unwrap_or_default();
        return Err(Error::Authentication {
            message: format!("token endpoint answered {status}: {}", body.trim()),
        });
    }

    let token: TokenResponse = resp.json().map_err(|e| Error::Authentication {
        message: format!("could not decode token response: {}", e.without_url()),
    })?;

    if token.access_token.is_empty() {
        return Err(Error::Authentication {
            message: "token endpoint returned an empty access token".to_string(),
        });
    }

    Ok(token.access_token)
}
