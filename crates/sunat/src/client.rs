//! HTTP client for SUNAT's receipt ingestion API.
//!
//! [`ReceiptClient::connect`] exchanges SOL credentials for a bearer token
//! and returns a client that attaches it to every request. The two wire
//! operations map one-to-one onto the REST surface: [`ReceiptClient::submit`]
//! posts a packaged receipt, [`ReceiptClient::fetch_status`] reads the state
//! of a ticket.

use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::auth::{self, Credentials};
use crate::error::Error;
use crate::package::PackagedReceipt;
use crate::ticket::TicketStatus;

/// Default host of the token endpoint.
pub const DEFAULT_AUTH_BASE_URL: &str = "https://api-seguridad.sunat.gob.pe";
/// Default host of the ingestion API, also the default OAuth2 scope.
pub const DEFAULT_API_BASE_URL: &str = "https://api-cpe.sunat.gob.pe";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Base URLs for the two SUNAT services involved in a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub auth_base_url: String,
    pub api_base_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_base_url: DEFAULT_AUTH_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// OAuth2 scope sent with the token request.
    ///
    /// SUNAT scopes tokens by the API host they grant access to, so the
    /// scope follows `api_base_url` wherever it points.
    pub fn scope(&self) -> &str {
        &self.api_base_url
    }
}

/// An authenticated session against the ingestion API.
#[derive(Debug, Clone)]
pub struct ReceiptClient {
    http: Client,
    api_base_url: String,
}

impl ReceiptClient {
    /// Authenticates against the token endpoint and returns a client whose
    /// requests carry the bearer token.
    ///
    /// Every failure here is an [`Error::Authentication`]: nothing has been
    /// submitted yet when this returns an error.
    pub fn connect(endpoints: &Endpoints, credentials: &Credentials) -> Result<Self, Error> {
        let bootstrap = http_client(None).map_err(|e| Error::Authentication {
            message: e.to_string(),
        })?;
        let token = auth::request_token(
            &bootstrap,
            &endpoints.auth_base_url,
            endpoints.scope(),
            credentials,
        )?;
        let http = http_client(Some(bearer_headers(&token)?)).map_err(|e| Error::Authentication {
            message: e.to_string(),
        })?;

        Ok(Self {
            http,
            api_base_url: endpoints.api_base_url.clone(),
        })
    }

    /// Submits a packaged receipt and returns the tracking ticket.
    pub fn submit(&self, receipt: &PackagedReceipt) -> Result<String, Error> {
        let url = format!(
            "{}/v1/contribuyente/gem/comprobantes/{}",
            self.api_base_url.trim_end_matches('/'),
            receipt.logical_name
        );

        let payload = SubmitRequest {
            archivo: Archivo {
                nom_archivo: &receipt.zip_file_name,
                arc_gre_zip: &receipt.base64,
                hash_zip: &receipt.sha256_hex,
            },
        };

        let resp = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .map_err(|e| Error::Submission {
                name: receipt.logical_name.clone(),
                message: e.without_url().to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(Error::Submission {
                name: receipt.logical_name.clone(),
                message: format!("ingestion endpoint answered {status}: {}", body.trim()),
            });
        }

        let parsed: SubmitResponse = resp.json().map_err(|e| Error::Submission {
            name: receipt.logical_name.clone(),
            message: format!("could not decode submission response: {e}"),
        })?;

        match parsed.num_ticket {
            Some(ticket) if !ticket.is_empty() => Ok(ticket),
            _ => Err(Error::Submission {
                name: receipt.logical_name.clone(),
                message: "response carried no ticket number".to_string(),
            }),
        }
    }

    /// Fetches the processing status of a submission ticket.
    ///
    /// The body is decoded after the fact so an undecodable payload can be
    /// preserved verbatim in [`Error::StatusParse`].
    pub fn fetch_status(&self, ticket: &str) -> Result<TicketStatus, Error> {
        let url = format!(
            "{}/v1/contribuyente/gem/comprobantes/envios/{}",
            self.api_base_url.trim_end_matches('/'),
            ticket
        );

        let resp = self.http.get(&url).send().map_err(|e| Error::StatusFetch {
            ticket: ticket.to_string(),
            message: e.without_url().to_string(),
        })?;

        let status = resp.status();
        let body = resp.text().map_err(|e| Error::StatusFetch {
            ticket: ticket.to_string(),
            message: e.without_url().to_string(),
        })?;

        if !status.is_success() {
            return Err(Error::StatusFetch {
                ticket: ticket.to_string(),
                message: format!("status endpoint answered {status}: {}", body.trim()),
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::StatusParse {
            ticket: ticket.to_string(),
            message: e.to_string(),
            body: body.trim().to_string(),
        })
    }
}

fn http_client(default_headers: Option<HeaderMap>) -> anyhow::Result<Client> {
    let mut builder = Client::builder()
        .user_agent(format!("sunat/{}", env!("CARGO_PKG_VERSION")))
        .timeout(HTTP_TIMEOUT);
    if let Some(headers) = default_headers {
        builder = builder.default_headers(headers);
    }
    builder.build().context("failed to build HTTP client")
}

fn bearer_headers(token: &str) -> Result<HeaderMap, Error> {
    let mut value =
        HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| Error::Authentication {
            message: "token contains characters not valid in an Authorization header".to_string(),
        })?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    archivo: Archivo<'a>,
}

#[derive(Serialize)]
struct Archivo<'a> {
    #[serde(rename = "nomArchivo")]
    nom_archivo: &'a str,
    #[serde(rename = "arcGreZip")]
    arc_gre_zip: &'a str,
    #[serde(rename = "hashZip")]
    hash_zip: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(rename = "numTicket")]
    num_ticket: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread;

    use super::*;

    type Seen = Arc<Mutex<Vec<(String, Option<String>, String)>>>;

    fn spawn_api_server(responses: Vec<(u16, String)>) -> (String, Seen, thread::JoinHandle<()>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind test server");
        let base = format!("http://{}", server.server_addr());
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in = Arc::clone(&seen);
        let handle = thread::spawn(move || {
            for (code, body) in responses {
                let mut req = match server.recv() {
                    Ok(r) => r,
                    Err(_) => break,
                };
                let bearer = req
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Authorization"))
                    .map(|h| h.value.as_str().to_string());
                let mut payload = String::new();
                let _ = req.as_reader().read_to_string(&mut payload);
                seen_in.lock().expect("seen lock").push((
                    format!("{} {}", req.method(), req.url()),
                    bearer,
                    payload,
                ));
                let response = tiny_http::Response::from_string(body)
                    .with_status_code(tiny_http::StatusCode(code));
                let _ = req.respond(response);
            }
        });
        (base, seen, handle)
    }

    fn mock_endpoints(base: &str) -> Endpoints {
        Endpoints {
            auth_base_url: base.to_string(),
            api_base_url: base.to_string(),
        }
    }

    fn sol_credentials() -> Credentials {
        Credentials {
            client_id: "client-id-001".to_string(),
            client_secret: "s3cret".to_string(),
            username: "MODDATOS".to_string(),
            password: "moddatos".to_string(),
        }
    }

    fn packaged_receipt() -> PackagedReceipt {
        PackagedReceipt {
            logical_name: "factura_001".to_string(),
            zip_file_name: "factura_001.zip".to_string(),
            archive: vec![0x50, 0x4b],
            sha256_hex: "ab".repeat(32),
            base64: "UEs=".to_string(),
        }
    }

    const TOKEN_OK: &str = r#"{"access_token":"tok-123"}"#;

    #[test]
    fn scope_follows_the_api_host() {
        assert_eq!(Endpoints::default().scope(), DEFAULT_API_BASE_URL);

        let custom = Endpoints {
            auth_base_url: DEFAULT_AUTH_BASE_URL.to_string(),
            api_base_url: "https://api-beta.example".to_string(),
        };
        assert_eq!(custom.scope(), "https://api-beta.example");
    }

    #[test]
    fn submit_posts_the_archive_envelope_with_the_bearer_token() {
        let (base, seen, handle) = spawn_api_server(vec![
            (200, TOKEN_OK.to_string()),
            (200, r#"{"numTicket":"T-100"}"#.to_string()),
        ]);

        let client =
            ReceiptClient::connect(&mock_endpoints(&base), &sol_credentials()).expect("connect");
        let ticket = client.submit(&packaged_receipt()).expect("submit");
        assert_eq!(ticket, "T-100");

        handle.join().expect("server thread");
        let seen = seen.lock().expect("seen lock");
        let (line, bearer, payload) = &seen[1];
        assert_eq!(line, "POST /v1/contribuyente/gem/comprobantes/factura_001");
        assert_eq!(bearer.as_deref(), Some("Bearer tok-123"));

        let body: serde_json::Value = serde_json::from_str(payload).expect("submit payload");
        assert_eq!(body["archivo"]["nomArchivo"], "factura_001.zip");
        assert_eq!(body["archivo"]["arcGreZip"], "UEs=");
        assert_eq!(body["archivo"]["hashZip"], "ab".repeat(32));
    }

    #[test]
    fn missing_ticket_number_is_a_submission_error() {
        let (base, _seen, handle) =
            spawn_api_server(vec![(200, TOKEN_OK.to_string()), (200, "{}".to_string())]);

        let client =
            ReceiptClient::connect(&mock_endpoints(&base), &sol_credentials()).expect("connect");
        let err = client.submit(&packaged_receipt()).expect_err("must fail");

        handle.join().expect("server thread");
        assert!(matches!(err, Error::Submission { .. }));
        assert!(err.to_string().contains("no ticket number"));
    }

    #[test]
    fn rejected_submission_reports_status_and_body() {
        let (base, _seen, handle) = spawn_api_server(vec![
            (200, TOKEN_OK.to_string()),
            (500, "gateway exploded".to_string()),
        ]);

        let client =
            ReceiptClient::connect(&mock_endpoints(&base), &sol_credentials()).expect("connect");
        let err = client.submit(&packaged_receipt()).expect_err("must fail");

        handle.join().expect("server thread");
        let rendered = err.to_string();
        assert!(rendered.contains("500"));
        assert!(rendered.contains("gateway exploded"));
    }

    #[test]
    fn fetch_status_decodes_the_ticket_envelope() {
        let (base, seen, handle) = spawn_api_server(vec![
            (200, TOKEN_OK.to_string()),
            (
                200,
                r#"{"codRespuesta":"0","indCdrGenerado":true,"arcCdr":"UEs="}"#.to_string(),
            ),
        ]);

        let client =
            ReceiptClient::connect(&mock_endpoints(&base), &sol_credentials()).expect("connect");
        let status = client.fetch_status("T-100").expect("status");

        handle.join().expect("server thread");
        assert!(status.is_success());
        assert_eq!(status.certificate.as_deref(), Some("UEs="));
        assert_eq!(status.cdr_generated, Some(true));

        let seen = seen.lock().expect("seen lock");
        let (line, bearer, _) = &seen[1];
        assert_eq!(line, "GET /v1/contribuyente/gem/comprobantes/envios/T-100");
        assert!(bearer.is_some());
    }

    #[test]
    fn undecodable_status_body_is_preserved_in_the_error() {
        let (base, _seen, handle) = spawn_api_server(vec![
            (200, TOKEN_OK.to_string()),
            (200, "<html>maintenance</html>".to_string()),
        ]);

        let client =
            ReceiptClient::connect(&mock_endpoints(&base), &sol_credentials()).expect("connect");
        let err = client.fetch_status("T-100").expect_err("must fail");

        handle.join().expect("server thread");
        match err {
            Error::StatusParse { ticket, body, .. } => {
                assert_eq!(ticket, "T-100");
                assert!(body.contains("maintenance"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failed_status_fetch_reports_the_http_status() {
        let (base, _seen, handle) = spawn_api_server(vec![
            (200, TOKEN_OK.to_string()),
            (503, "unavailable".to_string()),
        ]);

        let client =
            ReceiptClient::connect(&mock_endpoints(&base), &sol_credentials()).expect("connect");
        let err = client.fetch_status("T-100").expect_err("must fail");

        handle.join().expect("server thread");
        assert!(matches!(err, Error::StatusFetch { .. }));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn rejected_token_stops_the_session_before_any_submission() {
        let (base, seen, handle) = spawn_api_server(vec![(401, "{}".to_string())]);

        let err = ReceiptClient::connect(&mock_endpoints(&base), &sol_credentials())
            .expect_err("must fail");

        handle.join().expect("server thread");
        assert!(matches!(err, Error::Authentication { .. }));
        assert!(err.before_submission());

        let seen = seen.lock().expect("seen lock");
        assert_eq!(seen.len(), 1);
        assert!(seen[0].0.ends_with("/oauth2/token/"));
    }
}
