//! Portal HTTP Client - Authenticated JSON Calls Against MeroShare
//!
//! Wraps reqwest with the portal's required browser-shaped base headers
//! and maps every endpoint of the `PortalApi` port. The base header set
//! is immutable for the life of the client; the `Authorization` token is
//! passed explicitly per call and never mutated in place.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, ORIGIN, REFERER};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::types::{
    auth_payload, application_search_payload, holdings_payload, issue_search_payload,
    BankBranchEntry, HoldingsPage, ObjectPage,
};
use crate::domain::issue::{
    ApplicableIssue, ApplicationForm, ApplicationReport, ApplicationSummary,
    BankDetail, BankRef, ShareHolding,
};
use crate::ports::portal::{AuthGrant, CapitalEntry, PortalApi, PortalError, SubmissionReceipt};

/// Configuration for the portal HTTP client.
#[derive(Debug, Clone)]
pub struct PortalClientConfig {
    /// Base URL for the portal backend API.
    pub base_url: String,
    /// Web-frontend origin the backend expects in Origin/Referer.
    pub origin: String,
    /// User-Agent presented to the portal.
    pub user_agent: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl PortalClientConfig {
    pub fn from_config(api: &crate::config::ApiConfig) -> Self {
        Self {
            base_url: api.base_url.clone(),
            origin: api.origin.clone(),
            timeout: Duration::from_secs(api.timeout_seconds),
            ..Self::default()
        }
    }
}

impl Default for PortalClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://webbackend.cdsc.com.np/api".to_string(),
            origin: "https://meroshare.cdsc.com.np".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36"
                .to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP implementation of the `PortalApi` port.
pub struct PortalClient {
    http: Client,
    config: PortalClientConfig,
}

impl PortalClient {
    /// Build a client with the portal's base header set installed once.
    pub fn new(config: PortalClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(
            ORIGIN,
            HeaderValue::from_str(&config.origin).context("Invalid origin header")?,
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(&format!("{}/", config.origin))
                .context("Invalid referer header")?,
        );

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authorized(&self, req: RequestBuilder, token: &str) -> RequestBuilder {
        req.header(AUTHORIZATION, token)
    }

    /// Send a request and parse a 2xx JSON body, mapping everything else
    /// into the closed `PortalError` set.
    async fn read_json(&self, req: RequestBuilder) -> Result<Value, PortalError> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = portal_message(resp)
                .await
                .unwrap_or_else(|| status.to_string());
            return Err(PortalError::Status {
                status: status.as_u16(),
                message,
            });
        }
        resp.json::<Value>()
            .await
            .map_err(|e| PortalError::Decode(e.to_string()))
    }

    fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, PortalError> {
        serde_json::from_value(value).map_err(|e| PortalError::Decode(e.to_string()))
    }
}

/// Best-effort extraction of the portal's own `message` field.
async fn portal_message(resp: Response) -> Option<String> {
    let body = resp.text().await.ok()?;
    let value: Value = serde_json::from_str(&body).ok()?;
    value.get("message")?.as_str().map(str::to_string)
}

#[async_trait]
impl PortalApi for PortalClient {
    #[instrument(skip(self, password))]
    async fn authenticate(
        &self,
        capital_id: u32,
        username: &str,
        password: &str,
    ) -> Result<AuthGrant, PortalError> {
        let resp = self
            .http
            .post(self.url("/meroShare/auth/"))
            .json(&auth_payload(capital_id, username, password))
            .send()
            .await?;

        let status = resp.status();
        let token = resp
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if status.is_success() {
            let token = token.ok_or_else(|| {
                PortalError::Decode("authorization header missing on 200".to_string())
            })?;
            debug!("authentication accepted");
            Ok(AuthGrant { token, message })
        } else {
            warn!(status = status.as_u16(), "authentication refused");
            Err(PortalError::Status {
                status: status.as_u16(),
                message: if message.is_empty() {
                    status.to_string()
                } else {
                    message
                },
            })
        }
    }

    async fn capital_list(&self) -> Result<Vec<CapitalEntry>, PortalError> {
        let value = self
            .read_json(self.http.get(self.url("/meroShare/capital/")))
            .await?;
        Self::decode(value)
    }

    #[instrument(skip(self, token))]
    async fn applicable_issues(
        &self,
        token: &str,
        page_size: u32,
    ) -> Result<Vec<ApplicableIssue>, PortalError> {
        let req = self
            .http
            .post(self.url("/meroShare/companyShare/applicableIssue/"))
            .json(&issue_search_payload(page_size));
        let value = self.read_json(self.authorized(req, token)).await?;
        let page: ObjectPage<ApplicableIssue> = Self::decode(value)?;
        Ok(page.object)
    }

    async fn bank_list(&self, token: &str) -> Result<Vec<BankRef>, PortalError> {
        let req = self.http.get(self.url("/meroShare/bank/"));
        let value = self.read_json(self.authorized(req, token)).await?;
        Self::decode(value)
    }

    async fn bank_detail(&self, token: &str, bank_id: u64) -> Result<BankDetail, PortalError> {
        let req = self.http.get(self.url(&format!("/meroShare/bank/{bank_id}")));
        let value = self.read_json(self.authorized(req, token)).await?;
        let entries: Vec<BankBranchEntry> = Self::decode(value)?;
        let entry = entries
            .into_iter()
            .next()
            .ok_or_else(|| PortalError::Decode("empty bank detail".to_string()))?;
        Ok(BankDetail {
            bank_id,
            branch_id: entry.account_branch_id,
            account_number: entry.account_number,
            account_type_id: entry.account_type_id,
            customer_id: entry.id,
        })
    }

    #[instrument(skip(self, token, form), fields(scrip_share_id = form.company_share_id, kitta = form.applied_kitta))]
    async fn submit_application(
        &self,
        token: &str,
        form: &ApplicationForm,
    ) -> Result<SubmissionReceipt, PortalError> {
        let req = self
            .http
            .post(self.url("/meroShare/applicantForm/share/apply"))
            .json(form);
        let resp = self.authorized(req, token).send().await?;

        let status = resp.status().as_u16();
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(SubmissionReceipt {
            accepted: status == 201,
            status,
            message,
        })
    }

    async fn application_search(
        &self,
        token: &str,
        page_size: u32,
    ) -> Result<Vec<ApplicationSummary>, PortalError> {
        let req = self
            .http
            .post(self.url("/meroShare/applicantForm/active/search/"))
            .json(&application_search_payload(page_size));
        let value = self.read_json(self.authorized(req, token)).await?;
        let page: ObjectPage<ApplicationSummary> = Self::decode(value)?;
        Ok(page.object)
    }

    async fn application_detail(
        &self,
        token: &str,
        form_id: u64,
    ) -> Result<ApplicationReport, PortalError> {
        let req = self.http.get(
            self.url(&format!("/meroShare/applicantForm/report/detail/{form_id}")),
        );
        let value = self.read_json(self.authorized(req, token)).await?;
        Self::decode(value)
    }

    async fn holdings(
        &self,
        token: &str,
        demat: &str,
        client_code: &str,
        page_size: u32,
    ) -> Result<Vec<ShareHolding>, PortalError> {
        let req = self
            .http
            .post(self.url("/meroShareView/myShare/"))
            .json(&holdings_payload(demat, client_code, page_size));
        let value = self.read_json(self.authorized(req, token)).await?;
        let page: HoldingsPage<ShareHolding> = Self::decode(value)?;
        Ok(page.holdings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_points_at_portal() {
        let config = PortalClientConfig::default();
        assert!(config.base_url.starts_with("https://"));
        assert!(config.origin.starts_with("https://"));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_client_builds_with_defaults() {
        assert!(PortalClient::new(PortalClientConfig::default()).is_ok());
    }

    #[test]
    fn test_url_join() {
        let client = PortalClient::new(PortalClientConfig::default()).unwrap();
        assert_eq!(
            client.url("/meroShare/bank/"),
            "https://webbackend.cdsc.com.np/api/meroShare/bank/"
        );
    }
}
