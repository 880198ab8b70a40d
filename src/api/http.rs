//! HTTP implementation of [`SpamGenieApi`]
//!
//! Talks to the SpamGenie REST backend with `reqwest`. Authentication material
//! (API token and/or session cookie) is injected as default headers when the
//! client is built; issuing it is the backend's business.

use reqwest::{header, multipart, Client as HttpClient, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{GenerationRequest, PromptRequest, SpamGenieApi, TemplateFilter};
use crate::models::{
    AssembledPrompt, CandidateFile, EmailSample, GenerationResult, GenerationStatus, HeaderSet,
    NewTemplate, Permission, PromptTemplate, RecordId, Role, TemplateUpdate, User, UserRef,
    Workspace, WorkspaceShare,
};
use crate::settings::Settings;
use crate::{Result, SpamGenieError};

/// Connection settings for [`HttpBackend`]
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: Url,
    pub api_token: Option<String>,
    pub session_cookie: Option<String>,
    pub timeout_ms: u64,
    pub user_agent: String,
    pub headers: HashMap<String, String>,
}

impl HttpConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            api_token: None,
            session_cookie: None,
            timeout_ms: 30000,
            user_agent: format!("spam-genie-rust/{}", env!("CARGO_PKG_VERSION")),
            headers: HashMap::new(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut config = Self::new(&settings.base_url)?;
        config.api_token = settings.api_token.clone();
        config.session_cookie = settings.session_cookie.clone();
        config.timeout_ms = settings.timeout_ms;
        Ok(config)
    }
}

/// REST client for the SpamGenie backend
#[derive(Debug, Clone)]
pub struct HttpBackend {
    config: HttpConfig,
    http_client: HttpClient,
    api_root: String,
}

impl HttpBackend {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();

        headers.insert(
            header::USER_AGENT,
            config
                .user_agent
                .parse()
                .map_err(|e| SpamGenieError::Configuration(format!("Invalid user agent: {}", e)))?,
        );
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        if let Some(token) = &config.api_token {
            headers.insert(
                header::AUTHORIZATION,
                format!("Token {}", token)
                    .parse()
                    .map_err(|e| SpamGenieError::Configuration(format!("Invalid API token: {}", e)))?,
            );
        }

        if let Some(session) = &config.session_cookie {
            headers.insert(
                header::COOKIE,
                format!("sessionid={}", session).parse().map_err(|e| {
                    SpamGenieError::Configuration(format!("Invalid session cookie: {}", e))
                })?,
            );
        }

        for (key, value) in &config.headers {
            let name = header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                SpamGenieError::Configuration(format!("Invalid header name '{}': {}", key, e))
            })?;
            let value = value.parse().map_err(|e| {
                SpamGenieError::Configuration(format!("Invalid header value for '{}': {}", key, e))
            })?;
            headers.insert(name, value);
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|e| {
                SpamGenieError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        let api_root = format!("{}/api", config.base_url.as_str().trim_end_matches('/'));
        debug!("SpamGenie API root: {}", api_root);

        Ok(Self {
            config,
            http_client,
            api_root,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(HttpConfig::from_settings(settings)?)
    }

    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_root, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("{} {}", method, url);
        self.http_client.request(method, url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = Self::check(request.send().await?).await?;
        response
            .json()
            .await
            .map_err(|e| SpamGenieError::Parse(format!("Failed to parse response: {}", e)))
    }

    async fn send_no_content(&self, request: RequestBuilder) -> Result<()> {
        Self::check(request.send().await?).await?;
        Ok(())
    }

    /// Turn non-success statuses into errors, preferring the backend's
    /// `{"error": "..."}` message when there is one
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        #[derive(Deserialize)]
        struct ErrorBody {
            error: Option<String>,
            detail: Option<String>,
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.error.or(body.detail))
            .unwrap_or(text);

        Err(match status.as_u16() {
            403 => SpamGenieError::Forbidden(message),
            404 => SpamGenieError::NotFound(message),
            code => SpamGenieError::Server {
                status: code,
                message,
            },
        })
    }
}

#[async_trait::async_trait]
impl SpamGenieApi for HttpBackend {
    async fn current_user(&self) -> Result<User> {
        #[derive(Deserialize)]
        struct CurrentUser {
            #[serde(default = "default_true")]
            authenticated: bool,
            #[serde(flatten)]
            user: Option<User>,
        }

        fn default_true() -> bool {
            true
        }

        let response: CurrentUser = self.send(self.request(Method::GET, "auth/user/")).await?;
        match response.user {
            Some(user) if response.authenticated => Ok(user),
            _ => Err(SpamGenieError::Forbidden("Not authenticated".to_string())),
        }
    }

    async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        self.send(self.request(Method::GET, "workspaces/").query(&[("all", "true")]))
            .await
    }

    async fn create_workspace(&self, name: &str, description: &str) -> Result<Workspace> {
        #[derive(Serialize)]
        struct Body<'a> {
            name: &'a str,
            description: &'a str,
        }

        self.send(
            self.request(Method::POST, "workspaces/")
                .json(&Body { name, description }),
        )
        .await
    }

    async fn delete_workspace(&self, id: RecordId) -> Result<()> {
        self.send_no_content(self.request(Method::DELETE, &format!("workspaces/{}/", id)))
            .await
    }

    async fn share_workspace(
        &self,
        workspace: RecordId,
        username_or_email: &str,
        permission: Permission,
    ) -> Result<WorkspaceShare> {
        #[derive(Serialize)]
        struct Body<'a> {
            workspace: RecordId,
            username_or_email: &'a str,
            permission: Permission,
        }

        self.send(
            self.request(Method::POST, "workspace-shares/share_workspace/")
                .json(&Body {
                    workspace,
                    username_or_email,
                    permission,
                }),
        )
        .await
    }

    async fn remove_share(&self, workspace: RecordId, user_id: RecordId) -> Result<()> {
        #[derive(Serialize)]
        struct Body {
            workspace: RecordId,
            user_id: RecordId,
        }

        self.send_no_content(
            self.request(Method::DELETE, "workspace-shares/remove_share/")
                .json(&Body { workspace, user_id }),
        )
        .await
    }

    async fn search_users(&self, query: &str) -> Result<Vec<UserRef>> {
        self.send(self.request(Method::GET, "users/search/").query(&[("q", query)]))
            .await
    }

    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>> {
        let request = self.request(Method::GET, "users/");
        let request = match role {
            Some(role) => request.query(&[("role", role.as_str())]),
            None => request,
        };
        self.send(request).await
    }

    async fn update_user_role(&self, id: RecordId, role: Role) -> Result<User> {
        #[derive(Serialize)]
        struct Body {
            role: Role,
        }

        self.send(
            self.request(Method::PATCH, &format!("users/{}/", id))
                .json(&Body { role }),
        )
        .await
    }

    async fn upload_sample(
        &self,
        workspace: RecordId,
        file: &CandidateFile,
    ) -> Result<EmailSample> {
        let part = multipart::Part::bytes(file.content.to_vec())
            .file_name(file.filename.clone())
            .mime_str("message/rfc822")?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("workspace", workspace.to_string());

        self.send(self.request(Method::POST, "email-files/").multipart(form))
            .await
    }

    async fn list_samples(&self, workspace: RecordId) -> Result<Vec<EmailSample>> {
        self.send(
            self.request(Method::GET, "email-files/")
                .query(&[("workspace", workspace)]),
        )
        .await
    }

    async fn delete_sample(&self, id: RecordId) -> Result<()> {
        self.send_no_content(self.request(Method::DELETE, &format!("email-files/{}/", id)))
            .await
    }

    async fn available_headers(&self, workspace: RecordId) -> Result<HeaderSet> {
        self.send(
            self.request(Method::GET, "email-files/available_headers/")
                .query(&[("workspace", workspace)]),
        )
        .await
    }

    async fn list_templates(&self, filter: TemplateFilter) -> Result<Vec<PromptTemplate>> {
        let request = self.request(Method::GET, "prompt-templates/");
        let request = match filter {
            TemplateFilter::All => request,
            TemplateFilter::Base => request.query(&[("is_base", "true")]),
            TemplateFilter::Modules => request.query(&[("is_module", "true")]),
        };
        self.send(request).await
    }

    async fn create_template(&self, template: &NewTemplate) -> Result<PromptTemplate> {
        self.send(
            self.request(Method::POST, "prompt-templates/")
                .json(&template.to_payload()),
        )
        .await
    }

    async fn update_template(
        &self,
        id: RecordId,
        update: &TemplateUpdate,
    ) -> Result<PromptTemplate> {
        self.send(
            self.request(Method::PATCH, &format!("prompt-templates/{}/", id))
                .json(update),
        )
        .await
    }

    async fn delete_template(&self, id: RecordId) -> Result<()> {
        self.send_no_content(self.request(Method::DELETE, &format!("prompt-templates/{}/", id)))
            .await
    }

    async fn generate_default_prompt(&self, request: &PromptRequest) -> Result<AssembledPrompt> {
        self.send(
            self.request(Method::POST, "rule-generations/generate_default_prompt/")
                .json(request),
        )
        .await
    }

    async fn create_generation(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        self.send(self.request(Method::POST, "rule-generations/").json(request))
            .await
    }

    async fn regenerate_with_feedback(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult> {
        if request.feedback.is_none() {
            return Err(SpamGenieError::Validation(
                "Regeneration requires feedback".to_string(),
            ));
        }
        self.send(
            self.request(Method::POST, "rule-generations/regenerate_with_feedback/")
                .json(request),
        )
        .await
    }

    async fn generation_status(&self, id: RecordId) -> Result<GenerationStatus> {
        self.send(self.request(Method::GET, &format!("rule-generations/{}/status/", id)))
            .await
    }

    async fn list_generations(&self, workspace: RecordId) -> Result<Vec<GenerationResult>> {
        let mut results: Vec<GenerationResult> = self
            .send(
                self.request(Method::GET, "rule-generations/")
                    .query(&[("workspace", workspace)]),
            )
            .await?;
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(results)
    }
}
