use crate::types::constants::channels;
use crate::types::{Result, SessionError};
use url::Url;

/// Where a push channel lives and whether it needs the access token
pub trait ChannelEndpoint: Send + Sync {
    /// Identity of the channel (task id, or "dashboard")
    fn key(&self) -> &str;

    fn requires_token(&self) -> bool;

    fn url(&self, token: Option<&str>) -> Result<String>;
}

/// `<ws-base>/ws/task/<task_id>?token=<access token>`
#[derive(Debug, Clone)]
pub struct TaskEndpoint {
    ws_base: String,
    task_id: String,
}

impl TaskEndpoint {
    pub fn new(ws_base: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            ws_base: ws_base.into(),
            task_id: task_id.into(),
        }
    }
}

impl ChannelEndpoint for TaskEndpoint {
    fn key(&self) -> &str {
        &self.task_id
    }

    fn requires_token(&self) -> bool {
        true
    }

    fn url(&self, token: Option<&str>) -> Result<String> {
        let token = token.ok_or(SessionError::MissingCredential)?;
        let mut url = channel_url(&self.ws_base, &["ws", "task", &self.task_id])?;
        url.query_pairs_mut()
            .append_pair(channels::TOKEN_PARAM, token);
        Ok(url.into())
    }
}

/// `<ws-base>/ws/dashboard`, optionally carrying the token
#[derive(Debug, Clone)]
pub struct DashboardEndpoint {
    ws_base: String,
    attach_token: bool,
}

impl DashboardEndpoint {
    pub const KEY: &'static str = "dashboard";

    pub fn new(ws_base: impl Into<String>) -> Self {
        Self {
            ws_base: ws_base.into(),
            attach_token: false,
        }
    }

    pub fn with_token(mut self, attach: bool) -> Self {
        self.attach_token = attach;
        self
    }
}

impl ChannelEndpoint for DashboardEndpoint {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn requires_token(&self) -> bool {
        false
    }

    fn url(&self, token: Option<&str>) -> Result<String> {
        let mut url = channel_url(&self.ws_base, &["ws", "dashboard"])?;
        if self.attach_token
            && let Some(token) = token
        {
            url.query_pairs_mut()
                .append_pair(channels::TOKEN_PARAM, token);
        }
        Ok(url.into())
    }
}

fn channel_url(ws_base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(ws_base)?;
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|_| SessionError::Config(format!("'{}' cannot be a base URL", ws_base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
