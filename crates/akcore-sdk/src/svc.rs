//! Host services that are plain one-shot requests: template rendering and
//! cached static downloads.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::bus::Bus;
use crate::error::{BusError, BusResult};
use crate::rpc::Call;
use crate::transport::Transport;

/// Message types served by the host's service layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ServiceMessageType {
    TemplateRenderReq = 100,
    TemplateRenderResp = 101,
    WebclientStaticDownloadReq = 102,
    WebclientStaticDownloadResp = 103,
}

impl From<ServiceMessageType> for i32 {
    fn from(t: ServiceMessageType) -> Self {
        t as i32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct TemplateRenderRequest {
    pub template: String,
    /// JSON document the template is rendered against.
    pub json: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct TemplateRenderResponse {
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct WebclientStaticDownloadRequest {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct WebclientStaticDownloadResponse {
    /// Path of the cached file, relative to the root of the host web service.
    pub path: String,
}

impl Call for TemplateRenderRequest {
    const MESSAGE_TYPE: i32 = ServiceMessageType::TemplateRenderReq as i32;
    type Response = TemplateRenderResponse;
}

impl Call for WebclientStaticDownloadRequest {
    const MESSAGE_TYPE: i32 = ServiceMessageType::WebclientStaticDownloadReq as i32;
    type Response = WebclientStaticDownloadResponse;
}

impl<T: Transport> Bus<T> {
    /// Render `template` against the JSON document `json` on the host.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Host`] if rendering fails, or encoding and
    /// transport errors.
    pub fn render_template(&self, template: &str, json: &[u8]) -> BusResult<String> {
        let req = TemplateRenderRequest {
            template: template.to_owned(),
            json: json.to_vec(),
        };
        self.call(&req, |reply| {
            reply.map(|resp| resp.output).map_err(BusError::Host)
        })
    }

    /// Download `url` with a GET into the host's cache, unless it is already
    /// cached, and return the path it is served from.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Host`] if the download fails, or encoding and
    /// transport errors.
    pub fn webclient_static_download(&self, url: &str, timeout_ms: u64) -> BusResult<String> {
        let req = WebclientStaticDownloadRequest {
            url: url.to_owned(),
        };
        self.call_with_timeout(&req, timeout_ms, |reply| {
            reply.map(|resp| resp.path).map_err(BusError::Host)
        })
    }

    /// [`Bus::webclient_static_download`] with the configured download
    /// timeout.
    ///
    /// # Errors
    ///
    /// See [`Bus::webclient_static_download`].
    pub fn webclient_static_download_default(&self, url: &str) -> BusResult<String> {
        self.webclient_static_download(url, self.config().download_timeout_ms)
    }
}
