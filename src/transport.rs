//! The HTTP capability the dispatcher drives.
//!
//! A [`Transport`] opens attempt-local resources and sends one request over
//! them. The dispatcher never looks inside a session, so any client that can
//! report a status code or a classified error fits.

use std::error::Error as StdError;
use std::future::Future;
use std::io;

use reqwest::redirect::Policy;
use reqwest::{Client, Proxy};
use tracing::debug;

use crate::outcome::FailureKind;
use crate::spec::RequestSpec;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// What came back for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    /// Negotiated protocol, e.g. `HTTP/2.0`, when the transport knows it.
    pub version: Option<String>,
}

/// A classified failure of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: FailureKind,
    pub reason: String,
}

impl TransportError {
    /// Builds an error of class `kind`.
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

pub trait Transport: Send + Sync + 'static {
    type Session: Send + 'static;

    /// Prepares the resources for one attempt. Nothing is shared between the
    /// sessions of a run.
    fn open(&self, spec: &RequestSpec) -> Result<Self::Session, TransportError>;

    /// Issues the request described by `spec` and resolves to its reply.
    fn send(
        &self,
        session: &Self::Session,
        spec: &RequestSpec,
    ) -> impl Future<Output = Result<Reply, TransportError>> + Send;
}

/// reqwest-backed transport. Every session is its own `Client`, so each
/// attempt gets a fresh connection pool and TLS session.
///
/// HTTPS targets negotiate HTTP/2 through ALPN and fall back to HTTP/1.1.
/// Cleartext targets speak HTTP/1.1 unless [`ReqwestTransport::http2_prior_knowledge`]
/// is set.
///
/// Proxy environment variables are ignored; traffic only goes through a proxy
/// set with [`ReqwestTransport::proxy`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    insecure: bool,
    proxy: Option<String>,
    http2_prior_knowledge: bool,
}

impl ReqwestTransport {
    /// Creates a transport that verifies certificates and uses no proxy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept invalid TLS certificates, as lab targets usually need.
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Route every attempt through `proxy`, e.g. an intercepting proxy.
    pub fn proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Speak HTTP/2 from the first byte, without negotiation. Needed for h2
    /// over cleartext; servers without h2 support will fail the attempt.
    pub fn http2_prior_knowledge(mut self, enabled: bool) -> Self {
        self.http2_prior_knowledge = enabled;
        self
    }
}

impl Transport for ReqwestTransport {
    type Session = Client;

    fn open(&self, spec: &RequestSpec) -> Result<Client, TransportError> {
        let invalid = |e: reqwest::Error| TransportError::new(FailureKind::InvalidRequest, error_chain(&e));

        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(self.insecure)
            .redirect(Policy::none())
            .timeout(spec.timeout())
            .no_proxy();
        if self.http2_prior_knowledge {
            builder = builder.http2_prior_knowledge();
        }
        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(Proxy::all(proxy.as_str()).map_err(invalid)?);
        }
        builder.build().map_err(invalid)
    }

    async fn send(&self, client: &Client, spec: &RequestSpec) -> Result<Reply, TransportError> {
        let response = client
            .request(spec.method().clone(), spec.url().clone())
            .headers(spec.headers().clone())
            .send()
            .await
            .map_err(classify)?;

        debug!(
            "{} {} answered {:?} {}",
            spec.method(),
            spec.url(),
            response.version(),
            response.status()
        );
        Ok(Reply {
            status: response.status().as_u16(),
            version: Some(format!("{:?}", response.version())),
        })
    }
}

/// Maps a reqwest error onto a failure class and a readable reason.
pub fn classify(err: reqwest::Error) -> TransportError {
    if has_io_kind(&err, io::ErrorKind::ConnectionRefused) {
        return TransportError::new(FailureKind::Connect, "connection refused");
    }
    if err.is_timeout() {
        return TransportError::new(FailureKind::Timeout, "timeout");
    }

    let kind = if err.is_connect() {
        FailureKind::Connect
    } else if err.is_builder() {
        FailureKind::InvalidRequest
    } else {
        FailureKind::Protocol
    };
    TransportError::new(kind, error_chain(&err))
}

fn has_io_kind(err: &(dyn StdError + 'static), kind: io::ErrorKind) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == kind {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// Joins an error and all of its sources with `: `.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        current = e.source();
    }
    out
}
