//! HTTP transport for the command endpoint.

use async_trait::async_trait;

use super::{CommandRequest, CommandResponse, CommandTransport, TransportError};

/// Posts JSON command bodies with `reqwest`.
#[derive(Clone, Debug, Default)]
pub struct HttpCommandTransport {
    client: reqwest::Client,
}

impl HttpCommandTransport {
    /// Wrap an existing client, for callers that tune pooling or TLS.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self { Self { client } }
}

#[async_trait]
impl CommandTransport for HttpCommandTransport {
    async fn send(&self, request: CommandRequest) -> Result<CommandResponse, TransportError> {
        let CommandRequest {
            endpoint,
            headers,
            body,
            timeout,
        } = request;
        let mut builder = self.client.post(&endpoint).timeout(timeout).json(&body);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        let request_error = |e: reqwest::Error| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Request {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                }
            }
        };
        let response = builder.send().await.map_err(request_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(request_error)?;
        Ok(CommandResponse { status, body })
    }
}
