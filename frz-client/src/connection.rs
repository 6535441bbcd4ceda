//! One TCP session to one broker.

use std::time::Duration;

use frz_protocol::{
    decode_response, frame_request, Decoder, MetadataRequest, MetadataResponse, ProduceRequest,
    ProduceResponse, RequestBody, ResponseBody, WireError,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use crate::error::{ClientError, Result};

/// A connected broker session.
///
/// Requests carry a monotonically increasing correlation id; the broker
/// echoes it on each response so replies can be matched to requests. A
/// mismatch means the session can no longer be trusted: the connection
/// poisons itself and the pool replaces it on next use.
pub struct BrokerConnection {
    host: String,
    port: u16,
    client_id: String,
    socket_timeout: Duration,
    stream: TcpStream,
    correlation_id: i32,
    poisoned: bool,
}

impl BrokerConnection {
    pub async fn open(
        host: &str,
        port: u16,
        client_id: &str,
        connect_timeout: Duration,
        socket_timeout: Duration,
    ) -> Result<Self> {
        debug!(host, port, "connecting to broker");

        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(ClientError::ConnectionFailed)?;
        stream.set_nodelay(true)?;

        Ok(Self {
            host: host.to_string(),
            port,
            client_id: client_id.to_string(),
            socket_timeout,
            stream,
            correlation_id: 0,
            poisoned: false,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// True once the session has seen an I/O failure or a frame it cannot
    /// trust. A poisoned connection is never reused.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn next_correlation_id(&mut self) -> i32 {
        self.correlation_id = self.correlation_id.wrapping_add(1);
        self.correlation_id
    }

    /// Writes a framed request and decodes the framed response through the
    /// decoder registered for the request's api key.
    pub async fn send(&mut self, request: &RequestBody) -> Result<ResponseBody> {
        let correlation_id = self.next_correlation_id();
        self.write_request(request, correlation_id).await?;

        let frame = self.read_frame().await?;
        let mut d = Decoder::new(&frame);
        let actual = d.read_i32().map_err(|e| self.poison(ClientError::Wire(e)))?;
        if actual != correlation_id {
            warn!(
                expected = correlation_id,
                actual, "correlation id mismatch, closing session"
            );
            return Err(self.poison(ClientError::CorrelationMismatch {
                expected: correlation_id,
                actual,
            }));
        }

        decode_response(request.api_key(), d.read_rest())
            .map_err(|e| self.poison(ClientError::Wire(e)))
    }

    /// Writes a framed request without awaiting a response body. Used for
    /// produce requests with `required_acks == 0`, where the broker stays
    /// silent.
    pub async fn send_no_response(&mut self, request: &RequestBody) -> Result<()> {
        let correlation_id = self.next_correlation_id();
        self.write_request(request, correlation_id).await
    }

    pub async fn produce(&mut self, request: ProduceRequest) -> Result<ProduceResponse> {
        match self.send(&RequestBody::Produce(request)).await? {
            ResponseBody::Produce(response) => Ok(response),
            other => Err(self.poison(ClientError::Wire(WireError::Corrupt(format!(
                "unexpected response body {other:?} for produce request"
            ))))),
        }
    }

    pub async fn produce_no_ack(&mut self, request: ProduceRequest) -> Result<()> {
        self.send_no_response(&RequestBody::Produce(request)).await
    }

    pub async fn topic_metadata(&mut self, topics: &[String]) -> Result<MetadataResponse> {
        let request = MetadataRequest {
            topics: topics.to_vec(),
        };
        match self.send(&RequestBody::Metadata(request)).await? {
            ResponseBody::Metadata(response) => Ok(response),
            other => Err(self.poison(ClientError::Wire(WireError::Corrupt(format!(
                "unexpected response body {other:?} for metadata request"
            ))))),
        }
    }

    async fn write_request(&mut self, request: &RequestBody, correlation_id: i32) -> Result<()> {
        let framed = frame_request(
            request.api_key(),
            request.api_version(),
            correlation_id,
            Some(&self.client_id),
            &request.encode(),
        );
        trace!(
            api_key = request.api_key(),
            correlation_id,
            len = framed.len(),
            "sending request"
        );

        match tokio::time::timeout(self.socket_timeout, self.stream.write_all(&framed)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(self.poison(map_io(e))),
            Err(_) => Err(self.poison(ClientError::Timeout)),
        }
    }

    async fn read_frame(&mut self) -> Result<Vec<u8>> {
        let mut size_buf = [0u8; 4];
        self.read_exact(&mut size_buf).await?;
        let size = i32::from_be_bytes(size_buf);
        if size < 4 {
            return Err(self.poison(ClientError::Wire(WireError::Corrupt(format!(
                "invalid response size {size}"
            )))));
        }

        let mut frame = vec![0u8; size as usize];
        self.read_exact(&mut frame).await?;
        trace!(len = frame.len(), "received response frame");
        Ok(frame)
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        match tokio::time::timeout(self.socket_timeout, self.stream.read_exact(buf)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(self.poison(map_io(e))),
            Err(_) => Err(self.poison(ClientError::Timeout)),
        }
    }

    fn poison(&mut self, err: ClientError) -> ClientError {
        self.poisoned = true;
        err
    }
}

impl std::fmt::Debug for BrokerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("correlation_id", &self.correlation_id)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

fn map_io(err: std::io::Error) -> ClientError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        ClientError::ConnectionClosed
    } else {
        ClientError::Io(err)
    }
}
