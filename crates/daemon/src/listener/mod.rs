// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Accepts connections on the worker's Unix socket and serves one
//! request per connection against the [`JobService`](olake_engine::JobService).

use std::sync::Arc;
use std::time::Duration;

use olake_adapters::JobMappingPolicy;
use olake_engine::ServiceError;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::env::PROTOCOL_VERSION;
use crate::lifecycle::Service;
use crate::protocol::{self, Request, Response};

/// Shared context for all request handlers.
pub struct ListenCtx {
    pub service: Arc<Service>,
    /// Notified when a client asks the worker to stop
    pub shutdown: Arc<Notify>,
    pub ipc_timeout: Duration,
    /// Job→node mapping of the backend, when it schedules by one
    pub mapping: Option<Arc<JobMappingPolicy>>,
}

/// Listener task for accepting socket connections.
pub struct Listener {
    unix: UnixListener,
    ctx: Arc<ListenCtx>,
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),
}

impl Listener {
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { unix, ctx }
    }

    /// Accept connections until `stop` is cancelled, spawning a task for each.
    pub async fn run(self, stop: CancellationToken) {
        loop {
            tokio::select! {
                result = self.unix.accept() => match result {
                    Ok((stream, _)) => {
                        let ctx = Arc::clone(&self.ctx);
                        tokio::spawn(async move {
                            let (reader, writer) = stream.into_split();
                            if let Err(e) = handle_connection(reader, writer, &ctx).await {
                                log_connection_error(e);
                            }
                        });
                    }
                    Err(e) => error!("Unix accept error: {}", e),
                },
                _ = stop.cancelled() => break,
            }
        }
        debug!("listener stopped");
    }
}

fn log_connection_error(e: ConnectionError) {
    match e {
        ConnectionError::Protocol(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected")
        }
        ConnectionError::Protocol(protocol::ProtocolError::Timeout) => {
            warn!("Connection timeout")
        }
        _ => error!("Connection error: {}", e),
    }
}

/// Handle a single client connection.
///
/// Interactive requests (discover, check, spec) are raced against client
/// disconnect so an abandoned caller does not hold the connection open.
/// Mutations always run to completion.
async fn handle_connection<R, W>(mut reader: R, mut writer: W, ctx: &ListenCtx) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let request = protocol::read_request(&mut reader, ctx.ipc_timeout).await?;

    if matches!(request, Request::Ping | Request::JobTasks { .. }) {
        debug!(request = ?request, "received query");
    } else {
        info!(request = ?request, "received request");
    }

    let response = if is_interactive(&request) {
        tokio::select! {
            response = handle_request(request, ctx) => response,
            _ = detect_client_disconnect(&mut reader) => {
                debug!("Client disconnected, dropping handler");
                return Ok(());
            }
        }
    } else {
        handle_request(request, ctx).await
    };

    debug!("Sending response: {:?}", response);
    protocol::write_response(&mut writer, &response, ctx.ipc_timeout).await?;
    Ok(())
}

fn is_interactive(request: &Request) -> bool {
    matches!(request, Request::Discover { .. } | Request::TestConnection { .. } | Request::FetchSpec { .. })
}

/// Detect client disconnect by reading from the socket after the request.
///
/// The client sends one request then waits, so any read completing means
/// EOF or a protocol violation.
async fn detect_client_disconnect<R: AsyncRead + Unpin>(reader: &mut R) {
    let mut buf = [0u8; 1];
    let _ = reader.read(&mut buf).await;
}

/// Handle a single request and return a response.
async fn handle_request(request: Request, ctx: &ListenCtx) -> Response {
    let service = &ctx.service;
    let result: Result<Response, ServiceError> = match request {
        Request::Ping => Ok(Response::Pong { version: PROTOCOL_VERSION.to_string() }),

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Ok(Response::ShuttingDown)
        }

        Request::CreateJob { job } => {
            service.create_job(job).await.map(|schedule_id| Response::ScheduleCreated { schedule_id })
        }

        Request::UpdateJob { job } => service.update_job(job).await.map(|()| Response::Ok),

        Request::DeleteJob { project_id, job_id } => {
            service.delete_job(&project_id, job_id).await.map(|count| Response::Canceled { count })
        }

        Request::SyncJob { project_id, job_id } => {
            service.sync_job(&project_id, job_id).await.map(|run| Response::Run { run })
        }

        Request::CancelJobRun { project_id, job_id } => {
            service.cancel_job_run(&project_id, job_id).await.map(|count| Response::Canceled { count })
        }

        Request::ActivateJob { project_id, job_id, active } => {
            service.activate_job(&project_id, job_id, active).await.map(|()| Response::Ok)
        }

        Request::ClearDestination { project_id, job_id, streams_config } => service
            .clear_destination(&project_id, job_id, &streams_config)
            .await
            .map(|run| Response::Run { run: Some(run) }),

        Request::StreamDifference { old_streams, new_streams } => service
            .get_stream_difference(&old_streams, &new_streams)
            .map(|streams| Response::StreamDifference { streams }),

        Request::JobTasks { project_id, job_id } => {
            service.get_job_tasks(&project_id, job_id).await.map(|tasks| Response::JobTasks { tasks })
        }

        Request::Discover { project_id, connector, job_id, streams_config } => service
            .discover_streams(&project_id, connector, job_id, streams_config)
            .await
            .map(|result| Response::Output { result }),

        Request::TestConnection { project_id, connector, role } => {
            service.test_connection(&project_id, connector, role).await.map(|result| Response::Output { result })
        }

        Request::FetchSpec { connector_type, version, role } => {
            service.fetch_spec(&connector_type, &version, role).await.map(|result| Response::Output { result })
        }

        Request::ReloadJobMapping { mapping } => return reload_mapping(ctx, &mapping),
    };

    result.unwrap_or_else(|e| {
        warn!(error = %e, "request failed");
        Response::Error { message: e.to_string() }
    })
}

fn reload_mapping(ctx: &ListenCtx, raw: &str) -> Response {
    let Some(policy) = &ctx.mapping else {
        return Response::Error { message: "job mapping requires the kubernetes executor".to_string() };
    };
    match policy.load_json(raw) {
        Ok(report) => {
            info!(valid = report.valid, invalid = report.invalid, used_fallback = report.used_fallback, "job mapping reloaded");
            Response::MappingLoaded {
                valid: report.valid,
                invalid: report.invalid,
                used_fallback: report.used_fallback,
                errors: report.errors.iter().map(ToString::to_string).collect(),
            }
        }
        Err(e) => {
            warn!(error = %e, "job mapping reload rejected");
            Response::Error { message: e.to_string() }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
