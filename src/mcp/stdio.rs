//! Stdio transport
//!
//! Newline-delimited JSON-RPC 2.0. Each request runs on its own task and
//! all responses go through a single writer task so lines never interleave.

use crate::mcp::protocol::*;
use crate::mcp::server::OdooMcpServer;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

/// Largest accepted request line
const MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// Serve requests from `reader` until EOF, writing responses to `writer`
pub async fn run_stdio_loop<R, W>(
    server: Arc<OdooMcpServer>,
    reader: R,
    writer: W,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

    let writer_task = tokio::spawn(async move {
        let mut sink = FramedWrite::new(writer, LinesCodec::new());
        while let Some(response) = rx.recv().await {
            let json = match serde_json::to_string(&response) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to serialize response: {}", e);
                    continue;
                }
            };
            tracing::debug!("Sending: {}", json);
            if let Err(e) = sink.send(json).await {
                tracing::error!("Failed to write response: {}", e);
                break;
            }
        }
    });

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                let _ = tx.send(JsonRpcResponse::error(None, PARSE_ERROR, "Request too large"));
                continue;
            }
            Err(LinesCodecError::Io(e)) => {
                tracing::error!("Failed to read request: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        tracing::debug!("Received: {}", line);

        let request = match parse_request(&line) {
            Ok(req) => req,
            Err(response) => {
                let _ = tx.send(response);
                continue;
            }
        };

        let server = Arc::clone(&server);
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(response) = handle_request(&server, request).await {
                let _ = tx.send(response);
            }
        });
    }

    // The writer finishes once every in-flight request has dropped its sender
    drop(tx);
    writer_task
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    tracing::info!("Input closed, shutting down");
    Ok(())
}

/// Decode one line. Malformed JSON is a parse error; well-formed JSON that
/// is not a request is an invalid request, answered with its id if it has one.
pub fn parse_request(line: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| JsonRpcResponse::error(None, PARSE_ERROR, &format!("Parse error: {}", e)))?;

    let id = value.get("id").cloned();
    serde_json::from_value(value).map_err(|e| {
        JsonRpcResponse::error(id, INVALID_REQUEST, &format!("Invalid request: {}", e))
    })
}

/// Dispatch one request. Returns `None` for notifications.
pub async fn handle_request(
    server: &OdooMcpServer,
    request: JsonRpcRequest,
) -> Option<JsonRpcResponse> {
    let notification = request.is_notification();
    let id = request.id.clone();

    let response = match request.method.as_str() {
        "initialize" => {
            let result = InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: ServerCapabilities {
                    tools: Some(ToolsCapability {
                        list_changed: Some(false),
                    }),
                },
                server_info: ServerInfo {
                    name: env!("CARGO_PKG_NAME").to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
            };
            JsonRpcResponse::from_result(id, &result)
        }

        "initialized" | "notifications/initialized" => JsonRpcResponse::success(id, json!({})),

        "ping" => JsonRpcResponse::success(id, json!({})),

        "tools/list" => {
            let result = ListToolsResult {
                tools: server.get_tools(),
            };
            JsonRpcResponse::from_result(id, &result)
        }

        "tools/call" => {
            let params: CallToolParams = match request.params {
                Some(p) => match serde_json::from_value(p) {
                    Ok(params) => params,
                    Err(e) => {
                        return reply(
                            notification,
                            JsonRpcResponse::error(id, INVALID_PARAMS, &format!("Invalid params: {}", e)),
                        );
                    }
                },
                None => {
                    return reply(
                        notification,
                        JsonRpcResponse::error(id, INVALID_PARAMS, "Missing params"),
                    );
                }
            };

            let args = params.arguments.unwrap_or_default();
            let result = server.call_tool(&params.name, &args).await;
            JsonRpcResponse::from_result(id, &result)
        }

        _ => JsonRpcResponse::error(
            id,
            METHOD_NOT_FOUND,
            &format!("Method not found: {}", request.method),
        ),
    };

    reply(notification, response)
}

fn reply(notification: bool, response: JsonRpcResponse) -> Option<JsonRpcResponse> {
    if notification {
        None
    } else {
        Some(response)
    }
}
