use super::protocol::Protocol;
use super::types::*;
use crate::handlers::tool_handlers::ToolHandlers;
use crate::parser::Grammar;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader, Stdin, Stdout};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "enclosing-context-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_MAX_SOURCE_BYTES: usize = 4 * 1024 * 1024;

/// Main MCP Server
pub struct McpServer<R, W> {
    protocol: Protocol<R, W>,
    tool_handlers: ToolHandlers,
}

impl McpServer<BufReader<Stdin>, Stdout> {
    /// Build a stdio server configured from the environment
    pub fn new() -> Result<Self> {
        let (default_grammar, max_source_bytes) = config_from(
            std::env::var("DEFAULT_LANGUAGE").ok(),
            std::env::var("MAX_SOURCE_BYTES").ok(),
        )?;

        tracing::debug!(
            "Configured default language {} with {} byte source limit",
            default_grammar.name(),
            max_source_bytes
        );

        Ok(Self::with_protocol(
            Protocol::stdio(),
            ToolHandlers::new(default_grammar, max_source_bytes),
        ))
    }
}

/// Resolve `DEFAULT_LANGUAGE` and `MAX_SOURCE_BYTES`, applying defaults when unset
fn config_from(language: Option<String>, max_bytes: Option<String>) -> Result<(Grammar, usize)> {
    let language = language.unwrap_or_else(|| "python".to_string());
    let grammar = Grammar::from_name(&language)
        .with_context(|| format!("Unsupported DEFAULT_LANGUAGE: {}", language))?;

    let max_source_bytes = match max_bytes {
        Some(value) => value
            .trim()
            .parse::<usize>()
            .with_context(|| format!("Invalid MAX_SOURCE_BYTES: {}", value))?,
        None => DEFAULT_MAX_SOURCE_BYTES,
    };

    Ok((grammar, max_source_bytes))
}

impl<R, W> McpServer<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn with_protocol(protocol: Protocol<R, W>, tool_handlers: ToolHandlers) -> Self {
        Self {
            protocol,
            tool_handlers,
        }
    }

    pub async fn start(mut self) -> Result<()> {
        tracing::info!("MCP server started, waiting for requests...");

        loop {
            match self.protocol.read_request().await {
                Ok(Some(request)) => {
                    let Some(response) = self.handle_request(request).await else {
                        continue;
                    };
                    if let Err(e) = self.protocol.send_response(response).await {
                        tracing::error!("Failed to send response: {}", e);
                    }
                }
                Ok(None) => {
                    tracing::info!("Client disconnected");
                    break;
                }
                Err(e) => {
                    tracing::error!("Failed to read request: {}", e);
                    let error_response = self
                        .protocol
                        .error_response(json!(null), JsonRpcError::parse_error());
                    let _ = self.protocol.send_response(error_response).await;
                }
            }
        }

        Ok(())
    }

    /// Dispatch a request; notifications yield no response
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        tracing::debug!("Received request: method={}, id={:?}", request.method, request.id);

        let Some(id) = request.id else {
            tracing::debug!("Notification {} acknowledged", request.method);
            return None;
        };

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id, request.params),
            "ping" => self.protocol.success_response(id, json!({})),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            method => self
                .protocol
                .error_response(id, JsonRpcError::method_not_found(method)),
        };
        Some(response)
    }

    fn handle_initialize(&self, id: Value, params: Value) -> JsonRpcResponse {
        match serde_json::from_value::<InitializeRequest>(params) {
            Ok(req) => {
                tracing::info!(
                    "Client connected: {} v{} (protocol {})",
                    req.clientInfo.name,
                    req.clientInfo.version,
                    req.protocolVersion
                );
            }
            Err(e) => {
                tracing::warn!("Failed to parse initialize request: {}", e);
                return self.protocol.error_response(
                    id,
                    JsonRpcError::internal_error(format!("Invalid initialize params: {}", e)),
                );
            }
        }

        let response = InitializeResponse {
            protocolVersion: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    listChanged: Some(false),
                },
            },
            serverInfo: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
        };

        self.protocol.success_response(id, json!(response))
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        let source_properties = json!({
            "path": {
                "type": "string",
                "description": "Path of the source file to read. Its extension selects the language unless 'language' is given."
            },
            "content": {
                "type": "string",
                "description": "Inline source text. Takes precedence over 'path'."
            },
            "language": {
                "type": "string",
                "description": "Language name, e.g. 'python', 'rust', 'typescript'. See list_languages."
            }
        });

        let mut range_properties = source_properties.clone();
        if let Some(props) = range_properties.as_object_mut() {
            props.insert(
                "line_start".to_string(),
                json!({
                    "type": "integer",
                    "description": "First line of the range (1-based, inclusive)",
                    "minimum": 1
                }),
            );
            props.insert(
                "line_end".to_string(),
                json!({
                    "type": "integer",
                    "description": "Last line of the range (1-based, inclusive)",
                    "minimum": 1
                }),
            );
        }

        let tools = vec![
            Tool {
                name: "find_enclosing_context".to_string(),
                description: r#"Find the function or class definition that encloses a line range.

Both ends of the range must lie inside the definition. When nested definitions qualify, the one spanning the most lines is returned. Returns {"enclosingContext": null} when the range is outside every multi-line definition or spans several of them. Single-line definitions are never returned."#.to_string(),
                inputSchema: json!({
                    "type": "object",
                    "properties": range_properties,
                    "required": ["line_start", "line_end"]
                }),
            },
            Tool {
                name: "dry_run".to_string(),
                description: "Check whether a source file parses without syntax errors.".to_string(),
                inputSchema: json!({
                    "type": "object",
                    "properties": source_properties,
                }),
            },
            Tool {
                name: "list_languages".to_string(),
                description: "List supported languages, their file extensions and recognized definition kinds.".to_string(),
                inputSchema: json!({
                    "type": "object",
                    "properties": {}
                }),
            },
        ];

        let response = ListToolsResponse { tools };
        self.protocol.success_response(id, json!(response))
    }

    async fn handle_tools_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let call_request: CallToolRequest = match serde_json::from_value(params) {
            Ok(req) => req,
            Err(e) => {
                return self.protocol.error_response(
                    id,
                    JsonRpcError::internal_error(format!("Invalid params: {}", e)),
                );
            }
        };

        let handlers = &self.tool_handlers;
        let result = match call_request.name.as_str() {
            "find_enclosing_context" => {
                handlers
                    .handle_find_enclosing_context(&call_request.arguments)
                    .await
            }
            "dry_run" => handlers.handle_dry_run(&call_request.arguments).await,
            "list_languages" => handlers.handle_list_languages(&call_request.arguments).await,
            _ => {
                return self.protocol.error_response(
                    id,
                    JsonRpcError::internal_error(format!("Unknown tool: {}", call_request.name)),
                );
            }
        };

        let response = match result {
            Ok(content) => CallToolResponse {
                content,
                isError: None,
            },
            Err(e) => {
                tracing::warn!("Tool {} failed: {:#}", call_request.name, e);
                CallToolResponse {
                    content: vec![Content::Text {
                        text: format!("Error: {:#}", e),
                    }],
                    isError: Some(true),
                }
            }
        };
        self.protocol.success_response(id, json!(response))
    }
}
