use thiserror::Error;

/// Top-level error for anything a tool call or CLI command can fail with.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    InvalidInput(#[from] InvalidInputError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Langbase error: {0}")]
    Langbase(#[from] LangbaseError),

    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),
}

/// Caller supplied empty or missing required input.
///
/// This is the only error a mind map build surfaces to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid input: {field} - {reason}")]
pub struct InvalidInputError {
    pub field: String,
    pub reason: String,
}

impl InvalidInputError {
    /// Create a new invalid input error for a field
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Reasons a generation response is discarded in favor of the fallback graph.
///
/// Never crosses the build boundary; it is logged and absorbed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UntrustedOutput {
    #[error("backend call failed: {message}")]
    BackendFailed { message: String },

    #[error("backend call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("backend returned an empty response")]
    EmptyResponse,

    #[error("no JSON object found in response")]
    NoJsonObject,

    #[error("malformed JSON: {message}")]
    Malformed { message: String },

    #[error("response has no nodes")]
    MissingNodes,

    #[error("response has no root node")]
    MissingRoot,
}

/// Violations of the mind map structural invariants
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("graph has no nodes")]
    Empty,

    #[error("graph has {count} nodes, limit is {limit}")]
    TooManyNodes { count: usize, limit: usize },

    #[error("duplicate node id: {id}")]
    DuplicateId { id: String },

    #[error("graph has no root node")]
    NoRoot,

    #[error("graph has {count} root nodes")]
    MultipleRoots { count: usize },

    #[error("root node {id} has a parent")]
    RootHasParent { id: String },

    #[error("node {id} has no parent")]
    MissingParent { id: String },

    #[error("node {id} references unknown parent {parent}")]
    DanglingParent { id: String, parent: String },

    #[error("node {id} is part of a cycle")]
    Cycle { id: String },

    #[error("connection {from} -> {to} does not match a parent link")]
    UnmatchedConnection { from: String, to: String },

    #[error("parent link {from} -> {to} has no connection")]
    MissingConnection { from: String, to: String },

    #[error("{node_type} node {id} cannot hang under {parent_type} node {parent}")]
    TierMismatch {
        id: String,
        node_type: String,
        parent: String,
        parent_type: String,
    },
}

/// SQLite failures, plus lookups that matched no row.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Mind map not found: {mind_map_id}")]
    MindMapNotFound { mind_map_id: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Failures talking to the Langbase Pipes API.
///
/// The graph builder never surfaces these; it logs them and serves the fallback map.
#[derive(Debug, Error)]
pub enum LangbaseError {
    #[error("Langbase unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors returned to the client as `isError` tool results.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParameters { tool_name: String, message: String },

    #[error("Tool execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AppError> for McpError {
    fn from(err: AppError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

pub type StorageResult<T> = Result<T, StorageError>;

pub type LangbaseResult<T> = Result<T, LangbaseError>;

pub type McpResult<T> = Result<T, McpError>;
