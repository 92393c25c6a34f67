use thiserror::Error;

/// Failure to decode a single manifest file. Always absorbed by the scanner.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid YAML at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: '{field}' must be {expected}, found {found}")]
    Shape {
        field: String,
        expected: &'static str,
        found: &'static str,
        line: usize,
    },

    #[error("line {line}: alias expansion exceeds {limit} nodes")]
    AliasExpansion { line: usize, limit: usize },

    #[error("line {line}: unsupported value '{value}' for '{field}'")]
    Value {
        field: String,
        value: String,
        line: usize,
    },
}

impl DecodeError {
    pub fn shape(field: &str, expected: &'static str, node: &crate::parser::node::Node) -> Self {
        DecodeError::Shape {
            field: field.to_string(),
            expected,
            found: node.shape(),
            line: node.line,
        }
    }
}

/// Failure while scanning one package. Fatal to that package only.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to walk repository tree at '{path}': {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dependency inference failed: {0}")]
    Engine(#[from] EngineError),

    #[error("scan task failed: {0}")]
    Join(String),
}

/// Failure reported by the policy engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown query '{0}'")]
    UnknownQuery(String),

    #[error("invalid input for query '{query}': {message}")]
    Input { query: String, message: String },

    #[error("invalid result for query '{query}': {source}")]
    Output {
        query: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ReputationError {
    #[error("reputation request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("reputation service returned HTTP {0}")]
    Status(u16),
}

/// Failure while producing findings for the inventory.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("reputation lookup failed: {0}")]
    Reputation(#[from] ReputationError),

    #[error("findings evaluation failed: {0}")]
    Engine(#[from] EngineError),
}

#[derive(Debug, Error)]
pub enum ScmError {
    #[error("API request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("repository '{0}' not found")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("operation not supported by the {provider} provider: {operation}")]
    Unsupported {
        provider: &'static str,
        operation: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("git {0} cancelled")]
    Cancelled(String),

    #[error("unexpected git output for {command}: {output}")]
    Output { command: String, output: String },
}

/// Failure of a whole analysis run.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("repository listing failed: {0}")]
    Listing(#[source] ScmError),

    #[error("repository lookup failed: {0}")]
    Lookup(#[source] ScmError),

    #[error("admission failed: analysis was cancelled")]
    Admission,

    #[error("clone failed: {0}")]
    Clone(#[from] GitError),

    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("invalid repository identity: {0}")]
    Identity(#[from] crate::purl::PurlError),

    #[error("failed to create temporary directory: {0}")]
    TempDir(#[source] std::io::Error),
}
