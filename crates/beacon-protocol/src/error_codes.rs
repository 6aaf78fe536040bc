//! Well-known analysis error codes emitted by the backend
//!
//! The status core treats every code as opaque; these exist so UI code can
//! match on them and show recovery hints next to an error banner.

pub const ANALYSIS_ERROR: &str = "ANALYSIS_ERROR";
pub const ANALYSIS_TIMEOUT: &str = "ANALYSIS_TIMEOUT";
pub const ANALYSIS_CANCELLED: &str = "ANALYSIS_CANCELLED";
pub const QUEUE_CANCELLED: &str = "QUEUE_CANCELLED";
pub const QUEUE_TIMEOUT: &str = "QUEUE_TIMEOUT";

pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
pub const PYTHON_ERROR: &str = "PYTHON_ERROR";
pub const LLM_ERROR: &str = "LLM_ERROR";

pub const PYTHON_EXECUTION: &str = "PYTHON_EXECUTION";
pub const PYTHON_SYNTAX: &str = "PYTHON_SYNTAX";
pub const PYTHON_IMPORT: &str = "PYTHON_IMPORT";
pub const PYTHON_MEMORY: &str = "PYTHON_MEMORY";

pub const DATA_NOT_FOUND: &str = "DATA_NOT_FOUND";
pub const DATA_INVALID: &str = "DATA_INVALID";
pub const DATA_EMPTY: &str = "DATA_EMPTY";
pub const DATA_TOO_LARGE: &str = "DATA_TOO_LARGE";

pub const CONNECTION_FAILED: &str = "CONNECTION_FAILED";
pub const CONNECTION_TIMEOUT: &str = "CONNECTION_TIMEOUT";
pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
pub const RESOURCE_BUSY: &str = "RESOURCE_BUSY";
pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_NOT_FOUND";

/// Whether `code` reports a job that stopped because the user asked it to.
pub fn is_cancellation(code: &str) -> bool {
    matches!(code, ANALYSIS_CANCELLED | QUEUE_CANCELLED)
}

/// Recovery suggestions to show alongside an error banner for `code`.
pub fn recovery_hints(code: &str) -> &'static [&'static str] {
    match code {
        ANALYSIS_ERROR => &[
            "Check that your question is clear and specific",
            "Try simplifying the query conditions",
            "If the problem persists, reload and try again",
        ],
        ANALYSIS_TIMEOUT | QUEUE_TIMEOUT => &[
            "Simplify the query or narrow the data range",
            "Check that your network connection is stable",
            "Try again later, other analyses may still be running",
        ],
        ANALYSIS_CANCELLED | QUEUE_CANCELLED => &[
            "You can start the analysis again",
            "If this was a mistake, resubmit the same question",
        ],
        NETWORK_ERROR | CONNECTION_FAILED | CONNECTION_TIMEOUT => &[
            "Check your network connection",
            "Make sure the service is running",
            "Try again later",
        ],
        DATABASE_ERROR => &[
            "Check the data source configuration",
            "Verify the table and column names in the query",
        ],
        PYTHON_ERROR | PYTHON_EXECUTION => &[
            "Check that the data format is correct",
            "Try a different kind of analysis",
        ],
        PYTHON_SYNTAX => &[
            "Rephrase the analysis request",
            "Use a simpler question",
        ],
        PYTHON_IMPORT => &[
            "A required analysis library may be missing",
            "Ask an administrator to check the installation",
        ],
        PYTHON_MEMORY | DATA_TOO_LARGE => &[
            "Reduce the amount of data being analysed",
            "Add more filters or process the data in batches",
        ],
        LLM_ERROR => &[
            "Check the model API configuration",
            "Try again later",
        ],
        DATA_NOT_FOUND | RESOURCE_NOT_FOUND => &[
            "Check that the data source is configured",
            "Confirm the data has not been moved or deleted",
        ],
        DATA_INVALID => &[
            "Check that the data matches the expected format",
            "Try cleaning or re-importing the data",
        ],
        DATA_EMPTY => &[
            "No data matches the current conditions",
            "Try adjusting the filters",
        ],
        PERMISSION_DENIED => &[
            "You may not have access to this resource",
            "Ask an administrator for access",
        ],
        RESOURCE_BUSY => &["The resource is in use by another task", "Try again later"],
        _ => &["Try again later", "If the problem persists, contact support"],
    }
}
