use serde::{Deserialize, Serialize};

/// Resource bounds for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SandboxLimits {
    /// Evaluation steps (fuel) before the run is aborted.
    pub max_steps: u64,
    /// Nested function calls.
    pub max_call_depth: usize,
    /// Syntactic nesting accepted by the parser.
    pub max_nesting: usize,
    /// Longest string a template may build, in bytes.
    pub max_string_len: usize,
    /// Longest list or object a template may build.
    pub max_list_len: usize,
    /// How deeply lists, objects and closures may nest inside each other.
    pub max_value_depth: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            max_call_depth: 64,
            max_nesting: 128,
            max_string_len: 1 << 20,
            max_list_len: 100_000,
            max_value_depth: 256,
        }
    }
}
