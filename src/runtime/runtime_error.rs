/// A fatal error raised while executing bytecode. The VM stops at the first
/// one and the machine that raised it should be discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        RuntimeError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runtime error: {}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

pub fn stack_overflow() -> RuntimeError {
    RuntimeError::new("stack overflow")
}

pub fn stack_underflow() -> RuntimeError {
    RuntimeError::new("stack underflow")
}

pub fn frame_overflow() -> RuntimeError {
    RuntimeError::new("frame stack overflow")
}

pub fn division_by_zero() -> RuntimeError {
    RuntimeError::new("division by zero")
}

pub fn unsupported_binary_types(left: &str, right: &str) -> RuntimeError {
    RuntimeError::new(format!(
        "unsupported types for binary operation: ({}, {})",
        left, right
    ))
}

pub fn unknown_integer_operator(op: &str) -> RuntimeError {
    RuntimeError::new(format!("unknown integer operator: {}", op))
}

pub fn unknown_string_operator(op: &str) -> RuntimeError {
    RuntimeError::new(format!("unknown string operator: {}", op))
}

pub fn unknown_comparison_operator(op: &str, left: &str, right: &str) -> RuntimeError {
    RuntimeError::new(format!("unknown operator: {} ({} {})", op, left, right))
}

pub fn unsupported_negation(operand: &str) -> RuntimeError {
    RuntimeError::new(format!("unsupported type for negation: {}", operand))
}

pub fn calling_non_function(callee: &str) -> RuntimeError {
    RuntimeError::new(format!("calling non-function: {}", callee))
}

pub fn unusable_hash_key(key: &str) -> RuntimeError {
    RuntimeError::new(format!("unusable as hash key: {}", key))
}

pub fn index_not_supported(container: &str) -> RuntimeError {
    RuntimeError::new(format!("index operator not supported: {}", container))
}
