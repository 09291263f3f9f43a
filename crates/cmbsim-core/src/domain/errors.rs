//! Shared error type for the sweep engine.
//!
//! Every error carries a category (which maps to a stable process exit
//! code) and a machine-readable code such as `CONFIG.UNKNOWN_KEY` so that
//! callers and logs can match on failures without parsing messages.

pub type SimResult<T> = Result<T, SimError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimErrorCategory {
    InputValidation,
    IoSystem,
    Computation,
    Internal,
}

impl SimErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidation => 2,
            Self::IoSystem => 3,
            Self::Computation => 4,
            Self::Internal => 5,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::InputValidation => "InputValidation",
            Self::IoSystem => "IoSystem",
            Self::Computation => "Computation",
            Self::Internal => "Internal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} [{}] {}", .category.label(), .code, .message)]
pub struct SimError {
    category: SimErrorCategory,
    code: &'static str,
    message: String,
}

impl SimError {
    pub fn new(
        category: SimErrorCategory,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code,
            message: message.into(),
        }
    }

    pub fn input_validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(SimErrorCategory::InputValidation, code, message)
    }

    pub fn io_system(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(SimErrorCategory::IoSystem, code, message)
    }

    pub fn computation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(SimErrorCategory::Computation, code, message)
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(SimErrorCategory::Internal, code, message)
    }

    pub const fn category(&self) -> SimErrorCategory {
        self.category
    }

    pub const fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.code, self.message)
    }
}
