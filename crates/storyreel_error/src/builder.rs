//! Request construction errors.

/// A request type rejected its inputs before any backend was contacted.
///
/// Every request in storyreel is assembled with a generated builder; this records
/// which one failed and the builder's complaint.
///
/// # Examples
///
/// ```
/// use storyreel_error::BuilderError;
///
/// let err = BuilderError::new("speech", "`voice` must be initialized");
/// assert_eq!(err.request, "speech");
/// assert!(err.to_string().starts_with("Invalid speech request"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Invalid {} request: {} at line {} in {}", request, reason, line, file)]
pub struct BuilderError {
    /// Which request was being built (`image`, `speech`, `composition`, ...)
    pub request: &'static str,
    /// What the builder rejected
    pub reason: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl BuilderError {
    /// Record a failed build of `request`.
    #[track_caller]
    pub fn new(request: &'static str, reason: impl ToString) -> Self {
        let location = std::panic::Location::caller();
        Self {
            request,
            reason: reason.to_string(),
            line: location.line(),
            file: location.file(),
        }
    }
}
