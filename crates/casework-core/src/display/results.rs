//! Confirmation output for state-changing commands.

use std::fmt;

/// A one-line confirmation followed by the resource the command produced.
///
/// ```rust
/// use casework_core::display::CommandResult;
///
/// let result = CommandResult::new("Terminated case 7", "nothing left");
/// assert_eq!(result.to_string(), "Terminated case 7\n\nnothing left");
/// ```
pub struct CommandResult<T> {
    pub summary: String,
    pub resource: T,
}

impl<T> CommandResult<T> {
    pub fn new(summary: impl Into<String>, resource: T) -> Self {
        Self {
            summary: summary.into(),
            resource,
        }
    }
}

impl<T: fmt::Display> fmt::Display for CommandResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary)?;
        writeln!(f)?;
        write!(f, "{}", self.resource)
    }
}
