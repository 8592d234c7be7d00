pub use masterror::{AppError, AppResult};

/// Create file read error
pub fn file_read_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to read file '{}': {}", path, source))
}

/// Create file write error
pub fn file_write_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to write file '{}': {}", path, source))
}

/// Create table catalog error
pub fn catalog_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(format!("Invalid table catalog: {}", message.into()))
}

/// Create jobs input error
pub fn jobs_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(format!("Invalid jobs file: {}", message.into()))
}

/// Create statement parse error with optional position info
pub fn statement_parse_error(message: impl Into<String>) -> AppError {
    let msg = message.into();
    AppError::bad_request(format_sql_error("Statement parse error", &msg))
}

/// Create rule evaluation error
///
/// Raised by a rule when the statement has a shape it cannot reason about.
/// The evaluator turns it into a non-triggered verdict.
pub fn rule_error(rule: &str, message: impl Into<String>) -> AppError {
    AppError::internal(format!("Rule '{}' failed: {}", rule, message.into()))
}

/// Create output serialization error
pub fn output_error(message: impl Into<String>) -> AppError {
    AppError::internal(format!("Failed to render output: {}", message.into()))
}

/// Create config error
pub fn config_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}

/// Format SQL error with position highlighting
fn format_sql_error(prefix: &str, message: &str) -> String {
    // sqlparser format: "... at Line: X, Column: Y"
    if let Some(pos) = extract_position(message) {
        format!(
            "{} at line {}, column {}:\n  {}",
            prefix, pos.line, pos.column, message
        )
    } else {
        format!("{}:\n  {}", prefix, message)
    }
}

struct SqlPosition {
    line:   usize,
    column: usize
}

fn extract_position(message: &str) -> Option<SqlPosition> {
    let line_marker = "Line: ";
    let line_start = message.find(line_marker)? + line_marker.len();
    let rest = &message[line_start..];
    let line_end = rest.find(|c: char| !c.is_ascii_digit())?;
    let line = rest[..line_end].parse().ok()?;

    let after_line = &rest[line_end..];
    let col_start = after_line.find(|c: char| c.is_ascii_digit())?;
    let digits = &after_line[col_start..];
    let col_end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let column = digits[..col_end].parse().ok()?;

    Some(SqlPosition {
        line,
        column
    })
}
