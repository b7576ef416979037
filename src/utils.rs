//! # Utility Functions Module
//!
//! Helpers for assembling external command lines.

/// Builds a `Vec<String>` of command arguments from heterogeneous items.
///
/// Lets command builders mix literals, numbers and paths without sprinkling
/// `.to_string()` everywhere.
///
/// # Example
/// ```rust
/// use nano_encoder::args;
///
/// let crf = 28;
/// let args = args!["-crf", crf, "-threads", 0];
/// assert_eq!(args, vec!["-crf", "28", "-threads", "0"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        vec![$($item.to_string()),*]
    };
}
