pub mod constants;
pub mod string_utils;
pub mod url_utils;

pub use constants::*;
pub use string_utils::{
    collapse_whitespace, safe_truncate_boundary, safe_truncate_chars, strip_code_fences,
};
pub use url_utils::{is_internal_link, parse_audit_url};
