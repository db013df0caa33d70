//! HTTP clients for the external services the core depends on
//!
//! Each client implements one of the core's service traits so the core stays
//! free of transport details and can be exercised with in-process stubs.

pub mod openai;
pub mod search_console;

pub use openai::OpenAiMetaProvider;
pub use search_console::{SearchConsoleSource, TokenSource};

/// Keep at most this many bytes of an error body in logs and errors
const MAX_ERROR_BODY: usize = 512;

pub(crate) fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
