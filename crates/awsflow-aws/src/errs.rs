//! SDK error classification

use crate::error::AwsError;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use std::error::Error;

/// Maps an SDK error onto [`AwsError`]
///
/// Errors whose code is one of `not_found_codes` become
/// [`AwsError::NotFound`]; every other failure keeps its full message.
pub(crate) fn classify<E>(err: E, not_found_codes: &[&str]) -> AwsError
where
    E: ProvideErrorMetadata + Error + 'static,
{
    let code = err.code().map(str::to_string);
    let message = DisplayErrorContext(&err).to_string();

    match code {
        Some(code) if not_found_codes.contains(&code.as_str()) => {
            let detail = err.message().unwrap_or(code.as_str()).to_string();
            AwsError::NotFound(format!("{}: {}", code, detail))
        }
        code => AwsError::Service { code, message },
    }
}
