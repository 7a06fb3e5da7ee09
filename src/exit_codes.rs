//! Process exit codes. The CLI surface defines a small, explicit contract:
//! 0 success, 1 generic error, 2 authentication failure (wrong passphrase),
//! 3 file-format error (corrupt or unrecognized envelope). Usage errors
//! (bad arguments) are left to clap's own `EXIT_USAGE` convention.

use crate::config::ConfigError;
use crate::keybox::envelope::EnvelopeError;
use crate::keybox::facade::KeyboxError;
use crate::keybox::io::KeyboxIoError;
use crate::keybox::plain_json::PlainJsonError;
use crate::keybox::prompt::PromptError;
use crate::keybox::store::StoreError;
use crate::keybox::table::TableError;
use std::process::ExitCode;

pub const EXIT_OK: u8 = 0;
pub const EXIT_GENERIC: u8 = 1;
pub const EXIT_AUTH_FAILURE: u8 = 2;
pub const EXIT_FILE_FORMAT: u8 = 3;
pub const EXIT_USAGE: u8 = 64;

pub fn exit_code_for_config_error(_error: &ConfigError) -> ExitCode {
    ExitCode::from(EXIT_GENERIC)
}

pub fn exit_code_for_prompt_error(error: &PromptError) -> ExitCode {
    use PromptError::*;
    match error {
        Io(_) => ExitCode::from(EXIT_GENERIC),
        Empty | Mismatch => ExitCode::from(EXIT_USAGE),
    }
}

pub fn exit_code_for_envelope_error(error: &EnvelopeError) -> ExitCode {
    use EnvelopeError::*;
    match error {
        AuthFailure => ExitCode::from(EXIT_AUTH_FAILURE),
        BadMagic
        | TruncatedHeader
        | TruncatedData
        | UnknownCipher(_)
        | UnknownKdf(_)
        | UnknownCompression(_)
        | IntegrityFailure
        | MalformedKdfParams
        | MissingChunk(_) => ExitCode::from(EXIT_FILE_FORMAT),
        Crypto(_) => ExitCode::from(EXIT_GENERIC),
    }
}

pub fn exit_code_for_table_error(_error: &TableError) -> ExitCode {
    ExitCode::from(EXIT_FILE_FORMAT)
}

pub fn exit_code_for_store_error(error: &StoreError) -> ExitCode {
    use StoreError::*;
    match error {
        NotFound | IllegalFieldCharacter { .. } => ExitCode::from(EXIT_USAGE),
        UnknownColumnDataLoss(_) => ExitCode::from(EXIT_USAGE),
        Table(err) => exit_code_for_table_error(err),
    }
}

pub fn exit_code_for_io_error(_error: &KeyboxIoError) -> ExitCode {
    ExitCode::from(EXIT_GENERIC)
}

pub fn exit_code_for_plain_json_error(error: &PlainJsonError) -> ExitCode {
    use PlainJsonError::*;
    match error {
        Table(err) => exit_code_for_table_error(err),
        Store(err) => exit_code_for_store_error(err),
        NotAnArray | Json(_) => ExitCode::from(EXIT_FILE_FORMAT),
        Io(_) => ExitCode::from(EXIT_GENERIC),
    }
}

pub fn exit_code_for_keybox_error(error: &KeyboxError) -> ExitCode {
    use KeyboxError::*;
    match error {
        AlreadyExists | NotFound => ExitCode::from(EXIT_USAGE),
        Envelope(err) => exit_code_for_envelope_error(err),
        Table(err) => exit_code_for_table_error(err),
        Store(err) => exit_code_for_store_error(err),
        Io(err) => exit_code_for_io_error(err),
        Inner(_) => ExitCode::from(EXIT_FILE_FORMAT),
        Crypto(_) => ExitCode::from(EXIT_GENERIC),
    }
}
