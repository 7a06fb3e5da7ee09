pub mod crypto;
pub mod envelope;
pub mod facade;
pub mod inner;
pub mod io;
pub mod mtime;
pub mod plain_json;
pub mod prompt;
pub mod store;
pub mod table;

pub use facade::{Keybox, KeyboxError, kdf_params_from_env};
pub use plain_json::{PlainJsonError, export_json, export_plain, import_json, import_plain};
pub use prompt::{PromptError, prompt_new_passphrase, prompt_passphrase};
pub use store::{Record, RecordId, RecordStore, StoreError, KNOWN_COLUMNS};
