//! The keybox facade (C6): ties the envelope codec, the table codec, the
//! in-memory record store and per-password inner encryption together into
//! the operations a caller (the CLI) actually wants — open a file, list or
//! edit records, change the master passphrase, save.

use crate::keybox::crypto::{self, CryptoError, KdfParams, SecretBytes};
use crate::keybox::envelope::{self, EnvelopeError, EnvelopeParams};
use crate::keybox::inner::{self, InnerError};
use crate::keybox::io::{self, KeyboxIoError};
use crate::keybox::store::{Record, RecordId, RecordStore, StoreError};
use crate::keybox::table::{self, TableError};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zeroize::Zeroize;

#[derive(Debug, Error)]
pub enum KeyboxError {
    #[error("a keybox already exists at this path")]
    AlreadyExists,

    #[error("no keybox exists at this path")]
    NotFound,

    #[error(transparent)]
    Io(#[from] KeyboxIoError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Inner(#[from] InnerError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Read `KEYBOX_TEST_KDF` to pick cheap Argon2id tuning in tests; real
/// usage always gets the recommended, slow parameters.
pub fn kdf_params_from_env() -> KdfParams {
    if std::env::var_os("KEYBOX_TEST_KDF").is_some() {
        KdfParams::for_tests()
    } else {
        KdfParams::recommended()
    }
}

/// An open keybox: the decrypted record store plus everything needed to
/// re-seal it on `save`.
pub struct Keybox {
    path: PathBuf,
    store: RecordStore,
    key: SecretBytes,
    salt: [u8; crypto::SALT_LEN],
    params: EnvelopeParams,
}

impl Keybox {
    /// Create a new, empty keybox file. Fails if a file already exists at
    /// `path`.
    pub fn create(
        path: &Path,
        passphrase: &SecretString,
        kdf_params: Option<KdfParams>,
    ) -> Result<Self, KeyboxError> {
        if io::exists(path) {
            return Err(KeyboxError::AlreadyExists);
        }

        let params = EnvelopeParams {
            kdf_params: kdf_params.unwrap_or_else(kdf_params_from_env),
            ..EnvelopeParams::default()
        };
        let store = RecordStore::new();

        let (bytes, key) = envelope::seal(store.to_table_plaintext().as_bytes(), passphrase, params, None)?;
        let (_, salt) = envelope::inspect_header(&bytes)?;
        io::write_keybox_bytes_atomic(path, &bytes)?;

        Ok(Self {
            path: path.to_path_buf(),
            store,
            key,
            salt,
            params,
        })
    }

    /// Open an existing keybox, decrypting it with `passphrase`.
    pub fn open(path: &Path, passphrase: &SecretString) -> Result<Self, KeyboxError> {
        if !io::exists(path) {
            return Err(KeyboxError::NotFound);
        }
        let bytes = io::read_keybox_bytes(path)?;
        let (plaintext, key) = envelope::open(&bytes, passphrase)?;
        let text = String::from_utf8_lossy(&plaintext).into_owned();
        let parsed = table::parse(&text)?;
        let (params, salt) = envelope::inspect_header(&bytes)?;

        Ok(Self {
            path: path.to_path_buf(),
            store: RecordStore::load_rows(parsed.header, parsed.rows),
            key,
            salt,
            params,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &[String] {
        self.store.header()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.store.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &Record)> {
        self.store.iter()
    }

    pub fn find(&self, query: &str) -> Vec<(RecordId, &Record)> {
        self.store.find(query)
    }

    pub fn set_header(&mut self, columns: Vec<String>, force: bool) -> Result<(), KeyboxError> {
        Ok(self.store.set_header(columns, force)?)
    }

    /// Add a record. `password`, if present in `fields`, is encrypted under
    /// the keybox's master key before being stored.
    pub fn add(&mut self, fields: &[(&str, &str)]) -> Result<RecordId, KeyboxError> {
        let mut encrypted_password = None;
        let mut plain_fields = Vec::with_capacity(fields.len());
        for (column, value) in fields {
            if *column == "password" {
                encrypted_password = Some(inner::encrypt(&self.key, value)?);
            } else {
                plain_fields.push((*column, *value));
            }
        }
        let id = self.store.add(&plain_fields)?;
        if let Some(encrypted) = encrypted_password {
            self.store.modify(id, &[("password", &encrypted)])?;
        }
        Ok(id)
    }

    /// Modify a record's fields, same password-encryption handling as `add`.
    pub fn modify(&mut self, id: RecordId, fields: &[(&str, &str)]) -> Result<(), KeyboxError> {
        let mut plain_fields = Vec::with_capacity(fields.len());
        let mut encrypted_password = None;
        for (column, value) in fields {
            if *column == "password" {
                encrypted_password = Some(inner::encrypt(&self.key, value)?);
            } else {
                plain_fields.push((*column, *value));
            }
        }
        self.store.modify(id, &plain_fields)?;
        if let Some(encrypted) = encrypted_password {
            self.store.modify(id, &[("password", &encrypted)])?;
        }
        Ok(())
    }

    pub fn delete(&mut self, id: RecordId) -> Result<(), KeyboxError> {
        Ok(self.store.delete(id)?)
    }

    /// Decrypt and return a record's password in the clear. Callers should
    /// hold the result only as long as needed.
    pub fn reveal_password(&self, id: RecordId) -> Result<String, KeyboxError> {
        let record = self.store.get(id).ok_or(StoreError::NotFound)?;
        let stored = record.get("password");
        if stored.is_empty() {
            return Ok(String::new());
        }
        Ok(inner::decrypt(&self.key, stored)?)
    }

    /// Re-encrypt the full table and atomically overwrite the file, keeping
    /// the current salt and KDF tuning. Uses the already-derived key, so it
    /// never re-runs Argon2id or needs the passphrase again.
    pub fn save(&mut self) -> Result<(), KeyboxError> {
        let plaintext = self.store.to_table_plaintext();
        let bytes = envelope::seal_with_key(plaintext.as_bytes(), &self.key, &self.salt, self.params)?;
        io::write_keybox_bytes_atomic(&self.path, &bytes)?;
        Ok(())
    }

    /// Derive a new key from `new_passphrase`, re-encrypt every stored
    /// password under it, and rewrite the file with a fresh salt. The
    /// envelope itself is rewritten immediately (not deferred to the next
    /// `save`), since leaving the file under the old key after this call
    /// returns would be surprising.
    pub fn change_passphrase(&mut self, new_passphrase: &SecretString) -> Result<(), KeyboxError> {
        let new_salt = crypto::random_bytes::<{ crypto::SALT_LEN }>();
        let new_key = crypto::kdf_argon2id_from_passphrase(
            new_passphrase,
            &new_salt,
            self.params.kdf_params,
        )?;

        let ids: Vec<RecordId> = self.store.iter().map(|(id, _)| id).collect();
        for id in ids {
            let record = self.store.get(id).expect("id came from iter() above");
            let stored = record.get("password").to_string();
            if stored.is_empty() {
                continue;
            }
            let mut plaintext = inner::decrypt(&self.key, &stored)?;
            let re_encrypted = inner::encrypt(&new_key, &plaintext)?;
            plaintext.zeroize();
            self.store
                .set_field_without_touching_mtime(id, "password", &re_encrypted)?;
        }

        self.key = new_key;
        self.salt = new_salt;
        self.save()
    }
}
