//! The binary envelope: `MAGIC || META_SIZE || META_DATA || DATA`.
//!
//! `META_DATA` is a sequence of TLV chunks (1-byte tag, 1-byte size, `size`
//! value bytes). `DATA` is `nonce(24) || secretbox(key, nonce, compressed?)`.
//! Unknown tags are forward-compatible: they are logged and skipped using
//! their declared size. Unknown cipher/KDF/compression values are fatal.

use crate::keybox::crypto::{self, CryptoError, KdfParams, SecretBytes};
use secrecy::SecretString;
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"[K]\0";

const TAG_END: u8 = 0;
const TAG_DATA_SIZE: u8 = 1;
const TAG_PLAIN_SIZE: u8 = 2;
const TAG_COMPRESSION: u8 = 3;
const TAG_CIPHER: u8 = 4;
const TAG_KDF: u8 = 5;
const TAG_KDF_PARAMS: u8 = 6;
const TAG_SALT: u8 = 7;
const TAG_CRC32: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    RawDeflate,
}

impl Compression {
    fn to_byte(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::RawDeflate => 1,
        }
    }

    fn from_byte(b: u8) -> Result<Self, EnvelopeError> {
        match b {
            0 => Ok(Compression::None),
            1 => Ok(Compression::RawDeflate),
            other => Err(EnvelopeError::UnknownCompression(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cipher {
    XSalsa20Poly1305,
}

impl Cipher {
    fn to_byte(self) -> u8 {
        match self {
            Cipher::XSalsa20Poly1305 => 1,
        }
    }

    fn from_byte(b: u8) -> Result<Self, EnvelopeError> {
        match b {
            1 => Ok(Cipher::XSalsa20Poly1305),
            other => Err(EnvelopeError::UnknownCipher(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kdf {
    Raw,
    Argon2id,
}

impl Kdf {
    fn to_byte(self) -> u8 {
        match self {
            Kdf::Raw => 0,
            Kdf::Argon2id => 1,
        }
    }

    fn from_byte(b: u8) -> Result<Self, EnvelopeError> {
        match b {
            0 => Ok(Kdf::Raw),
            1 => Ok(Kdf::Argon2id),
            other => Err(EnvelopeError::UnknownKdf(other)),
        }
    }
}

/// Envelope parameters that are persisted verbatim across saves (the file
/// itself carries its own KDF tuning, per spec DESIGN NOTES).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeParams {
    pub compression: Compression,
    pub cipher: Cipher,
    pub kdf: Kdf,
    pub kdf_params: KdfParams,
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self {
            compression: Compression::RawDeflate,
            cipher: Cipher::XSalsa20Poly1305,
            kdf: Kdf::Argon2id,
            kdf_params: KdfParams::recommended(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("file does not start with the expected magic bytes")]
    BadMagic,

    #[error("truncated envelope header")]
    TruncatedHeader,

    #[error("truncated data region")]
    TruncatedData,

    #[error("unknown cipher id {0}")]
    UnknownCipher(u8),

    #[error("unknown kdf id {0}")]
    UnknownKdf(u8),

    #[error("unknown compression id {0}")]
    UnknownCompression(u8),

    #[error("authentication failed (wrong passphrase or corrupted file)")]
    AuthFailure,

    #[error("plaintext size or crc32 mismatch after decryption")]
    IntegrityFailure,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("malformed kdf params chunk")]
    MalformedKdfParams,

    #[error("missing required chunk: {0}")]
    MissingChunk(&'static str),
}

/// Parse the fixed + TLV header of an envelope and return everything needed
/// to decrypt, plus the ciphertext region `nonce || secretbox_output`.
struct ParsedHeader<'a> {
    params: EnvelopeParams,
    salt: Vec<u8>,
    plain_size: u64,
    crc32: u32,
    data: &'a [u8],
}

fn parse_header(bytes: &[u8]) -> Result<ParsedHeader<'_>, EnvelopeError> {
    if bytes.len() < 8 {
        return Err(EnvelopeError::TruncatedHeader);
    }
    if &bytes[0..4] != MAGIC {
        return Err(EnvelopeError::BadMagic);
    }
    let meta_size = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
    if bytes.len() < 8 + meta_size {
        return Err(EnvelopeError::TruncatedHeader);
    }
    let meta = &bytes[8..8 + meta_size];
    let data = &bytes[8 + meta_size..];

    let mut data_size: Option<u64> = None;
    let mut plain_size: Option<u64> = None;
    let mut compression = Compression::RawDeflate;
    let mut cipher: Option<Cipher> = None;
    let mut kdf: Option<Kdf> = None;
    let mut kdf_params: Option<KdfParams> = None;
    let mut salt: Option<Vec<u8>> = None;
    let mut crc: Option<u32> = None;

    let mut pos = 0usize;
    loop {
        if pos >= meta.len() {
            break;
        }
        if meta.len() - pos < 2 {
            return Err(EnvelopeError::TruncatedHeader);
        }
        let tag = meta[pos];
        let size = meta[pos + 1] as usize;
        pos += 2;
        if meta.len() - pos < size {
            return Err(EnvelopeError::TruncatedHeader);
        }
        let value = &meta[pos..pos + size];
        pos += size;

        match tag {
            TAG_END => {
                if size != 0 {
                    return Err(EnvelopeError::TruncatedHeader);
                }
                break;
            }
            TAG_DATA_SIZE => data_size = Some(read_uint(value)?),
            TAG_PLAIN_SIZE => plain_size = Some(read_uint(value)?),
            TAG_COMPRESSION => {
                let b = *value.first().ok_or(EnvelopeError::TruncatedHeader)?;
                compression = Compression::from_byte(b)?;
            }
            TAG_CIPHER => {
                let b = *value.first().ok_or(EnvelopeError::TruncatedHeader)?;
                cipher = Some(Cipher::from_byte(b)?);
            }
            TAG_KDF => {
                let b = *value.first().ok_or(EnvelopeError::TruncatedHeader)?;
                kdf = Some(Kdf::from_byte(b)?);
            }
            TAG_KDF_PARAMS => {
                if value.len() != 4 {
                    return Err(EnvelopeError::MalformedKdfParams);
                }
                kdf_params = Some(KdfParams {
                    version: value[0],
                    mem_cost_log2: value[1],
                    time_cost: value[2] as u32,
                    parallelism: value[3] as u32,
                });
            }
            TAG_SALT => salt = Some(value.to_vec()),
            TAG_CRC32 => {
                if value.len() != 4 {
                    return Err(EnvelopeError::TruncatedHeader);
                }
                crc = Some(u32::from_le_bytes(value.try_into().unwrap()));
            }
            _ => {
                log::warn!("keybox: ignoring unknown envelope chunk tag {tag} (size {size})");
            }
        }
    }

    let data_size = data_size.ok_or(EnvelopeError::MissingChunk("DATA_SIZE"))? as usize;
    if data.len() < data_size {
        return Err(EnvelopeError::TruncatedData);
    }
    // Bytes beyond the declared DATA_SIZE are trailing garbage; dropped per
    // the format's own recommendation (spec DESIGN NOTES Open Question).
    if data.len() > data_size {
        log::warn!(
            "keybox: dropping {} trailing byte(s) after the declared data region",
            data.len() - data_size
        );
    }
    let data = &data[..data_size];

    let cipher = cipher.ok_or(EnvelopeError::MissingChunk("CIPHER"))?;
    if cipher != Cipher::XSalsa20Poly1305 {
        return Err(EnvelopeError::UnknownCipher(cipher.to_byte()));
    }
    let kdf = kdf.ok_or(EnvelopeError::MissingChunk("KDF"))?;
    let kdf_params = kdf_params.ok_or(EnvelopeError::MissingChunk("KDF_PARAMS"))?;
    let salt = salt.ok_or(EnvelopeError::MissingChunk("SALT"))?;
    let crc32 = crc.ok_or(EnvelopeError::MissingChunk("CRC32"))?;
    let plain_size = plain_size.ok_or(EnvelopeError::MissingChunk("PLAIN_SIZE"))?;

    Ok(ParsedHeader {
        params: EnvelopeParams {
            compression,
            cipher,
            kdf,
            kdf_params,
        },
        salt,
        plain_size,
        crc32,
        data,
    })
}

fn read_uint(value: &[u8]) -> Result<u64, EnvelopeError> {
    match value.len() {
        1 => Ok(value[0] as u64),
        2 => Ok(u16::from_le_bytes(value.try_into().unwrap()) as u64),
        4 => Ok(u32::from_le_bytes(value.try_into().unwrap()) as u64),
        8 => Ok(u64::from_le_bytes(value.try_into().unwrap())),
        _ => Err(EnvelopeError::TruncatedHeader),
    }
}

/// Parse just the header's params and salt, without touching the
/// ciphertext. Used by `Keybox::open` to remember what to pass back into
/// `seal_with_key` on the next `save`.
pub fn inspect_header(bytes: &[u8]) -> Result<(EnvelopeParams, [u8; crypto::SALT_LEN]), EnvelopeError> {
    let header = parse_header(bytes)?;
    let salt: [u8; crypto::SALT_LEN] = header
        .salt
        .as_slice()
        .try_into()
        .map_err(|_| EnvelopeError::MalformedKdfParams)?;
    Ok((header.params, salt))
}

/// Decrypt an envelope, returning the recovered plaintext table and the key
/// that was used (the caller needs it for per-password inner decryption).
pub fn open(
    bytes: &[u8],
    passphrase: &SecretString,
) -> Result<(Vec<u8>, SecretBytes), EnvelopeError> {
    let header = parse_header(bytes)?;
    let key = derive_key(header.params.kdf, header.params.kdf_params, &header.salt, passphrase)?;

    if header.data.len() < crypto::NONCE_LEN {
        return Err(EnvelopeError::TruncatedData);
    }
    let nonce = crypto::nonce_from_slice(&header.data[..crypto::NONCE_LEN])?;
    let ciphertext = &header.data[crypto::NONCE_LEN..];

    let compressed_or_plain =
        crypto::secretbox_open(&key, &nonce, ciphertext).map_err(|_| EnvelopeError::AuthFailure)?;

    let plaintext = match header.params.compression {
        Compression::None => compressed_or_plain,
        Compression::RawDeflate => crypto::deflate::decompress(&compressed_or_plain)
            .map_err(|_| EnvelopeError::IntegrityFailure)?,
    };

    if plaintext.len() as u64 != header.plain_size || crypto::crc32(&plaintext) != header.crc32 {
        return Err(EnvelopeError::IntegrityFailure);
    }

    Ok((plaintext, key))
}

/// Encrypt `plaintext` into a full envelope using a fresh salt (unless
/// `salt` is supplied, e.g. to keep it stable across a `change_passphrase`
/// re-encryption step) and a fresh nonce.
pub fn seal(
    plaintext: &[u8],
    passphrase: &SecretString,
    params: EnvelopeParams,
    salt: Option<[u8; crypto::SALT_LEN]>,
) -> Result<(Vec<u8>, SecretBytes), EnvelopeError> {
    let salt = salt.unwrap_or_else(crypto::random_bytes::<{ crypto::SALT_LEN }>);
    let key = derive_key(params.kdf, params.kdf_params, &salt, passphrase)?;
    let bytes = seal_with_key(plaintext, &key, &salt, params)?;
    Ok((bytes, key))
}

/// Seal `plaintext` with an already-derived key, skipping the KDF. Used by
/// `Keybox::save`, which re-encrypts on every save without re-prompting for
/// (or re-deriving from) the passphrase.
pub fn seal_with_key(
    plaintext: &[u8],
    key: &SecretBytes,
    salt: &[u8; crypto::SALT_LEN],
    params: EnvelopeParams,
) -> Result<Vec<u8>, EnvelopeError> {
    let plain_size = plaintext.len() as u64;
    let crc = crypto::crc32(plaintext);

    let compressed = match params.compression {
        Compression::None => plaintext.to_vec(),
        Compression::RawDeflate => {
            crypto::deflate::compress(plaintext).map_err(|_| EnvelopeError::IntegrityFailure)?
        }
    };

    let nonce = crypto::random_bytes::<{ crypto::NONCE_LEN }>();
    let ciphertext = crypto::secretbox_seal(key, &nonce, &compressed)?;

    let data_size = (crypto::NONCE_LEN + ciphertext.len()) as u64;

    let mut meta = Vec::new();
    push_chunk_uint(&mut meta, TAG_DATA_SIZE, data_size);
    push_chunk_uint(&mut meta, TAG_PLAIN_SIZE, plain_size);
    push_chunk(&mut meta, TAG_COMPRESSION, &[params.compression.to_byte()]);
    push_chunk(&mut meta, TAG_CIPHER, &[params.cipher.to_byte()]);
    push_chunk(&mut meta, TAG_KDF, &[params.kdf.to_byte()]);
    push_chunk(
        &mut meta,
        TAG_KDF_PARAMS,
        &[
            params.kdf_params.version,
            params.kdf_params.mem_cost_log2,
            params.kdf_params.time_cost as u8,
            params.kdf_params.parallelism as u8,
        ],
    );
    push_chunk(&mut meta, TAG_SALT, salt);
    push_chunk(&mut meta, TAG_CRC32, &crc.to_le_bytes());
    push_chunk(&mut meta, TAG_END, &[]);

    let mut out = Vec::with_capacity(8 + meta.len() + nonce.len() + ciphertext.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(meta.len() as u32).to_le_bytes());
    out.extend_from_slice(&meta);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);

    Ok(out)
}

fn derive_key(
    kdf: Kdf,
    kdf_params: KdfParams,
    salt: &[u8],
    passphrase: &SecretString,
) -> Result<SecretBytes, EnvelopeError> {
    match kdf {
        Kdf::Argon2id => Ok(crypto::kdf_argon2id_from_passphrase(
            passphrase,
            salt,
            kdf_params,
        )?),
        Kdf::Raw => {
            use secrecy::ExposeSecret;
            Ok(SecretBytes::from(
                passphrase.expose_secret().as_bytes().to_vec(),
            ))
        }
    }
}

fn push_chunk(buf: &mut Vec<u8>, tag: u8, value: &[u8]) {
    debug_assert!(value.len() <= u8::MAX as usize);
    buf.push(tag);
    buf.push(value.len() as u8);
    buf.extend_from_slice(value);
}

fn push_chunk_uint(buf: &mut Vec<u8>, tag: u8, value: u64) {
    push_chunk(buf, tag, &value.to_le_bytes());
}
