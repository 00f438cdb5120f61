//! Hybrid encrypt-and-sign message envelopes
//!
//! Sealing a message:
//! 1. Generate one fresh [`Secret`] for the whole message
//! 2. Encrypt subject, body and every attachment independently, each under its
//!    own random nonce
//! 3. Sign `subject ‖ body ‖ attachment₁ ‖ … ‖ attachmentₙ` (ciphertext bytes
//!    only, in declaration order) with the sender's key, RSASSA-PSS/SHA-256
//! 4. Wrap the secret once per recipient ([`KeyGrant`])
//!
//! The signed byte layout is fixed once a message is sealed; readers rebuild
//! it from the stored ciphertext (see [`Envelope::signing_input`]).
//!
//! Opening lives in [`open`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::crypto::{
    GrantError, KeyError, KeyGrant, PublicKey, Sealed, Secret, SecretError, SecretKey,
    SIGNATURE_ALGORITHM,
};

mod open;

pub use open::{open, verify, Opened, OpenedAttachment, Opener, Verification};

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("malformed attachment {0}")]
    MalformedAttachment(String),
    #[error("at least one recipient is required")]
    NoRecipients,
    #[error("recipient {0} is listed more than once")]
    DuplicateRecipient(usize),
    #[error("signing failed: {0}")]
    Sign(#[from] KeyError),
    #[error("key unwrap failure")]
    KeyUnwrap,
    #[error("decryption failure")]
    Decryption,
    #[error("decrypted text is not valid utf-8")]
    Encoding,
    #[error("secret error: {0}")]
    Secret(#[from] SecretError),
    #[error("grant error: {0}")]
    Grant(#[from] GrantError),
}

/// A plaintext attachment waiting to be sealed
#[derive(Clone, PartialEq, Eq)]
pub struct AttachmentDraft {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for AttachmentDraft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentDraft")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.data.len())
            .finish()
    }
}

impl AttachmentDraft {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Decode an attachment received in its base64 transport encoding
    pub fn from_base64(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        encoded: &str,
    ) -> Result<Self, EnvelopeError> {
        let filename = filename.into();
        let data = STANDARD
            .decode(encoded.trim())
            .map_err(|_| EnvelopeError::MalformedAttachment(filename.clone()))?;
        Ok(Self::new(filename, content_type, data))
    }
}

/// A plaintext message waiting to be sealed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub subject: String,
    pub body: String,
    pub attachments: Vec<AttachmentDraft>,
}

/// An encrypted attachment. Filename and content type stay in clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedAttachment {
    pub filename: String,
    pub content_type: String,
    pub payload: Sealed,
}

/// Everything about a message that is shared by all of its recipients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub subject: Sealed,
    pub body: Sealed,
    pub attachments: Vec<SealedAttachment>,
    pub signature: Vec<u8>,
    pub signature_algorithm: String,
}

impl Envelope {
    /// The exact bytes covered by the sender's signature
    pub fn signing_input(&self) -> Vec<u8> {
        signing_input(
            &self.subject,
            &self.body,
            self.attachments.iter().map(|a| &a.payload),
        )
    }
}

fn signing_input<'a>(
    subject: &Sealed,
    body: &Sealed,
    attachments: impl Iterator<Item = &'a Sealed>,
) -> Vec<u8> {
    let mut input = Vec::new();
    input.extend_from_slice(subject.ciphertext());
    input.extend_from_slice(body.ciphertext());
    for attachment in attachments {
        input.extend_from_slice(attachment.ciphertext());
    }
    input
}

/// Output of [`seal`]: the shared envelope plus one grant per recipient,
/// in the same order as the recipients were given
#[derive(Debug, Clone)]
pub struct Sealing {
    pub envelope: Envelope,
    pub grants: Vec<KeyGrant>,
}

/// Encrypt, sign and address a message
///
/// # Errors
///
/// Rejects an empty recipient list and a recipient listed twice before doing
/// any cryptographic work.
pub fn seal(
    draft: &Draft,
    sender: &SecretKey,
    recipients: &[PublicKey],
) -> Result<Sealing, EnvelopeError> {
    if recipients.is_empty() {
        return Err(EnvelopeError::NoRecipients);
    }
    for (i, recipient) in recipients.iter().enumerate() {
        if recipients[..i].contains(recipient) {
            return Err(EnvelopeError::DuplicateRecipient(i));
        }
    }

    let secret = Secret::generate()?;
    let subject = secret.encrypt(draft.subject.as_bytes())?;
    let body = secret.encrypt(draft.body.as_bytes())?;
    let attachments = draft
        .attachments
        .iter()
        .map(|attachment| -> Result<SealedAttachment, EnvelopeError> {
            Ok(SealedAttachment {
                filename: attachment.filename.clone(),
                content_type: attachment.content_type.clone(),
                payload: secret.encrypt(&attachment.data)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let signature = sender.sign(&signing_input(
        &subject,
        &body,
        attachments.iter().map(|a| &a.payload),
    ))?;

    let grants = recipients
        .iter()
        .map(|recipient| KeyGrant::new(&secret, recipient))
        .collect::<Result<Vec<_>, GrantError>>()?;

    Ok(Sealing {
        envelope: Envelope {
            subject,
            body,
            attachments,
            signature,
            signature_algorithm: SIGNATURE_ALGORITHM.to_string(),
        },
        grants,
    })
}
