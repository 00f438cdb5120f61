use serde::{Deserialize, Serialize};

use super::{Envelope, EnvelopeError};
use crate::crypto::{KeyGrant, PublicKey, Sealed, Secret, SecretKey, SIGNATURE_ALGORITHM};

/// Outcome of checking the sender's signature
///
/// A bad signature is not an error: the content still decrypts, and it is up
/// to the caller to decide what to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verification {
    Verified,
    TamperedOrForged,
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct OpenedAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl OpenedAttachment {
    /// Plaintext size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for OpenedAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedAttachment")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.size())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    pub subject: String,
    pub body: String,
    pub attachments: Vec<OpenedAttachment>,
    pub verification: Verification,
}

/// A recipient's unwrapped view of one message
///
/// Holding an `Opener` means the grant has already been unwrapped, so single
/// fields (an inbox subject, one attachment) can be decrypted without
/// touching the rest of the envelope.
#[derive(Debug)]
pub struct Opener {
    secret: Secret,
}

impl Opener {
    /// Unwrap the message secret from the recipient's grant
    pub fn unwrap(grant: &KeyGrant, recipient: &SecretKey) -> Result<Self, EnvelopeError> {
        let secret = grant
            .recover(recipient)
            .map_err(|_| EnvelopeError::KeyUnwrap)?;
        Ok(Self { secret })
    }

    pub fn bytes(&self, sealed: &Sealed) -> Result<Vec<u8>, EnvelopeError> {
        self.secret
            .decrypt(sealed)
            .map_err(|_| EnvelopeError::Decryption)
    }

    pub fn text(&self, sealed: &Sealed) -> Result<String, EnvelopeError> {
        String::from_utf8(self.bytes(sealed)?).map_err(|_| EnvelopeError::Encoding)
    }

    /// Decrypt every field, then check the sender's signature
    pub fn open(&self, envelope: &Envelope, sender: &PublicKey) -> Result<Opened, EnvelopeError> {
        let subject = self.text(&envelope.subject)?;
        let body = self.text(&envelope.body)?;
        let attachments = envelope
            .attachments
            .iter()
            .map(|attachment| -> Result<OpenedAttachment, EnvelopeError> {
                Ok(OpenedAttachment {
                    filename: attachment.filename.clone(),
                    content_type: attachment.content_type.clone(),
                    data: self.bytes(&attachment.payload)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Opened {
            subject,
            body,
            attachments,
            verification: verify(envelope, sender),
        })
    }
}

/// Unwrap, decrypt and verify in one go
pub fn open(
    envelope: &Envelope,
    grant: &KeyGrant,
    recipient: &SecretKey,
    sender: &PublicKey,
) -> Result<Opened, EnvelopeError> {
    Opener::unwrap(grant, recipient)?.open(envelope, sender)
}

/// Check the sender's signature over the stored ciphertext
pub fn verify(envelope: &Envelope, sender: &PublicKey) -> Verification {
    if envelope.signature_algorithm != SIGNATURE_ALGORITHM {
        return Verification::TamperedOrForged;
    }
    match sender.verify(&envelope.signing_input(), &envelope.signature) {
        Ok(()) => Verification::Verified,
        Err(_) => Verification::TamperedOrForged,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::envelope::{seal, AttachmentDraft, Draft, Sealing};
    use crate::testkit;

    fn sealed_for_bob() -> Sealing {
        let draft = Draft {
            subject: "Quarterly numbers".to_string(),
            body: "See attached.".to_string(),
            attachments: vec![AttachmentDraft::new(
                "report.csv",
                "text/csv",
                b"a,b\n1,2\n".to_vec(),
            )],
        };
        seal(
            &draft,
            &testkit::secret_key(0),
            &[testkit::secret_key(1).public()],
        )
        .unwrap()
    }

    #[test]
    fn test_open_roundtrip() {
        let sealing = sealed_for_bob();
        let opened = open(
            &sealing.envelope,
            &sealing.grants[0],
            &testkit::secret_key(1),
            &testkit::secret_key(0).public(),
        )
        .unwrap();

        assert_eq!(opened.subject, "Quarterly numbers");
        assert_eq!(opened.body, "See attached.");
        assert_eq!(opened.attachments.len(), 1);
        assert_eq!(opened.attachments[0].filename, "report.csv");
        assert_eq!(opened.attachments[0].size(), 8);
        assert_eq!(opened.verification, Verification::Verified);
        assert!(opened.verification.is_verified());
    }

    #[test]
    fn test_opener_single_fields() {
        let sealing = sealed_for_bob();
        let opener = Opener::unwrap(&sealing.grants[0], &testkit::secret_key(1)).unwrap();

        assert_eq!(
            opener.text(&sealing.envelope.subject).unwrap(),
            "Quarterly numbers"
        );
        assert_eq!(
            opener
                .bytes(&sealing.envelope.attachments[0].payload)
                .unwrap(),
            b"a,b\n1,2\n"
        );
    }

    #[test]
    fn test_wrong_sender_key_is_not_verified() {
        let sealing = sealed_for_bob();
        let opened = open(
            &sealing.envelope,
            &sealing.grants[0],
            &testkit::secret_key(1),
            &testkit::secret_key(2).public(),
        )
        .unwrap();
        assert_eq!(opened.body, "See attached.");
        assert_eq!(opened.verification, Verification::TamperedOrForged);
    }

    #[test]
    fn test_unknown_algorithm_is_not_verified() {
        let mut envelope = sealed_for_bob().envelope;
        envelope.signature_algorithm = "RSA-PKCS1-SHA1".to_string();
        assert_eq!(
            verify(&envelope, &testkit::secret_key(0).public()),
            Verification::TamperedOrForged
        );
    }
}
