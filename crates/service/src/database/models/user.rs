use sqlx::FromRow;
use time::OffsetDateTime;

use common::crypto::{KeyError, LockedKey, PublicKey};

use crate::database::types::RowId;
use crate::database::Database;

/// A registered account with its public key and locked private key
#[derive(Clone, FromRow)]
pub struct User {
    pub id: RowId,
    pub email: String,
    pub password_hash: String,
    pub totp_secret: String,
    pub public_key: String,
    pub private_key_ciphertext: Vec<u8>,
    pub private_key_salt: Vec<u8>,
    pub private_key_nonce: Vec<u8>,
    pub created_at: OffsetDateTime,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Everything needed to insert a user row
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub totp_secret: String,
    pub public_key: String,
    pub locked_key: LockedKey,
}

const USER_COLUMNS: &str = r#"
    id, email, password_hash, totp_secret, public_key,
    private_key_ciphertext, private_key_salt, private_key_nonce, created_at
"#;

impl User {
    pub async fn create(new: NewUser, db: &Database) -> Result<User, sqlx::Error> {
        let id = RowId::generate();
        let created_at = OffsetDateTime::now_utc();

        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, password_hash, totp_secret, public_key,
                private_key_ciphertext, private_key_salt, private_key_nonce, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(id)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.totp_secret)
        .bind(&new.public_key)
        .bind(&new.locked_key.ciphertext)
        .bind(&new.locked_key.salt)
        .bind(&new.locked_key.nonce)
        .bind(created_at)
        .execute(&**db)
        .await?;

        Ok(User {
            id,
            email: new.email,
            password_hash: new.password_hash,
            totp_secret: new.totp_secret,
            public_key: new.public_key,
            private_key_ciphertext: new.locked_key.ciphertext,
            private_key_salt: new.locked_key.salt,
            private_key_nonce: new.locked_key.nonce,
            created_at,
        })
    }

    pub async fn get(id: RowId, db: &Database) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&**db)
            .await
    }

    pub async fn by_email(email: &str, db: &Database) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?1"
        ))
        .bind(email)
        .fetch_optional(&**db)
        .await
    }

    /// Look up each address in turn. Returns the users found, in the order
    /// given, and the addresses that matched nobody.
    pub async fn by_emails(
        emails: &[String],
        db: &Database,
    ) -> Result<(Vec<User>, Vec<String>), sqlx::Error> {
        let mut found = Vec::with_capacity(emails.len());
        let mut missing = Vec::new();
        for email in emails {
            match Self::by_email(email, db).await? {
                Some(user) => found.push(user),
                None => missing.push(email.clone()),
            }
        }
        Ok((found, missing))
    }

    pub fn public_key(&self) -> Result<PublicKey, KeyError> {
        PublicKey::from_pem(&self.public_key)
    }

    pub fn locked_key(&self) -> LockedKey {
        LockedKey {
            ciphertext: self.private_key_ciphertext.clone(),
            salt: self.private_key_salt.clone(),
            nonce: self.private_key_nonce.clone(),
        }
    }
}
