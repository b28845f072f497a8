use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::permissions::Role;
use crate::auth::repo_types::{Gender, User};

const USER_COLUMNS: &str = "id, first_name, last_name, other_names, display_name, birthdate, \
     gender, country, email, phone_number, address, profile_picture, role, password_hash, \
     password_reset_token, password_reset_expires, password_changed_at, created_at";

/// Fields required to insert a new user. The id is generated by the caller so
/// the profile picture can be stored under it before the row exists.
#[derive(Debug)]
pub struct NewUser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub other_names: Option<String>,
    pub display_name: String,
    pub birthdate: time::Date,
    pub gender: Gender,
    pub country: String,
    pub phone_number: String,
    pub address: String,
    pub email: String,
    pub profile_picture: String,
    pub role: Role,
    pub password_hash: String,
}

impl User {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn email_exists(db: &PgPool, email: &str) -> anyhow::Result<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(db)
                .await?;
        Ok(exists)
    }

    pub async fn create(db: &PgPool, new: NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, first_name, last_name, other_names, display_name, birthdate, \
             gender, country, email, phone_number, address, profile_picture, role, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(new.id)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.other_names)
        .bind(&new.display_name)
        .bind(new.birthdate)
        .bind(new.gender)
        .bind(&new.country)
        .bind(&new.email)
        .bind(&new.phone_number)
        .bind(&new.address)
        .bind(&new.profile_picture)
        .bind(new.role)
        .bind(&new.password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Store a reset-token digest and its expiry on the user record.
    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        digest: &str,
        expires: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET password_reset_token = $2, password_reset_expires = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(digest)
        .bind(expires)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Roll back a reset-token issuance, e.g. when the email could not be sent.
    pub async fn clear_reset_token(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET password_reset_token = NULL, password_reset_expires = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Find the user holding an unexpired reset token with the given digest.
    pub async fn find_by_reset_token(
        db: &PgPool,
        digest: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE password_reset_token = $1 AND password_reset_expires > $2"
        ))
        .bind(digest)
        .bind(now)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Replace the password hash, clear any pending reset token and stamp the
    /// change time, invalidating previously issued tokens.
    pub async fn update_password(db: &PgPool, id: Uuid, hash: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET password_hash = $2, password_reset_token = NULL, \
             password_reset_expires = NULL, password_changed_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update_profile_picture(
        db: &PgPool,
        id: Uuid,
        key: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET profile_picture = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(key)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
