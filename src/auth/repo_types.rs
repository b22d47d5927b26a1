use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Account role. Admins are provisioned out of band; registration only
/// accepts student and instructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_email_verified: bool,
    #[serde(skip_serializing)]
    pub otp_hash: Option<String>,
    pub otp_expires_at: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub reset_token_hash: Option<String>,
    pub reset_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub last_login: Option<OffsetDateTime>,
}

/// Email-verification state derived from the nullable OTP columns, so
/// "fields present but expired" never leaks past this function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
    Verified,
    Pending { otp_hash: String },
    Expired,
    NoneIssued,
}

impl User {
    pub fn verification_state(&self, now: OffsetDateTime) -> VerificationState {
        if self.is_email_verified {
            return VerificationState::Verified;
        }
        match (&self.otp_hash, self.otp_expires_at) {
            (Some(hash), Some(expires_at)) if expires_at > now => VerificationState::Pending {
                otp_hash: hash.clone(),
            },
            (Some(_), Some(_)) => VerificationState::Expired,
            _ => VerificationState::NoneIssued,
        }
    }

    /// Whether the stored reset token is usable at `now`.
    pub fn reset_token_valid(&self, now: OffsetDateTime) -> bool {
        matches!(
            (&self.reset_token_hash, self.reset_expires_at),
            (Some(_), Some(expires_at)) if expires_at > now
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn base_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            full_name: "Ann A".into(),
            role: Role::Student,
            password_hash: "$argon2id$fake".into(),
            is_active: true,
            is_email_verified: false,
            otp_hash: None,
            otp_expires_at: None,
            reset_token_hash: None,
            reset_expires_at: None,
            created_at: OffsetDateTime::now_utc(),
            last_login: None,
        }
    }

    #[test]
    fn no_otp_issued_maps_to_none_issued() {
        let user = base_user();
        let state = user.verification_state(OffsetDateTime::now_utc());
        assert_eq!(state, VerificationState::NoneIssued);
    }

    #[test]
    fn pending_otp_within_window() {
        let now = OffsetDateTime::now_utc();
        let mut user = base_user();
        user.otp_hash = Some("abc".into());
        user.otp_expires_at = Some(now + Duration::minutes(10));
        assert_eq!(
            user.verification_state(now),
            VerificationState::Pending {
                otp_hash: "abc".into()
            }
        );
    }

    #[test]
    fn expired_otp_is_distinct_from_missing() {
        let now = OffsetDateTime::now_utc();
        let mut user = base_user();
        user.otp_hash = Some("abc".into());
        user.otp_expires_at = Some(now - Duration::seconds(1));
        assert_eq!(user.verification_state(now), VerificationState::Expired);
    }

    #[test]
    fn verified_wins_over_leftover_otp_fields() {
        let now = OffsetDateTime::now_utc();
        let mut user = base_user();
        user.is_email_verified = true;
        user.otp_hash = Some("abc".into());
        user.otp_expires_at = Some(now + Duration::minutes(10));
        assert_eq!(user.verification_state(now), VerificationState::Verified);
    }

    #[test]
    fn reset_token_validity_requires_both_fields_and_future_expiry() {
        let now = OffsetDateTime::now_utc();
        let mut user = base_user();
        assert!(!user.reset_token_valid(now));

        user.reset_token_hash = Some("abc".into());
        assert!(!user.reset_token_valid(now));

        user.reset_expires_at = Some(now + Duration::minutes(10));
        assert!(user.reset_token_valid(now));

        user.reset_expires_at = Some(now - Duration::seconds(1));
        assert!(!user.reset_token_valid(now));
    }

    #[test]
    fn secret_fields_are_not_serialized() {
        let mut user = base_user();
        user.otp_hash = Some("otp-secret".into());
        user.reset_token_hash = Some("reset-secret".into());
        let json = serde_json::to_string(&user).expect("serialize");
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("otp-secret"));
        assert!(!json.contains("reset-secret"));
    }
}
