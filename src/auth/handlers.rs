use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, MeResponse, MessageResponse,
            PublicUser, RegisterRequest, RegisterResponse, ResetPasswordRequest,
            UpdatePasswordRequest, VerifyOtpRequest,
        },
        jwt::{AuthUser, JwtKeys, MaybeAuthUser, VerifiedUser},
        otp::{generate_otp, generate_reset_token, hash_token},
        password::{hash_password, verify_password},
        repo_types::{Role, User, VerificationState},
        validate::{
            is_valid_email, normalize_email, parse_registration_role, validate_full_name,
            validate_password,
        },
    },
    email::Mailer,
    error::ApiError,
    state::AppState,
};

/// One message for existing and unknown accounts alike.
const FORGOT_PASSWORD_MESSAGE: &str = "If that email is registered, a reset link has been sent";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/resend-otp", post(resend_otp))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password/:reset_token", post(reset_password))
        .route("/auth/update-password", put(update_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

/// Boundary conversion for store/hash failures: log the detail, return the
/// generic 500 body.
fn internal(context: &'static str) -> impl FnOnce(anyhow::Error) -> ApiError {
    move |e| {
        error!(error = %e, context, "internal error");
        ApiError::internal()
    }
}

/// Credential gate for login. Deactivation is reported regardless of
/// password correctness; a wrong password shares the unknown-email body.
fn authenticate(user: &User, password: &str) -> Result<(), ApiError> {
    if !user.is_active {
        warn!(user_id = %user.id, "login on deactivated account");
        return Err(ApiError::account_deactivated());
    }
    let ok = verify_password(password, &user.password_hash).map_err(internal("verify_password"))?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::invalid_credentials());
    }
    Ok(())
}

/// Decides whether a submitted OTP code verifies the account at `now`.
fn check_otp(user: &User, code: &str, now: OffsetDateTime) -> Result<(), ApiError> {
    match user.verification_state(now) {
        VerificationState::Verified => {
            warn!(user_id = %user.id, "verify-otp on verified account");
            Err(ApiError::already_verified())
        }
        VerificationState::NoneIssued => {
            warn!(user_id = %user.id, "verify-otp without issued code");
            Err(ApiError::otp_not_issued())
        }
        VerificationState::Expired => {
            warn!(user_id = %user.id, "verify-otp with expired code");
            Err(ApiError::otp_expired())
        }
        VerificationState::Pending { otp_hash } => {
            if hash_token(code.trim()) != otp_hash {
                warn!(user_id = %user.id, "verify-otp wrong code");
                return Err(ApiError::invalid_otp());
            }
            Ok(())
        }
    }
}

/// Gate for the authenticated password change: the current password must
/// verify before anything is touched.
fn check_current_password(user: &User, current: &str) -> Result<(), ApiError> {
    let ok = verify_password(current, &user.password_hash).map_err(internal("verify_password"))?;
    if !ok {
        warn!(user_id = %user.id, "update-password wrong current password");
        return Err(ApiError::wrong_password());
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::validation("email", "Invalid email address"));
    }
    validate_password(&payload.password)?;
    validate_full_name(&payload.full_name)?;
    let role = parse_registration_role(payload.role.as_deref())?;

    if User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(internal("find_by_email"))?
        .is_some()
    {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::email_taken());
    }

    let password_hash = hash_password(&payload.password).map_err(internal("hash_password"))?;

    let otp = generate_otp();
    let otp_expires_at =
        OffsetDateTime::now_utc() + Duration::minutes(state.config.otp_ttl_minutes);
    let user = User::create(
        &state.db,
        &payload.email,
        payload.full_name.trim(),
        role,
        &password_hash,
        &hash_token(&otp),
        otp_expires_at,
    )
    .await
    .map_err(internal("create user"))?;

    // Best effort: the account exists either way, resending is the user's
    // recovery path.
    let delivery = state.mailer.send_otp(&user.email, &user.full_name, &otp).await;
    if !delivery.is_sent() {
        warn!(user_id = %user.id, ?delivery, "OTP email not delivered");
    }

    let token = JwtKeys::from_ref(&state)
        .sign(&user)
        .map_err(internal("jwt sign"))?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            token,
            requires_verification: true,
            user: PublicUser::from(&user),
            debug_otp: state.config.debug_tokens.then_some(otp),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = normalize_email(&payload.email);

    let mut user = match User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(internal("find_by_email"))?
    {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::invalid_credentials());
        }
    };

    authenticate(&user, &payload.password)?;

    User::touch_last_login(&state.db, user.id)
        .await
        .map_err(internal("touch_last_login"))?;
    user.last_login = Some(OffsetDateTime::now_utc());

    let token = JwtKeys::from_ref(&state)
        .sign(&user)
        .map_err(internal("jwt sign"))?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        success: true,
        token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<MeResponse>, ApiError> {
    let user = User::find_by_id(&state.db, claims.sub)
        .await
        .map_err(internal("find_by_id"))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(MeResponse {
        success: true,
        user: PublicUser::from(&user),
    }))
}

/// No server-side session state to revoke; the client discards its token.
#[instrument(skip_all)]
pub async fn logout(AuthUser(claims): AuthUser) -> Json<MessageResponse> {
    info!(user_id = %claims.sub, "user logged out");
    Json(MessageResponse::new("Logged out"))
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let mut user = User::find_by_id(&state.db, claims.sub)
        .await
        .map_err(internal("find_by_id"))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    check_otp(&user, &payload.code, OffsetDateTime::now_utc())?;

    User::mark_email_verified(&state.db, user.id)
        .await
        .map_err(internal("mark_email_verified"))?;
    user.is_email_verified = true;
    user.otp_hash = None;
    user.otp_expires_at = None;

    let delivery = state.mailer.send_welcome(&user.email, &user.full_name).await;
    if !delivery.is_sent() {
        warn!(user_id = %user.id, ?delivery, "welcome email not delivered");
    }

    // Reissue so the claims carry email_verified = true.
    let token = JwtKeys::from_ref(&state)
        .sign(&user)
        .map_err(internal("jwt sign"))?;

    info!(user_id = %user.id, "email verified");
    Ok(Json(AuthResponse {
        success: true,
        token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state))]
pub async fn resend_otp(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = User::find_by_id(&state.db, claims.sub)
        .await
        .map_err(internal("find_by_id"))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if user.is_email_verified {
        warn!(user_id = %user.id, "resend-otp on verified account");
        return Err(ApiError::already_verified());
    }

    // Overwriting invalidates the previous code.
    let otp = generate_otp();
    let otp_expires_at =
        OffsetDateTime::now_utc() + Duration::minutes(state.config.otp_ttl_minutes);
    User::set_otp(&state.db, user.id, &hash_token(&otp), otp_expires_at)
        .await
        .map_err(internal("set_otp"))?;

    let delivery = state.mailer.send_otp(&user.email, &user.full_name, &otp).await;
    if !delivery.is_sent() {
        warn!(user_id = %user.id, ?delivery, "OTP email not delivered");
    }

    info!(user_id = %user.id, "OTP reissued");
    let mut response = MessageResponse::new("A new OTP code has been sent");
    response.debug_otp = state.config.debug_tokens.then_some(otp);
    Ok(Json(response))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = normalize_email(&payload.email);

    let mut response = MessageResponse::new(FORGOT_PASSWORD_MESSAGE);

    // Unknown accounts get the same acknowledgement as known ones.
    if let Some(user) = User::find_by_email(&state.db, &email)
        .await
        .map_err(internal("find_by_email"))?
    {
        let token = generate_reset_token();
        let expires_at =
            OffsetDateTime::now_utc() + Duration::minutes(state.config.reset_ttl_minutes);
        User::set_reset_token(&state.db, user.id, &hash_token(&token), expires_at)
            .await
            .map_err(internal("set_reset_token"))?;

        let link = format!(
            "{}/reset-password/{}",
            state.config.frontend_base_url.trim_end_matches('/'),
            token
        );
        let delivery = state.mailer.send_reset_link(&user.email, &user.full_name, &link).await;
        if !delivery.is_sent() {
            warn!(user_id = %user.id, ?delivery, "reset email not delivered");
        }

        info!(user_id = %user.id, "reset token issued");
        response.debug_reset_token = state.config.debug_tokens.then_some(token);
    }

    Ok(Json(response))
}

#[instrument(skip(state, payload, reset_token))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(reset_token): Path<String>,
    MaybeAuthUser(caller): MaybeAuthUser,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    validate_password(&payload.password)?;

    let user = User::find_by_reset_token_hash(&state.db, &hash_token(&reset_token))
        .await
        .map_err(internal("find_by_reset_token_hash"))?
        .ok_or_else(ApiError::invalid_reset_token)?;

    // Expired tokens share the unknown-token body.
    if !user.reset_token_valid(OffsetDateTime::now_utc()) {
        warn!(user_id = %user.id, "reset with expired token");
        return Err(ApiError::invalid_reset_token());
    }

    // A caller logged in as someone else cannot consume this link.
    if let Some(claims) = caller {
        if claims.sub != user.id {
            warn!(user_id = %user.id, caller = %claims.sub, "cross-account reset refused");
            return Err(ApiError::forbidden("Reset link belongs to a different account"));
        }
    }

    let password_hash = hash_password(&payload.password).map_err(internal("hash_password"))?;
    User::update_password_hash(&state.db, user.id, &password_hash)
        .await
        .map_err(internal("update_password_hash"))?;

    let token = JwtKeys::from_ref(&state)
        .sign(&user)
        .map_err(internal("jwt sign"))?;

    info!(user_id = %user.id, "password reset");
    Ok(Json(AuthResponse {
        success: true,
        token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_password(
    State(state): State<AppState>,
    VerifiedUser(claims): VerifiedUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = User::find_by_id(&state.db, claims.sub)
        .await
        .map_err(internal("find_by_id"))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    check_current_password(&user, &payload.current_password)?;

    validate_password(&payload.new_password)?;

    let password_hash = hash_password(&payload.new_password).map_err(internal("hash_password"))?;
    User::update_password_hash(&state.db, user.id, &password_hash)
        .await
        .map_err(internal("update_password_hash"))?;

    let token = JwtKeys::from_ref(&state)
        .sign(&user)
        .map_err(internal("jwt sign"))?;

    info!(user_id = %user.id, "password changed");
    Ok(Json(AuthResponse {
        success: true,
        token,
        user: PublicUser::from(&user),
    }))
}
