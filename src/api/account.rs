//! Account handlers: register, login, logout, current session.

use std::sync::Arc;

use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;

use crate::auth::{AuthService, LoginRequest, RegisterRequest, Session};
use crate::error::{ActionResult, Created, Result};
use crate::session::SessionClaims;
use crate::validation::ValidatedJson;

pub(super) async fn register(
    State(auth): State<Arc<AuthService>>,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> Result<(CookieJar, Created<SessionClaims>)> {
    let (jar, claims) = auth.register(jar, &body).await?;
    Ok((jar, Created(claims)))
}

pub(super) async fn login(
    State(auth): State<Arc<AuthService>>,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, ActionResult<SessionClaims>)> {
    let (jar, claims) = auth.login(jar, &body.email, &body.password).await?;
    Ok((jar, ActionResult::ok(claims)))
}

/// Succeeds with or without a session.
pub(super) async fn logout(
    State(auth): State<Arc<AuthService>>,
    jar: CookieJar,
) -> (CookieJar, ActionResult<()>) {
    (auth.logout(jar), ActionResult::ok(()))
}

pub(super) async fn current_session(session: Session) -> ActionResult<SessionClaims> {
    ActionResult::ok(session.0)
}
