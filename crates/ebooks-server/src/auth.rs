use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub scope: KeyScope,
}

/// Bearer-token API key auth with read-only and read-write key sets.
/// Disabled entirely when no keys are configured.
#[derive(Clone)]
pub struct ApiKeyAuth {
    read_only_keys: HashSet<String>,
    read_write_keys: HashSet<String>,
}

fn keys_from_env(var: &str) -> HashSet<String> {
    std::env::var(var)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl ApiKeyAuth {
    pub fn from_env() -> Self {
        Self {
            read_only_keys: keys_from_env("EBOOKS_SERVER__API_KEYS_RO"),
            read_write_keys: keys_from_env("EBOOKS_SERVER__API_KEYS_RW"),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.read_only_keys.is_empty() || !self.read_write_keys.is_empty()
    }

    pub fn authenticate(&self, token: &str) -> Option<AuthContext> {
        if self.read_write_keys.contains(token) {
            Some(AuthContext {
                scope: KeyScope::ReadWrite,
            })
        } else if self.read_only_keys.contains(token) {
            Some(AuthContext {
                scope: KeyScope::ReadOnly,
            })
        } else {
            None
        }
    }
}

pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let auth = request.extensions().get::<ApiKeyAuth>().cloned();

    let Some(auth) = auth else {
        return next.run(request).await;
    };

    if !auth.is_enabled() {
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(token) => match auth.authenticate(token) {
            Some(context) => {
                let mut request = request;
                request.extensions_mut().insert(context);
                next.run(request).await
            }
            None => (StatusCode::UNAUTHORIZED, "Invalid API key").into_response(),
        },
        None => (StatusCode::UNAUTHORIZED, "Missing Authorization header").into_response(),
    }
}

/// Middleware to enforce write access
pub async fn require_write(request: Request, next: Next) -> Response {
    if let Some(context) = request.extensions().get::<AuthContext>() {
        if context.scope != KeyScope::ReadWrite {
            return (StatusCode::FORBIDDEN, "Write access required").into_response();
        }
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(ro: &[&str], rw: &[&str]) -> ApiKeyAuth {
        ApiKeyAuth {
            read_only_keys: ro.iter().map(|s| s.to_string()).collect(),
            read_write_keys: rw.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn disabled_without_keys() {
        assert!(!auth(&[], &[]).is_enabled());
        assert!(auth(&["a"], &[]).is_enabled());
    }

    #[test]
    fn authenticate_resolves_scope() {
        let auth = auth(&["ro-key"], &["rw-key"]);
        assert_eq!(
            auth.authenticate("rw-key").unwrap().scope,
            KeyScope::ReadWrite
        );
        assert_eq!(
            auth.authenticate("ro-key").unwrap().scope,
            KeyScope::ReadOnly
        );
        assert!(auth.authenticate("other").is_none());
    }
}
