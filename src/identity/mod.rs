//! Caller identity, bearer tokens, access decisions and login adjudication.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod provider;
mod request_context;
mod authorizer;
mod recorder;

pub use principal::{CallerIdentity, Role, UserId};
pub use session::{InvalidToken, PlaceholderTokenCodec, SignedTokenCodec, TokenCodec, TokenKeyError, ADMIN_TOKEN, USER_TOKEN_PREFIX};
pub use provider::{AuthProvider, LocalAuthProvider, LoginError, LoginRequest, LoginResponse};
pub use request_context::{RequestContext, resolve_client_ip};
pub use authorizer::{AccessDecision, DecisionReason, check_role, evaluate, evaluate_update};
pub use recorder::LoginEventRecorder;
