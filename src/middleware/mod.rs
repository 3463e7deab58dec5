pub mod auth;
pub mod identity;
pub mod response;

pub use auth::{jwt_auth_middleware, AuthError, AuthState, AuthUser, PublicPaths};
pub use identity::{IdentityError, RequestIdentity};
pub use response::{ApiResponse, ApiResult};
