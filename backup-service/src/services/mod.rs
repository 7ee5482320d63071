pub mod drive;
pub mod error;
pub mod metrics;
pub mod oauth;
pub mod token_manager;

pub use drive::{BackupGateway, DriveGateway, GatewayError, RemoteFileRef};
pub use error::BackupError;
pub use oauth::{GoogleOAuthClient, OAuthError, Pkce, TokenGrant};
pub use token_manager::{
    AuthorizedClient, Clock, SystemClock, TokenError, TokenManager, TokenRefresher,
};
