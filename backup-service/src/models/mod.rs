pub mod api;
pub mod transfer;

pub use api::{
    AuthStatusResponse, DisconnectResponse, FileIdQuery, FileListResponse, FolderQuery,
    LoadResponse, MaterialContentResponse, ModuleListResponse, OAuthCallbackQuery,
    RestoreResponse, SaveResponse,
};
pub use transfer::{TransferLog, TransferStatus};
