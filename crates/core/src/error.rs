use storage::models::CardId;
use storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("card not found: {0}")]
    CardNotFound(CardId),
    #[error("card name cannot be empty")]
    EmptyName,
    #[error("collection name cannot be empty")]
    EmptyCollectionName,
    #[error("collection name is reserved: {0}")]
    ReservedCollectionName(String),
    #[error("collection already exists: {0}")]
    DuplicateCollection(String),
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
    #[error("built-in collection cannot be changed: {0}")]
    BuiltinCollection(String),
    #[error("unknown tier: {0}")]
    UnknownTier(String),
    #[error("order write failed: {0}")]
    OrderWrite(String),
    #[error("order writer stopped")]
    WriterStopped,
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup file must be a .json file: {0}")]
    WrongExtension(String),
    #[error("backup is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported backup version {found} (supported up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("invalid card {id}: {reason}")]
    InvalidCard { id: String, reason: String },
    #[error("duplicate card id in backup: {0}")]
    DuplicateCard(String),
    #[error("file payload for {id} is not valid base64: {source}")]
    Payload {
        id: String,
        source: base64::DecodeError,
    },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unsupported media for thumbnail rendering")]
    Unsupported,
    #[error("render failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("source path does not exist: {}", .0.display())]
    SourceNotFound(std::path::PathBuf),
    #[error("archive entry escapes destination: {0}")]
    UnsafeEntry(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),
}
