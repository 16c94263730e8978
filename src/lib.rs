pub mod config;
pub mod error;
pub mod notifications;

pub mod commands {
    pub mod backup;
}

pub use commands::backup::{
    Backup, backup, create_backup, create_backup_current, resolve_next_index,
};
pub use error::BackupError;
