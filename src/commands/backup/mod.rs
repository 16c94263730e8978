pub mod args;
pub mod handlers;
pub mod naming;

use crate::config::{Config, CopyConfig};
use crate::error::BackupError;
use crate::notifications::{self, BackupSummary};
use args::Args;
use handlers::BackupTask;
use std::path::{Path, PathBuf};

pub use naming::resolve_next_index;

/// 作成済みバックアップの情報。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub name: String,
    pub path: PathBuf,
    pub index: u64,
}

/// fb コマンド全体を実行し、処理結果に応じて終了コードを決定する。
pub fn run(args: Args, config: Config) -> i32 {
    if args.dry_run {
        return dry_run(args.folder.as_deref());
    }

    let created = match &args.folder {
        Some(folder) => create_backup(folder, &config),
        None => create_backup_current(&config),
    };

    if created { 0 } else { 1 }
}

/// 指定フォルダのバックアップを作成し、結果を表示して成否を返す。
pub fn create_backup(source: &Path, config: &Config) -> bool {
    report(source, backup(source, &config.copy), config)
}

/// カレントディレクトリのバックアップを親ディレクトリに作成し、結果を表示して成否を返す。
pub fn create_backup_current(config: &Config) -> bool {
    match std::env::current_dir() {
        Ok(cwd) => create_backup(&cwd, config),
        Err(e) => report(Path::new("."), Err(BackupError::CurrentDir(e)), config),
    }
}

/// 番号決定からコピーまでを行い、作成したバックアップを返す。
pub fn backup(source: &Path, options: &CopyConfig) -> Result<Backup, BackupError> {
    let task = plan(source)?;
    handlers::execute(&task, options)?;

    Ok(Backup {
        name: task.backup_name(),
        path: task.backup_path,
        index: task.index,
    })
}

/// コピーせずに作成予定のバックアップを求める。
pub fn plan(source: &Path) -> Result<BackupTask, BackupError> {
    handlers::validate(source)
}

fn dry_run(folder: Option<&Path>) -> i32 {
    let source = match folder {
        Some(folder) => folder.to_path_buf(),
        None => match std::env::current_dir() {
            Ok(cwd) => cwd,
            Err(e) => {
                println!("fb: {}", BackupError::CurrentDir(e));
                return 1;
            }
        },
    };

    match plan(&source) {
        Ok(task) => {
            println!(
                "Would create backup: {} ({})",
                task.backup_name(),
                task.backup_path.display()
            );
            0
        }
        Err(e) => {
            println!("fb: {e}");
            1
        }
    }
}

fn report(source: &Path, result: Result<Backup, BackupError>, config: &Config) -> bool {
    let source_name = source.display().to_string();

    let summary = match &result {
        Ok(created) => {
            println!("Successfully created backup: {}", created.name);
            log::info!("backup written to '{}'", created.path.display());
            BackupSummary::succeeded(source_name, created.name.clone())
        }
        Err(e) => {
            println!("fb: {e}");
            BackupSummary::failed(source_name, e.to_string())
        }
    };

    if config.notify.macos_notify {
        notifications::notify_backup_result(&summary);
    }

    result.is_ok()
}
