use super::naming::{self, SourceLocation};
use crate::config::CopyConfig;
use crate::error::BackupError;
use std::fs::{self, File, FileTimes, Metadata};
use std::io;
use std::path::{Path, PathBuf};

/// 実行フェーズで使うバックアップタスク情報を保持する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTask {
    pub source: PathBuf,
    pub location: SourceLocation,
    pub index: u64,
    pub backup_path: PathBuf,
}

impl BackupTask {
    /// 表示用のバックアップ名を返す。
    pub fn backup_name(&self) -> String {
        self.location
            .backup_name(self.index)
            .to_string_lossy()
            .into_owned()
    }
}

/// コピー中に失敗したエントリと原因。
struct EntryError {
    path: PathBuf,
    source: io::Error,
}

fn at(path: &Path) -> impl FnOnce(io::Error) -> EntryError + '_ {
    move |source| EntryError {
        path: path.to_path_buf(),
        source,
    }
}

/// コピー元を検証し、次のバックアップ番号を決めてタスクを構築する。
///
/// ここまではファイルシステムへ一切書き込まない。
pub fn validate(source: &Path) -> Result<BackupTask, BackupError> {
    if !source.exists() {
        return Err(BackupError::SourceNotFound(source.to_path_buf()));
    }

    if !source.is_dir() {
        return Err(BackupError::NotADirectory(source.to_path_buf()));
    }

    let location =
        naming::locate(source).ok_or_else(|| BackupError::InvalidSource(source.to_path_buf()))?;

    let index = naming::next_index_in(&location.parent, &location.base_name).map_err(|e| {
        BackupError::ListParent {
            path: location.parent.clone(),
            source: e,
        }
    })?;

    log::debug!(
        "next backup index for '{}' is {index}",
        location.base_name.to_string_lossy()
    );

    Ok(BackupTask {
        source: source.to_path_buf(),
        backup_path: location.backup_path(index),
        location,
        index,
    })
}

/// バックアップ先ディレクトリを新規作成し、コピー元のツリーを丸ごとコピーする。
///
/// バックアップ先が既に存在する場合は上書きせず失敗する。
/// 途中で失敗したコピーは削除しない。
pub fn execute(task: &BackupTask, options: &CopyConfig) -> Result<(), BackupError> {
    copy_root(task, options).map_err(|e| BackupError::CopyFailed {
        backup: task.backup_name(),
        path: e.path,
        source: e.source,
    })
}

fn copy_root(task: &BackupTask, options: &CopyConfig) -> Result<(), EntryError> {
    let source_meta = fs::metadata(&task.source).map_err(at(&task.source))?;

    // create_dir_all ではなく create_dir を使い、既存ディレクトリへの合流を防ぐ
    fs::create_dir(&task.backup_path).map_err(at(&task.backup_path))?;
    log::info!(
        "copying '{}' to '{}'",
        task.source.display(),
        task.backup_path.display()
    );

    copy_dir_recursive(&task.source, &task.backup_path, options)?;
    finish_directory(&task.backup_path, &source_meta, options)
}

/// ディレクトリを再帰的に走査し、配下を同構造でコピーする。
fn copy_dir_recursive(
    source: &Path,
    target: &Path,
    options: &CopyConfig,
) -> Result<(), EntryError> {
    for entry in fs::read_dir(source).map_err(at(source))? {
        let entry = entry.map_err(at(source))?;
        let entry_path = entry.path();
        let target_path = target.join(entry.file_name());

        let file_type = entry.file_type().map_err(at(&entry_path))?;
        if file_type.is_symlink() && options.preserve_symlinks {
            copy_symlink(&entry_path, &target_path).map_err(at(&entry_path))?;
            continue;
        }

        // シンボリックリンクはリンク先を辿ってコピーする
        let meta = fs::metadata(&entry_path).map_err(at(&entry_path))?;
        if meta.is_dir() {
            fs::create_dir(&target_path).map_err(at(&target_path))?;
            copy_dir_recursive(&entry_path, &target_path, options)?;
            finish_directory(&target_path, &meta, options)?;
        } else if meta.is_file() {
            fs::copy(&entry_path, &target_path).map_err(at(&entry_path))?;
            if options.preserve_timestamps {
                copy_times(&target_path, &meta).map_err(at(&target_path))?;
            }
        } else {
            return Err(EntryError {
                path: entry_path,
                source: io::Error::new(io::ErrorKind::Unsupported, "unsupported file type"),
            });
        }
    }

    Ok(())
}

/// 中身のコピー後にディレクトリの日時と権限を揃える。
///
/// 読み取り専用ディレクトリでも中身を書き込めるよう、権限は最後に設定する。
fn finish_directory(
    target: &Path,
    meta: &Metadata,
    options: &CopyConfig,
) -> Result<(), EntryError> {
    if options.preserve_timestamps {
        copy_times(target, meta).map_err(at(target))?;
    }
    fs::set_permissions(target, meta.permissions()).map_err(at(target))
}

fn copy_times(target: &Path, meta: &Metadata) -> io::Result<()> {
    let times = FileTimes::new()
        .set_accessed(meta.accessed()?)
        .set_modified(meta.modified()?);
    open_for_times(target)?.set_times(times)
}

#[cfg(not(windows))]
fn open_for_times(path: &Path) -> io::Result<File> {
    File::open(path)
}

#[cfg(windows)]
fn open_for_times(path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_WRITE_ATTRIBUTES: u32 = 0x0100;
    const FILE_FLAG_BACKUP_SEMANTICS: u32 = 0x0200_0000;

    File::options()
        .access_mode(FILE_WRITE_ATTRIBUTES)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS)
        .open(path)
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> io::Result<()> {
    let link_target = fs::read_link(source)?;
    std::os::unix::fs::symlink(link_target, target)
}

#[cfg(windows)]
fn copy_symlink(source: &Path, target: &Path) -> io::Result<()> {
    let link_target = fs::read_link(source)?;
    if fs::metadata(source).is_ok_and(|m| m.is_dir()) {
        std::os::windows::fs::symlink_dir(link_target, target)
    } else {
        std::os::windows::fs::symlink_file(link_target, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source_with_file(root: &Path) -> PathBuf {
        let source = root.join("src");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("a.txt"), "alpha").unwrap();
        source
    }

    #[test]
    fn test_validate_builds_task_without_side_effects() {
        let temp_dir = TempDir::new().unwrap();
        let source = source_with_file(temp_dir.path());
        fs::create_dir(temp_dir.path().join("src_4")).unwrap();

        let task = validate(&source).unwrap();
        assert_eq!(task.index, 5);
        assert_eq!(task.backup_name(), "src_5");
        assert_eq!(task.backup_path, temp_dir.path().join("src_5"));
        assert!(!task.backup_path.exists());
    }

    #[test]
    fn test_validate_rejects_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let err = validate(&temp_dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, BackupError::SourceNotFound(_)));
    }

    #[test]
    fn test_validate_rejects_regular_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "data").unwrap();

        let err = validate(&file).unwrap_err();
        assert!(matches!(err, BackupError::NotADirectory(_)));
    }

    #[test]
    fn test_execute_fails_when_backup_path_already_exists() {
        // 番号決定後に同名ディレクトリが作られた場合を再現する
        let temp_dir = TempDir::new().unwrap();
        let source = source_with_file(temp_dir.path());

        let task = validate(&source).unwrap();
        fs::create_dir(&task.backup_path).unwrap();
        fs::write(task.backup_path.join("marker.txt"), "keep me").unwrap();

        let err = execute(&task, &CopyConfig::default()).unwrap_err();
        match err {
            BackupError::CopyFailed { backup, path, source } => {
                assert_eq!(backup, "src_1");
                assert_eq!(path, task.backup_path);
                assert_eq!(source.kind(), io::ErrorKind::AlreadyExists);
            }
            other => panic!("unexpected error: {other}"),
        }

        let entries: Vec<_> = fs::read_dir(&task.backup_path)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("marker.txt")]);
        assert_eq!(
            fs::read_to_string(task.backup_path.join("marker.txt")).unwrap(),
            "keep me"
        );
    }

    #[test]
    fn test_execute_preserves_file_modification_time() {
        let temp_dir = TempDir::new().unwrap();
        let source = source_with_file(temp_dir.path());
        let modified = std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000_000);
        File::options()
            .write(true)
            .open(source.join("a.txt"))
            .unwrap()
            .set_modified(modified)
            .unwrap();

        let task = validate(&source).unwrap();
        execute(&task, &CopyConfig::default()).unwrap();

        let copied = fs::metadata(task.backup_path.join("a.txt")).unwrap();
        assert_eq!(copied.modified().unwrap(), modified);
    }

    #[test]
    fn test_execute_preserves_directory_modification_time() {
        let temp_dir = TempDir::new().unwrap();
        let source = source_with_file(temp_dir.path());
        let sub = source.join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("b.txt"), "beta").unwrap();
        let modified = std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_200_000_000);
        open_for_times(&sub)
            .unwrap()
            .set_times(FileTimes::new().set_modified(modified))
            .unwrap();

        let task = validate(&source).unwrap();
        execute(&task, &CopyConfig::default()).unwrap();

        let copied = fs::metadata(task.backup_path.join("sub")).unwrap();
        assert_eq!(copied.modified().unwrap(), modified);
    }

    #[test]
    fn test_execute_skips_timestamps_when_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let source = source_with_file(temp_dir.path());
        let modified = std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000_000);
        File::options()
            .write(true)
            .open(source.join("a.txt"))
            .unwrap()
            .set_modified(modified)
            .unwrap();

        let options = CopyConfig {
            preserve_timestamps: false,
            ..CopyConfig::default()
        };
        let task = validate(&source).unwrap();
        execute(&task, &options).unwrap();

        let copied = fs::metadata(task.backup_path.join("a.txt")).unwrap();
        assert_ne!(copied.modified().unwrap(), modified);
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_follows_symlinks_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let source = source_with_file(temp_dir.path());
        std::os::unix::fs::symlink("a.txt", source.join("link.txt")).unwrap();

        let task = validate(&source).unwrap();
        execute(&task, &CopyConfig::default()).unwrap();

        let copied = task.backup_path.join("link.txt");
        assert!(!fs::symlink_metadata(&copied).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(copied).unwrap(), "alpha");
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_recreates_symlinks_when_configured() {
        let temp_dir = TempDir::new().unwrap();
        let source = source_with_file(temp_dir.path());
        std::os::unix::fs::symlink("a.txt", source.join("link.txt")).unwrap();
        std::os::unix::fs::symlink("missing.txt", source.join("dangling.txt")).unwrap();

        let options = CopyConfig {
            preserve_symlinks: true,
            ..CopyConfig::default()
        };
        let task = validate(&source).unwrap();
        execute(&task, &options).unwrap();

        assert_eq!(
            fs::read_link(task.backup_path.join("link.txt")).unwrap(),
            PathBuf::from("a.txt")
        );
        assert_eq!(
            fs::read_link(task.backup_path.join("dangling.txt")).unwrap(),
            PathBuf::from("missing.txt")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_fails_on_dangling_symlink_when_following() {
        let temp_dir = TempDir::new().unwrap();
        let source = source_with_file(temp_dir.path());
        std::os::unix::fs::symlink("missing.txt", source.join("dangling.txt")).unwrap();

        let task = validate(&source).unwrap();
        let err = execute(&task, &CopyConfig::default()).unwrap_err();
        match err {
            BackupError::CopyFailed { path, source, .. } => {
                assert_eq!(path, task.source.join("dangling.txt"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
        // 途中までのコピーは残る
        assert!(task.backup_path.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_rejects_unsupported_file_type() {
        let temp_dir = TempDir::new().unwrap();
        let source = source_with_file(temp_dir.path());
        let _listener = std::os::unix::net::UnixListener::bind(source.join("sock")).unwrap();

        let task = validate(&source).unwrap();
        let err = execute(&task, &CopyConfig::default()).unwrap_err();
        assert!(err.to_string().contains("unsupported file type"));
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_copies_directory_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let source = source_with_file(temp_dir.path());
        let sub = source.join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("b.txt"), "beta").unwrap();
        fs::set_permissions(&sub, fs::Permissions::from_mode(0o750)).unwrap();

        let task = validate(&source).unwrap();
        execute(&task, &CopyConfig::default()).unwrap();

        let copied = fs::metadata(task.backup_path.join("sub")).unwrap();
        assert_eq!(copied.permissions().mode() & 0o777, 0o750);
        assert_eq!(
            fs::read_to_string(task.backup_path.join("sub").join("b.txt")).unwrap(),
            "beta"
        );
    }
}
