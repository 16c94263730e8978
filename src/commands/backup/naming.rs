use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// バックアップ元フォルダの名前と、バックアップを作成する親ディレクトリ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub base_name: OsString,
    pub parent: PathBuf,
}

impl SourceLocation {
    /// `<base_name>_<index>` 形式のバックアップ名を返す。
    pub fn backup_name(&self, index: u64) -> OsString {
        let mut name = self.base_name.clone();
        name.push(format!("_{index}"));
        name
    }

    pub fn backup_path(&self, index: u64) -> PathBuf {
        self.parent.join(self.backup_name(index))
    }
}

/// パスからフォルダ名と親ディレクトリを導出する。
///
/// `.` や `..` のように末尾要素を持たないパスは実体解決してから導出する。
/// ルートディレクトリなど名前を持たない場合は `None`。
pub fn locate(source: &Path) -> Option<SourceLocation> {
    split_lexically(source).or_else(|| {
        let canonical = source.canonicalize().ok()?;
        split_lexically(&canonical)
    })
}

fn split_lexically(path: &Path) -> Option<SourceLocation> {
    let base_name = path.file_name()?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Some(SourceLocation {
        base_name: base_name.to_os_string(),
        parent,
    })
}

/// 兄弟ディレクトリを走査し、次に使うバックアップ番号を返す。
///
/// `<name>_<数字>` に一致するディレクトリの最大番号 + 1、一致がなければ 1。
/// 親ディレクトリの読み取りエラーはそのまま呼び出し元へ返す。
pub fn resolve_next_index(source: &Path) -> io::Result<u64> {
    let location = locate(source).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot determine a folder name for '{}'", source.display()),
        )
    })?;

    next_index_in(&location.parent, &location.base_name)
}

/// `parent` 直下で `base_name` の次のバックアップ番号を求める。
pub fn next_index_in(parent: &Path, base_name: &OsStr) -> io::Result<u64> {
    let mut max_index: Option<u64> = None;

    for entry in fs::read_dir(parent)? {
        let entry = entry?;
        let file_name = entry.file_name();

        let Some(index) = parse_backup_index(&file_name, base_name) else {
            continue;
        };

        if !entry.path().is_dir() {
            log::debug!("ignoring '{}': not a directory", file_name.to_string_lossy());
            continue;
        }

        max_index = Some(max_index.map_or(index, |current| current.max(index)));
    }

    Ok(max_index.map_or(1, |index| index.saturating_add(1)))
}

/// `entry_name` が `<base_name>_<数字>` 形式であれば番号を返す。
///
/// 数字は最後に現れる `<base_name>_` の後ろから末尾までで、
/// 数字以外を含む・桁あふれする場合は `None`。
/// UTF-8 でない名前も扱えるようバイト列で照合する。
fn parse_backup_index(entry_name: &OsStr, base_name: &OsStr) -> Option<u64> {
    let name = entry_name.as_encoded_bytes();
    let mut prefix = base_name.as_encoded_bytes().to_vec();
    prefix.push(b'_');

    if !name.starts_with(&prefix) {
        return None;
    }

    let start = name
        .windows(prefix.len())
        .rposition(|window| window == prefix.as_slice())?
        + prefix.len();
    let digits = &name[start..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        log::debug!(
            "ignoring '{}': suffix is not a number",
            entry_name.to_string_lossy()
        );
        return None;
    }

    std::str::from_utf8(digits).ok()?.parse().ok()
}
