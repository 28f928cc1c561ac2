use std::path::{Path, PathBuf};

/// Expands a leading `~` to the home directory and anchors relative paths
/// at `cwd`.
pub fn resolve_path(raw: &str, home: Option<&Path>, cwd: &Path) -> PathBuf {
    let expanded = match (raw.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home.to_path_buf(),
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(raw),
    };
    if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    }
}

pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Pid of the shell that invoked us.
pub fn parent_pid() -> i64 {
    #[cfg(unix)]
    {
        i64::from(std::os::unix::process::parent_id())
    }
    #[cfg(not(unix))]
    {
        i64::from(std::process::id())
    }
}
