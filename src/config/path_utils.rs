//! 路径工具模块

use std::path::{Path, PathBuf};

/// 展开路径中的 tilde (~) 为用户主目录
///
/// 支持 `~` 和 `~/path`；`~user/path` 及其他路径原样返回。
/// 无法获取主目录时也原样返回。
pub fn expand_tilde<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();

    if !path_str.starts_with('~') {
        return path.to_path_buf();
    }

    let home_dir = match dirs::home_dir() {
        Some(dir) => dir,
        None => return path.to_path_buf(),
    };

    if path_str == "~" {
        home_dir
    } else if let Some(rest) = path_str.strip_prefix("~/") {
        home_dir.join(rest)
    } else {
        path.to_path_buf()
    }
}
