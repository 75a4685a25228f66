//! 설정 모듈 공용 유틸리티.

use std::env;
use std::path::Path;

/// provider CLI 명령이 현재 환경에서 실행 가능한지 탐지한다.
/// 경로가 포함된 명령은 그 파일만 검사하고, 단일 이름은 PATH를 탐색한다.
pub fn command_exists(command: &str) -> bool {
    let command = command.trim();
    if command.is_empty() {
        return false;
    }

    let as_path = Path::new(command);
    if as_path.components().count() > 1 {
        return is_runnable(as_path);
    }

    let Some(search_path) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&search_path).any(|dir| found_in_dir(&dir, command))
}

/// 일반 파일 + 실행 권한까지 확인한다. 존재하지만 실행 불가한 파일을 거른다.
#[cfg(unix)]
fn is_runnable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_runnable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(windows)]
fn found_in_dir(dir: &Path, command: &str) -> bool {
    if is_runnable(&dir.join(command)) {
        return true;
    }
    // 확장자가 없으면 PATHEXT 후보를 차례로 시도한다.
    if Path::new(command).extension().is_some() {
        return false;
    }
    let pathext = env::var("PATHEXT").unwrap_or_else(|_| ".EXE;.CMD;.BAT;.COM".to_string());
    pathext
        .split(';')
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .any(|ext| is_runnable(&dir.join(format!("{command}{ext}"))))
}

#[cfg(not(windows))]
fn found_in_dir(dir: &Path, command: &str) -> bool {
    is_runnable(&dir.join(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_is_never_runnable() {
        assert!(!command_exists(""));
        assert!(!command_exists("   "));
    }

    #[test]
    fn explicit_path_requires_existing_file() {
        assert!(!command_exists("/nonexistent/dir/some-tool"));
    }

    #[cfg(unix)]
    #[test]
    fn executable_bit_gates_explicit_paths() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("tool");
        fs::write(&tool, "#!/bin/sh\n").unwrap();

        fs::set_permissions(&tool, fs::Permissions::from_mode(0o644)).unwrap();
        assert!(!command_exists(tool.to_str().unwrap()));

        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(command_exists(tool.to_str().unwrap()));
    }
}
