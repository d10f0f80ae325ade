use std::env;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory next to the executable when it already holds a config,
/// otherwise the working directory if that does, otherwise the executable's.
pub fn get_base_dir() -> PathBuf {
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    if has_config_candidate(&exe_dir) {
        return exe_dir;
    }

    if let Ok(cwd) = env::current_dir() {
        if has_config_candidate(&cwd) {
            return cwd;
        }
    }

    exe_dir
}

pub fn resolve_config_path(raw: Option<String>, base_dir: &Path) -> PathBuf {
    if let Some(path) = raw.filter(|p| !p.trim().is_empty()) {
        let path = PathBuf::from(path.trim());
        if path.is_absolute() {
            return path;
        }
        if let Ok(cwd) = env::current_dir() {
            return cwd.join(path);
        }
        return path;
    }

    config_candidates(base_dir)
        .into_iter()
        .find(|path| path.exists())
        .unwrap_or_else(|| base_dir.join(CONFIG_FILE_NAME))
}

fn config_candidates(base_dir: &Path) -> [PathBuf; 2] {
    [
        base_dir.join(CONFIG_FILE_NAME),
        base_dir.join("config").join(CONFIG_FILE_NAME),
    ]
}

fn has_config_candidate(base_dir: &Path) -> bool {
    config_candidates(base_dir).iter().any(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::resolve_config_path;
    use std::fs;

    #[test]
    fn prefers_nested_config_dir_when_only_it_exists() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("config")).expect("mkdir");
        fs::write(dir.path().join("config").join("config.toml"), "").expect("write");

        let resolved = resolve_config_path(None, dir.path());
        assert_eq!(resolved, dir.path().join("config").join("config.toml"));
    }

    #[test]
    fn defaults_to_base_dir_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(
            resolve_config_path(None, dir.path()),
            dir.path().join("config.toml")
        );
    }

    #[test]
    fn absolute_argument_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let explicit = dir.path().join("elsewhere.toml");
        assert_eq!(
            resolve_config_path(Some(explicit.to_string_lossy().to_string()), dir.path()),
            explicit
        );
    }
}
