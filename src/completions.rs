use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap_complete::{generate, Shell};

use crate::app::AppError;

const BIN_NAME: &str = "dayboard";

pub fn generate_completions(shell: Shell, buf: &mut dyn Write) {
    let mut cmd = crate::cli::styled_command();
    generate(shell, &mut cmd, BIN_NAME, buf);
}

fn parse_shell(raw: &str) -> Option<Shell> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "bash" => Some(Shell::Bash),
        "zsh" => Some(Shell::Zsh),
        "fish" => Some(Shell::Fish),
        "elvish" => Some(Shell::Elvish),
        "powershell" | "pwsh" => Some(Shell::PowerShell),
        _ => None,
    }
}

fn shell_from_path(shell_var: &str) -> Option<Shell> {
    parse_shell(shell_var.rsplit('/').next()?)
}

fn install_path(shell: Shell, home: &Path) -> Option<PathBuf> {
    match shell {
        Shell::Bash => Some(home.join(".local/share/bash-completion/completions").join(BIN_NAME)),
        Shell::Zsh => Some(home.join(".config/dayboard/completions/dayboard.zsh")),
        Shell::Fish => Some(home.join(".config/fish/completions/dayboard.fish")),
        _ => None,
    }
}

fn install_into(shell: Shell, home: &Path) -> io::Result<PathBuf> {
    let path = install_path(shell, home).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::Unsupported,
            format!("no install path for {shell:?}"),
        )
    })?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut buf = Vec::new();
    generate_completions(shell, &mut buf);
    std::fs::write(&path, buf)?;

    if shell == Shell::Zsh {
        source_from_zshrc(home, &path)?;
    }
    Ok(path)
}

/// Appends a `source` line to `~/.zshrc` unless one is already there.
fn source_from_zshrc(home: &Path, completions: &Path) -> io::Result<()> {
    let zshrc = home.join(".zshrc");
    let source_line = format!("source \"{}\"", completions.display());
    match std::fs::read_to_string(&zshrc) {
        Ok(content) if content.contains(&source_line) => return Ok(()),
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&zshrc)?;
    writeln!(file)?;
    writeln!(file, "# dayboard shell completions")?;
    writeln!(file, "{source_line}")?;
    Ok(())
}

pub fn run_completions_command(shell_arg: Option<&str>, install: bool) -> Result<(), AppError> {
    let shell = match shell_arg {
        Some(name) => parse_shell(name)
            .ok_or_else(|| AppError::InvalidArgument(format!("unknown shell '{name}'")))?,
        None => std::env::var("SHELL")
            .ok()
            .and_then(|value| shell_from_path(&value))
            .ok_or_else(|| {
                AppError::InvalidArgument(
                    "unable to detect shell from $SHELL; pass a shell name".to_string(),
                )
            })?,
    };

    if install {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| AppError::InvalidArgument("HOME is not set".to_string()))?;
        let path = install_into(shell, &home)?;
        println!("completions installed to {}", path.display());
    } else {
        let mut stdout = io::stdout().lock();
        generate_completions(shell, &mut stdout);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{generate_completions, install_into, install_path, parse_shell, shell_from_path};
    use clap_complete::Shell;
    use std::path::PathBuf;

    #[test]
    fn shells_parse_from_names_and_paths() {
        assert_eq!(parse_shell("BASH"), Some(Shell::Bash));
        assert_eq!(parse_shell("pwsh"), Some(Shell::PowerShell));
        assert_eq!(parse_shell("csh"), None);
        assert_eq!(shell_from_path("/usr/bin/zsh"), Some(Shell::Zsh));
        assert_eq!(shell_from_path("/usr/local/bin/fish"), Some(Shell::Fish));
    }

    #[test]
    fn generated_script_names_the_binary() {
        let mut buf = Vec::new();
        generate_completions(Shell::Bash, &mut buf);
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("dayboard"));
        assert!(text.contains("punt-day"));
    }

    #[test]
    fn install_paths_exist_only_for_common_shells() {
        let home = PathBuf::from("/tmp/home");
        assert!(install_path(Shell::Zsh, &home)
            .expect("zsh path")
            .ends_with("dayboard.zsh"));
        assert!(install_path(Shell::Elvish, &home).is_none());
    }

    #[test]
    fn zsh_install_sources_completions_once() {
        let home =
            std::env::temp_dir().join(format!("dayboard-completions-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&home).expect("temp home should be creatable");

        let path = install_into(Shell::Zsh, &home).expect("zsh install should succeed");
        assert!(path.exists());
        install_into(Shell::Zsh, &home).expect("second install should succeed");

        let zshrc = std::fs::read_to_string(home.join(".zshrc")).expect(".zshrc should exist");
        assert_eq!(zshrc.matches("source").count(), 1);
        assert!(install_into(Shell::Elvish, &home).is_err());
        let _ = std::fs::remove_dir_all(home);
    }
}
