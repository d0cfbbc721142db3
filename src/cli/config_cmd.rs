// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! `config view|set|reset` on the kubeconfig extension

use anyhow::{Context, Result};

use super::ConfigCommand;
use resultsctl::config::{EXTENSION_NAME, KubeconfigFile};

/// Run a config subcommand, returning the message to print
pub fn run(file: &mut KubeconfigFile, context: &str, command: &ConfigCommand) -> Result<String> {
    match command {
        ConfigCommand::View => match file.extension(context)? {
            Some(ext) => serde_yaml::to_string(&ext)
                .map(|s| s.trim_end().to_string())
                .context("Failed to serialize results configuration"),
            None => Ok(format!("No results configuration for context '{}'", context)),
        },
        ConfigCommand::Set { assignments } => {
            let mut ext = file.extension(context)?.unwrap_or_default();
            ext.apply(assignments)?;
            file.set_extension(context, &ext)?;
            file.save()?;
            Ok(format!(
                "Updated {} configuration for context '{}'",
                EXTENSION_NAME, context
            ))
        }
        ConfigCommand::Reset => {
            if file.remove_extension(context)? {
                file.save()?;
                Ok(format!(
                    "Removed {} configuration from context '{}'",
                    EXTENSION_NAME, context
                ))
            } else {
                Ok(format!("No results configuration for context '{}'", context))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
current-context: dev
contexts:
- name: dev
  context:
    cluster: dev
    user: dev
"#;

    fn load(dir: &TempDir) -> KubeconfigFile {
        let path = dir.path().join("config");
        if !path.exists() {
            fs::write(&path, KUBECONFIG).unwrap();
        }
        KubeconfigFile::load(&path).unwrap()
    }

    #[test]
    fn test_view_without_extension() {
        let dir = TempDir::new().unwrap();
        let mut file = load(&dir);
        let out = run(&mut file, "dev", &ConfigCommand::View).unwrap();
        assert_eq!(out, "No results configuration for context 'dev'");
    }

    #[test]
    fn test_set_then_view_then_reset() {
        let dir = TempDir::new().unwrap();
        let mut file = load(&dir);
        let set = ConfigCommand::Set {
            assignments: vec![
                "host=https://results.example.com".to_string(),
                "client-type=GRPC".to_string(),
            ],
        };
        run(&mut file, "dev", &set).unwrap();

        let mut reloaded = load(&dir);
        let view = run(&mut reloaded, "dev", &ConfigCommand::View).unwrap();
        assert!(view.contains("host: https://results.example.com"));
        assert!(view.contains("client-type: GRPC"));

        let out = run(&mut reloaded, "dev", &ConfigCommand::Reset).unwrap();
        assert!(out.starts_with("Removed tekton-results"));
        let mut after = load(&dir);
        let view = run(&mut after, "dev", &ConfigCommand::View).unwrap();
        assert_eq!(view, "No results configuration for context 'dev'");
    }

    #[test]
    fn test_invalid_set_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let mut file = load(&dir);
        let set = ConfigCommand::Set {
            assignments: vec!["timeout=whenever".to_string()],
        };
        assert!(run(&mut file, "dev", &set).is_err());
        let raw = fs::read_to_string(dir.path().join("config")).unwrap();
        assert_eq!(raw, KUBECONFIG);
    }
}
