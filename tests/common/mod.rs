//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Answers enrichment prompts for "Pasta House"; anything else gets prose.
const MOCK_LM: &str = r#"#!/bin/sh
prompt=$(cat)
case "$prompt" in
  *"Restaurant name: Pasta House"*)
    printf '```json\n{"name": "Pasta House", "rating": 4.6, "category": "Italian", "phone": null}\n```\n'
    ;;
  *"Restaurant name: Kim's BBQ"*)
    printf '{"name": "Kim'"'"'s BBQ", "rating": 9.5}\n'
    ;;
  *)
    echo "Sorry, I could not find that restaurant."
    ;;
esac
"#;

/// Temp directory with a config file and a mock LM command.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let workspace = Self { dir };
        workspace.write("mock-lm.sh", MOCK_LM);
        workspace.write(
            "config.json",
            r#"{"schema_version": 1, "provider": "command", "delay_ms": 0}"#,
        );
        workspace
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, contents).expect("write fixture file");
        path
    }

    pub fn read_json(&self, name: &str) -> serde_json::Value {
        let text = fs::read_to_string(self.path(name)).expect("read json file");
        serde_json::from_str(&text).expect("parse json file")
    }

    pub fn lm_command(&self) -> String {
        format!("sh '{}'", self.path("mock-lm.sh").display())
    }

    /// Run the binary inside the workspace with provider secrets removed.
    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_matjip"))
            .args(args)
            .current_dir(self.root())
            .env_remove("GEMINI_API_KEY")
            .env_remove("OPENAI_API_KEY")
            .env_remove("MATJIP_LM_COMMAND")
            .env_remove("MATJIP_FETCH_COMMAND")
            .env_remove("RUST_LOG")
            .output()
            .expect("run matjip")
    }

    /// Run an LM-backed subcommand against the mock command and config.
    pub fn run_with_mock(&self, args: &[&str]) -> Output {
        let lm_command = self.lm_command();
        let config = self.path("config.json");
        let config = config.to_str().expect("utf-8 temp path");
        let mut full: Vec<&str> = args.to_vec();
        full.extend(["--config", config, "--lm-command", lm_command.as_str()]);
        self.run(&full)
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

pub const TWO_RESTAURANTS: &str = r#"{
  "last_updated": "2024-01-01",
  "seoul": {
    "campus": "서울캠퍼스",
    "restaurant_count": 7,
    "restaurants": [
      {"name": "Pasta House", "phone": "02-000-0000"},
      {"name": "Kim's BBQ", "rating": 3.9}
    ]
  }
}"#;
