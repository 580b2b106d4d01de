// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::config::{ConfigTree, merge};
use log::debug;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_SOURCE: &str = "/etc/datadog-agent/processes.d";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("config source '{}' not found", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("failed to parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        error: serde_yaml::Error,
    },
}

/// Resolve a source identifier into a configuration tree.
///
/// A file is parsed as a single tree. A directory contributes every `*.yaml`
/// and `*.yml` file in it, in file name order; later files override whole
/// applications from earlier ones.
pub fn load_source(source: &Path) -> Result<ConfigTree, LoadError> {
    if !source.exists() {
        return Err(LoadError::NotFound {
            path: source.to_path_buf(),
        });
    }
    if source.is_dir() {
        load_dir(source)
    } else {
        parse_file(source)
    }
}

fn load_dir(dir: &Path) -> Result<ConfigTree, LoadError> {
    let read_err = |error| LoadError::Read {
        path: dir.to_path_buf(),
        error,
    };

    let mut yaml_files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if is_yaml && path.is_file() {
            yaml_files.push(path);
        } else {
            debug!("skipping non-YAML entry: {}", path.display());
        }
    }
    yaml_files.sort();

    let mut tree = ConfigTree::new();
    for path in yaml_files {
        let parsed = parse_file(&path)?;
        debug!(
            "loaded {} application(s) from {}",
            parsed.len(),
            path.display()
        );
        tree = merge(&tree, parsed);
    }
    Ok(tree)
}

fn parse_file(path: &Path) -> Result<ConfigTree, LoadError> {
    let contents = std::fs::read_to_string(path).map_err(|error| LoadError::Read {
        path: path.to_path_buf(),
        error,
    })?;
    if contents.trim().is_empty() {
        return Ok(ConfigTree::new());
    }
    serde_yaml::from_str(&contents).map_err(|error| LoadError::Parse {
        path: path.to_path_buf(),
        error,
    })
}
