//! Error taxonomy for the build pipeline.
//!
//! Every variant carries enough location information (file, line, block
//! name) to find the cause without a debugger. The binary wraps these in
//! `anyhow` and exits non-zero.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Missing or malformed content sources.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{}: required file is missing", .path.display())]
    Missing { path: PathBuf },

    #[error("{}: cannot read file", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{line}:{column}: invalid JSON: {message}", .path.display())]
    Json {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("{}: line {line}: {message}", .path.display())]
    Row {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("{}: missing required column `{column}`", .path.display())]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("{}: line {line}: duplicate slug `{slug}` (first defined on line {first_line})", .path.display())]
    DuplicateSlug {
        path: PathBuf,
        slug: String,
        line: u64,
        first_line: u64,
    },

    #[error("{}: duplicate post slug `{slug}` (also produced by {})", .path.display(), .other.display())]
    DuplicatePost {
        path: PathBuf,
        other: PathBuf,
        slug: String,
    },
}

/// Failures while turning loaded content into documents.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("page `{page}` references unknown block `{block}`")]
    MissingBlock { page: String, block: String },

    #[error("{}: cannot read template", .path.display())]
    TemplateRead {
        path: std::path::PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("template `{template}` failed")]
    Template {
        template: String,
        #[source]
        source: tera::Error,
    },

    #[error("{}: produced by both {first} and {second}", .path.display())]
    PathCollision { path: PathBuf, first: String, second: String },

    #[error("search index: {0}")]
    SearchIndex(#[from] serde_json::Error),
}

/// Filesystem failures while producing the output tree.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("{}: cannot create staging directory", .parent.display())]
    Staging {
        parent: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: write failed", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: cannot swap new output into place (previous output {})", .output.display(), restored_note(.restored))]
    Swap {
        output: PathBuf,
        restored: bool,
        #[source]
        source: io::Error,
    },
}

fn restored_note(restored: &bool) -> &'static str {
    if *restored { "restored" } else { "NOT restored" }
}

impl WriteError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        WriteError::Io { path: path.into(), source }
    }
}

/// Failures that stop `alisite check` itself. Broken links are findings,
/// not errors.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("{}: output directory is missing, run `alisite build` first", .path.display())]
    OutputMissing { path: PathBuf },

    #[error("{}: cannot read", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot start link checker")]
    Client(#[from] reqwest::Error),

    #[error("cannot start worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Failures of `alisite deploy`.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("no remote path configured (set `deploy.remote_dir` in alisite.toml)")]
    NoRemote,

    #[error("{}: local output is missing, run `alisite build` first", .path.display())]
    LocalOutputMissing { path: PathBuf },

    #[error("{}: remote path is missing or not a directory", .path.display())]
    RemoteMissing { path: PathBuf },

    #[error("{}: refusing to deploy: {reason}", .path.display())]
    RemoteUnexpected { path: PathBuf, reason: &'static str },

    #[error("{}: quarantine failed, remote output left in place", .path.display())]
    Quarantine {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "mirroring into {} failed after quarantine: there is NO live output. \
         Manual intervention required; the previous output is in {}",
        .remote.display(),
        .quarantine.display()
    )]
    Mirror {
        remote: PathBuf,
        quarantine: PathBuf,
        #[source]
        source: io::Error,
    },
}
