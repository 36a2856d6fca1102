// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("subject not found: {}", path.display())]
    SubjectNotFound { path: PathBuf },

    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("malformed data in {}: {context}", path.display())]
    MalformedData { path: PathBuf, context: String },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid subject: {context}")]
    InvalidSubject { context: String },
}

/// Copyable tag for an [`Error`], used to de-duplicate diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SubjectNotFound,
    PermissionDenied,
    MalformedData,
    Io,
    InvalidSubject,
}

impl Error {
    /// Classifies an I/O error raised while accessing `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => Error::SubjectNotFound { path },
            io::ErrorKind::PermissionDenied => Error::PermissionDenied { path },
            _ => Error::Io { path, source: err },
        }
    }

    pub fn malformed(path: &Path, context: impl Into<String>) -> Self {
        Error::MalformedData {
            path: path.to_path_buf(),
            context: context.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SubjectNotFound { .. } => ErrorKind::SubjectNotFound,
            Error::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Error::MalformedData { .. } => ErrorKind::MalformedData,
            Error::Io { .. } => ErrorKind::Io,
            Error::InvalidSubject { .. } => ErrorKind::InvalidSubject,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::SubjectNotFound
    }
}
