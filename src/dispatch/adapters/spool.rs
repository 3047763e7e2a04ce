//! Mail and document adapters over a spool directory.
//!
//! A mail fetcher drops every message into its own folder:
//!
//! ```text
//! <spool>/<folder>/message.json   InboundMail without the folder field
//! <spool>/<folder>/document.json  codes, company and page count
//! <spool>/<folder>/.received      written once `receive` has handed it out
//! ```

use crate::dispatch::domain::{InboundMail, MailOperation, ReceiveKeywords, SubmissionDocument};
use crate::dispatch::ports::{CollaboratorError, CollaboratorResult, DocumentReader, MailSource};
use crate::review::domain::ProjectCodes;
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::Deserialize;
use serde::de::DeserializeOwned;

const MESSAGE_FILE: &str = "message.json";
const DOCUMENT_FILE: &str = "document.json";
const RECEIVED_MARKER: &str = ".received";

fn open_spool(root: &Utf8Path) -> std::io::Result<Dir> {
    Dir::open_ambient_dir(root, ambient_authority())
}

fn load_message(spool: &Dir, folder: &str) -> std::io::Result<InboundMail> {
    let raw = spool.open_dir(folder)?.read_to_string(MESSAGE_FILE)?;
    let mut mail: InboundMail = serde_json::from_str(&raw).map_err(std::io::Error::other)?;
    folder.clone_into(&mut mail.folder);
    Ok(mail)
}

fn subject_matches(mail: &InboundMail, keywords: &ReceiveKeywords) -> bool {
    let keyword = match mail.operation {
        MailOperation::Submit => &keywords.submit,
        MailOperation::Finish => &keywords.finish,
    };
    mail.subject.to_lowercase().contains(&keyword.to_lowercase())
}

fn receive_from(root: &Utf8Path, keywords: &ReceiveKeywords) -> std::io::Result<Vec<InboundMail>> {
    let spool = open_spool(root)?;
    let mut received = Vec::new();
    for item in spool.entries()? {
        let entry = item?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let folder = entry.file_name()?;
        let dir = spool.open_dir(&folder)?;
        if dir.exists(RECEIVED_MARKER) || !dir.exists(MESSAGE_FILE) {
            continue;
        }
        let mail = load_message(&spool, &folder)?;
        if subject_matches(&mail, keywords) {
            dir.write(RECEIVED_MARKER, b"")?;
            received.push(mail);
        }
    }
    received.sort_by_key(|mail| mail.received_at);
    Ok(received)
}

/// Reads already downloaded messages from a spool directory.
#[derive(Debug, Clone)]
pub struct SpoolMailSource {
    root: Utf8PathBuf,
}

impl SpoolMailSource {
    /// Creates a source over the spool at `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl MailSource for SpoolMailSource {
    async fn receive(&self, keywords: &ReceiveKeywords) -> CollaboratorResult<Vec<InboundMail>> {
        let root = self.root.clone();
        let wanted = keywords.clone();
        tokio::task::spawn_blocking(move || receive_from(&root, &wanted))
            .await
            .map_err(|err| CollaboratorError::Mail(err.to_string()))?
            .map_err(|err| CollaboratorError::Mail(err.to_string()))
    }

    async fn read(&self, folder: &str) -> CollaboratorResult<InboundMail> {
        let root = self.root.clone();
        let name = folder.to_owned();
        tokio::task::spawn_blocking(move || load_message(&open_spool(&root)?, &name))
            .await
            .map_err(|err| CollaboratorError::Mail(err.to_string()))?
            .map_err(|err| CollaboratorError::Mail(format!("{folder}: {err}")))
    }
}

#[derive(Debug, Deserialize)]
struct FinishDocument {
    codes: ProjectCodes,
}

/// Reads report facts from `document.json` next to each message.
#[derive(Debug, Clone)]
pub struct SpoolDocumentReader {
    root: Utf8PathBuf,
}

impl SpoolDocumentReader {
    /// Creates a reader over the spool at `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn load<T>(&self, mail: &InboundMail) -> CollaboratorResult<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let root = self.root.clone();
        let folder = mail.folder.clone();
        let raw = tokio::task::spawn_blocking(move || {
            open_spool(&root)?
                .open_dir(&folder)?
                .read_to_string(DOCUMENT_FILE)
        })
        .await
        .map_err(|err| CollaboratorError::Document(err.to_string()))?
        .map_err(|err| CollaboratorError::Document(format!("{}: {err}", mail.folder)))?;
        serde_json::from_str(&raw)
            .map_err(|err| CollaboratorError::Document(format!("{}: {err}", mail.folder)))
    }
}

#[async_trait]
impl DocumentReader for SpoolDocumentReader {
    async fn read_submission(&self, mail: &InboundMail) -> CollaboratorResult<SubmissionDocument> {
        self.load(mail).await
    }

    async fn read_finish(&self, mail: &InboundMail) -> CollaboratorResult<ProjectCodes> {
        Ok(self.load::<FinishDocument>(mail).await?.codes)
    }
}
