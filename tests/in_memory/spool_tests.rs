//! Spool directory adapter tests.

use super::helpers::{codes, start_time};
use camino::Utf8PathBuf;
use chrono::Duration;
use rota::dispatch::adapters::spool::{SpoolDocumentReader, SpoolMailSource};
use rota::dispatch::domain::{InboundMail, MailOperation, ReceiveKeywords, SubmissionDocument};
use rota::dispatch::ports::{CollaboratorError, DocumentReader, MailSource};
use rota::review::domain::Pages;
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Spool {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Spool {
    fn drop_message(&self, folder: &str, subject: &str, minutes: i64) -> Result<(), eyre::Report> {
        let path = self.root.join(folder);
        std::fs::create_dir_all(&path)?;
        let mail = InboundMail {
            folder: String::new(),
            operation: MailOperation::Submit,
            from: "zoe@example.com".to_owned(),
            subject: subject.to_owned(),
            body: "urgent: no".to_owned(),
            received_at: start_time() + Duration::minutes(minutes),
        };
        std::fs::write(path.join("message.json"), serde_json::to_string(&mail)?)?;
        let document = SubmissionDocument {
            codes: codes(&["A1", "B2"]),
            company: "Acme".to_owned(),
            pages: Pages::new(12)?,
        };
        std::fs::write(path.join("document.json"), serde_json::to_string(&document)?)?;
        Ok(())
    }
}

#[fixture]
fn spool() -> Spool {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
    Spool { _dir: dir, root }
}

#[rstest]
#[tokio::test]
async fn receive_hands_out_each_message_once(spool: Spool) -> Result<(), eyre::Report> {
    spool.drop_message("later", "Submit B", 5)?;
    spool.drop_message("earlier", "submit A", 1)?;
    spool.drop_message("other", "Holiday photos", 0)?;
    let source = SpoolMailSource::new(spool.root.clone());

    let first = source.receive(&ReceiveKeywords::default()).await?;
    let folders: Vec<&str> = first.iter().map(|mail| mail.folder.as_str()).collect();
    eyre::ensure!(folders == ["earlier", "later"], "unexpected batch {folders:?}");

    let second = source.receive(&ReceiveKeywords::default()).await?;
    eyre::ensure!(second.is_empty(), "messages handed out twice");
    Ok(())
}

#[rstest]
#[tokio::test]
async fn read_loads_a_folder_even_after_receive(spool: Spool) -> Result<(), eyre::Report> {
    spool.drop_message("m1", "Submit", 0)?;
    let source = SpoolMailSource::new(spool.root.clone());
    source.receive(&ReceiveKeywords::default()).await?;

    let mail = source.read("m1").await?;
    eyre::ensure!(mail.folder == "m1", "folder taken from directory name");
    eyre::ensure!(mail.body == "urgent: no", "body preserved");
    Ok(())
}

#[rstest]
#[tokio::test]
async fn read_of_missing_folder_is_a_mail_error(spool: Spool) -> Result<(), eyre::Report> {
    let source = SpoolMailSource::new(spool.root.clone());
    let outcome = source.read("absent").await;
    eyre::ensure!(
        matches!(outcome, Err(CollaboratorError::Mail(_))),
        "expected mail error, got {outcome:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test]
async fn document_reader_parses_submission_and_finish(spool: Spool) -> Result<(), eyre::Report> {
    spool.drop_message("m1", "Submit", 0)?;
    let mail = SpoolMailSource::new(spool.root.clone()).read("m1").await?;
    let reader = SpoolDocumentReader::new(spool.root.clone());

    let submission = reader.read_submission(&mail).await?;
    eyre::ensure!(submission.company == "Acme", "company parsed");
    eyre::ensure!(submission.pages == Pages::new(12)?, "pages parsed");
    let finished = reader.read_finish(&mail).await?;
    eyre::ensure!(finished == codes(&["A1", "B2"]), "codes parsed");
    Ok(())
}
