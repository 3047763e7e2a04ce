//! Command stream tests against a real database.

use super::helpers::TemporaryDatabase;
use rota::dispatch::adapters::postgres::PostgresCommandStream;
use rota::dispatch::domain::Channel;
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::Bool;
use rota::dispatch::ports::CommandStream;
use std::collections::BTreeMap;
use std::time::Duration;

fn folder(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("folder".to_owned(), name.to_owned())])
}

#[tokio::test(flavor = "multi_thread")]
async fn entries_are_delivered_once_and_acked() -> Result<(), eyre::Report> {
    let Some(db) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let stream = PostgresCommandStream::new(db.pool()?).with_poll_interval(Duration::from_millis(20));
    stream.add("ops", Channel::Read, folder("before")).await?;
    stream.ensure_groups().await?;
    let id = stream.add("ops", Channel::Read, folder("after")).await?;

    let entry = stream.read("w1").await?;
    eyre::ensure!(entry.id == id, "entries added before the group are skipped");
    eyre::ensure!(entry.fields.get("folder").map(String::as_str) == Some("after"), "fields kept");

    eyre::ensure!(stream.ack(Channel::Read, &[id]).await? == 1, "one ack");
    eyre::ensure!(stream.ack(Channel::Read, &[id]).await? == 0, "ack is idempotent");
    eyre::ensure!(stream.ack(Channel::Resend, &[id]).await? == 0, "ack is per channel");

    let mut conn = db.pool()?.get()?;
    let stamped_by_database: bool = diesel::select(sql::<Bool>(
        "EXISTS (SELECT 1 FROM stream_deliveries \
         WHERE acked_at IS NOT NULL AND acked_at >= delivered_at AND acked_at <= NOW())",
    ))
    .get_result(&mut conn)?;
    eyre::ensure!(stamped_by_database, "ack time comes from the database clock");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_readers_never_share_an_entry() -> Result<(), eyre::Report> {
    let Some(db) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let stream = PostgresCommandStream::new(db.pool()?).with_poll_interval(Duration::from_millis(20));
    stream.ensure_groups().await?;
    stream.add("ops", Channel::Read, folder("one")).await?;
    stream.add("ops", Channel::Read, folder("two")).await?;

    let (first, second) = tokio::join!(stream.read("w1"), stream.read("w2"));
    eyre::ensure!(first?.id != second?.id, "each entry claimed once");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn trim_keeps_the_newest_entries() -> Result<(), eyre::Report> {
    let Some(db) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let stream = PostgresCommandStream::new(db.pool()?);
    stream.ensure_groups().await?;
    for n in 0..5 {
        stream.add("ops", Channel::Read, folder(&format!("m{n}"))).await?;
    }
    stream.add("ops", Channel::Resend, BTreeMap::new()).await?;

    eyre::ensure!(stream.trim(2).await? == 3, "three read entries removed");
    Ok(())
}
