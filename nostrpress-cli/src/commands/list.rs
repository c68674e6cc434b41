//! `nostrpress list`: own articles as the relays see them.

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use nostrpress_core::config::Env;
use nostrpress_nostr::{nip19, RemoteEvent};
use nostrpress_sync::{pipeline, ExitSignal};

use super::{home, relay_pool, GlobalArgs};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ArticleJson {
    site: String,
    slug: Option<String>,
    title: Option<String>,
    created_at: u64,
    id: String,
    nostr_id: Option<String>,
    seen_on: Vec<String>,
}

#[derive(Tabled)]
struct ArticleRow {
    #[tabled(rename = "date")]
    date: String,
    #[tabled(rename = "slug")]
    slug: String,
    #[tabled(rename = "title")]
    title: String,
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "relays")]
    relays: usize,
}

impl ListArgs {
    pub async fn run(self, global: &GlobalArgs) -> Result<ExitSignal> {
        let home = home()?;
        let env = Env::from_process();
        let listings = pipeline::list_at(&home, &env, &global.scope(), relay_pool)
            .await
            .context("list failed")?;

        if self.json {
            let payload: Vec<ArticleJson> = listings
                .iter()
                .flat_map(|(site, articles)| articles.iter().map(move |a| to_json(site, a)))
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize list JSON")?
            );
            return Ok(ExitSignal::Success);
        }

        for (site, articles) in listings {
            println!("site '{site}': {} article(s)", articles.len());
            if articles.is_empty() {
                continue;
            }
            let rows: Vec<ArticleRow> = articles.iter().map(to_row).collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        Ok(ExitSignal::Success)
    }
}

fn to_row(remote: &RemoteEvent) -> ArticleRow {
    let event = &remote.event;
    ArticleRow {
        date: format_date(event.created_at),
        slug: event.tag_value("d").unwrap_or("-").to_owned(),
        title: event.tag_value("title").unwrap_or("-").to_owned(),
        id: event.id.chars().take(12).collect(),
        relays: remote.seen_on.len(),
    }
}

fn to_json(site: &str, remote: &RemoteEvent) -> ArticleJson {
    let event = &remote.event;
    ArticleJson {
        site: site.to_owned(),
        slug: event.tag_value("d").map(str::to_owned),
        title: event.tag_value("title").map(str::to_owned),
        created_at: event.created_at,
        id: event.id.clone(),
        nostr_id: nip19::encode_article(&event.id, &remote.seen_on).ok(),
        seen_on: remote.seen_on.clone(),
    }
}

fn format_date(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|ts| Local.timestamp_opt(ts, 0).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
