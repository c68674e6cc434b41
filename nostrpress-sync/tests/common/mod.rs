//! Fixtures shared by the engine integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use nostrpress_core::SiteConfig;
use nostrpress_nostr::testing::ScriptedTransport;
use nostrpress_nostr::{nip19, Event, Keys, Tag, UnsignedEvent, KIND_ARTICLE};
use nostrpress_sync::{RunContext, RunOptions};
use tempfile::TempDir;

pub const RELAY_A: &str = "wss://a.example";
pub const RELAY_B: &str = "wss://b.example";

pub fn keys() -> Keys {
    Keys::from_secret_bytes(&[1u8; 32]).expect("keys")
}

pub fn relays() -> Vec<String> {
    vec![RELAY_A.to_owned(), RELAY_B.to_owned()]
}

/// A posts directory inside a fresh temp dir.
pub struct Blog {
    pub tmp: TempDir,
}

impl Blog {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(tmp.path().join("posts")).expect("posts dir");
        Self { tmp }
    }

    pub fn posts(&self) -> PathBuf {
        self.tmp.path().join("posts")
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.posts().join(name);
        std::fs::write(&path, content).expect("write post");
        path
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.posts().join(name)).expect("read post")
    }

    pub fn exists(&self, name: &str) -> bool {
        self.posts().join(name).exists()
    }

    pub fn site(&self) -> SiteConfig {
        SiteConfig {
            name: "blog".into(),
            posts_dir: self.posts(),
            blog_url: None,
            author_id: None,
            relays: relays(),
            published_index: None,
        }
    }

    pub fn context(&self, transport: &Arc<ScriptedTransport>, dry_run: bool) -> RunContext {
        RunContext::new(
            self.site(),
            Some(keys()),
            transport.clone(),
            RunOptions {
                dry_run,
                delay: Duration::ZERO,
                ..RunOptions::default()
            },
        )
    }
}

/// Signed article by [`keys`].
pub fn article(slug: &str, title: &str, created_at: u64) -> Event {
    keys()
        .sign(UnsignedEvent {
            kind: KIND_ARTICLE,
            created_at,
            tags: vec![Tag::new("d", slug), Tag::new("title", title)],
            content: format!("{title} body"),
        })
        .expect("sign")
}

pub fn nevent(id: &str, relays: &[String]) -> String {
    nip19::encode_article(id, relays).expect("encode")
}

pub fn nostr_id_of(content: &str) -> Option<String> {
    content.lines().find_map(|l| {
        l.strip_prefix("nostr_id:")
            .or_else(|| l.strip_prefix("nostr_id ="))
            .map(|v| v.trim().trim_matches('"').to_owned())
    })
}
