use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use nostrpress_nostr::nip19;

const SECRET: &str = "0101010101010101010101010101010101010101010101010101010101010101";
const EVENT_ID: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90";

fn nostrpress_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("nostrpress"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("DRY_RUN")
        .env_remove("NOSTR_PRIVATE_KEY")
        .env_remove("POSTS_DIR")
        .env_remove("RELAY_LIST")
        .env_remove("BLOG_URL")
        .env_remove("AUTHOR_ID")
        .env_remove("PUBLISHED_INDEX");
    cmd
}

fn posts_dir(home: &TempDir) -> std::path::PathBuf {
    let dir = home.path().join("blog").join("posts");
    fs::create_dir_all(&dir).expect("create posts dir");
    dir
}

fn add_site(home: &TempDir, name: &str, relays: &[&str]) {
    let posts = posts_dir(home);
    let mut cmd = nostrpress_cmd(home.path());
    cmd.args(["add-site", name, "--posts-dir"]).arg(&posts);
    for relay in relays {
        cmd.args(["--relay", relay]);
    }
    cmd.assert().success().stdout(contains(format!("Saved site '{name}'")));
}

// ---------------------------------------------------------------------------
// Surface
// ---------------------------------------------------------------------------

#[test]
fn help_lists_every_subcommand() {
    let home = TempDir::new().expect("home");
    let assert = nostrpress_cmd(home.path()).arg("--help").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");

    for name in ["publish", "delete", "delete-all", "update", "sync", "list", "config", "add-site"] {
        assert!(stdout.contains(name), "help output is missing '{name}':\n{stdout}");
    }
}

#[test]
fn site_and_all_are_mutually_exclusive() {
    let home = TempDir::new().expect("home");
    nostrpress_cmd(home.path())
        .args(["publish", "--site", "blog", "--all"])
        .assert()
        .failure()
        .stderr(contains("cannot be used with"));
}

// ---------------------------------------------------------------------------
// config / add-site
// ---------------------------------------------------------------------------

#[test]
fn config_falls_back_to_environment_without_a_config_file() {
    let home = TempDir::new().expect("home");
    let posts = posts_dir(&home);

    nostrpress_cmd(home.path())
        .env("POSTS_DIR", &posts)
        .env("RELAY_LIST", "wss://relay.one, wss://relay.two")
        .arg("config")
        .assert()
        .success()
        .stdout(contains("none (using environment)"))
        .stdout(contains("site 'default'"))
        .stdout(contains("wss://relay.one"))
        .stdout(contains("wss://relay.two"))
        .stdout(contains("not configured"));
}

#[test]
fn config_shows_public_key_but_never_the_secret() {
    let home = TempDir::new().expect("home");
    posts_dir(&home);

    nostrpress_cmd(home.path())
        .env("NOSTR_PRIVATE_KEY", SECRET)
        .arg("config")
        .assert()
        .success()
        .stdout(contains("npub1"))
        .stdout(contains(SECRET).not());
}

#[test]
fn add_site_then_config_resolves_it() {
    let home = TempDir::new().expect("home");
    add_site(&home, "blog", &["wss://relay.blog"]);

    let config = fs::read_to_string(home.path().join(".config/nostrpress/config.yaml"))
        .expect("config written");
    assert!(config.contains("blog"));
    assert!(config.contains("wss://relay.blog"));

    nostrpress_cmd(home.path())
        .args(["config", "--site", "blog"])
        .assert()
        .success()
        .stdout(contains("site 'blog'"))
        .stdout(contains("wss://relay.blog"));
}

#[test]
fn config_all_prints_every_site() {
    let home = TempDir::new().expect("home");
    add_site(&home, "first", &["wss://relay.first"]);
    add_site(&home, "second", &["wss://relay.second"]);

    nostrpress_cmd(home.path())
        .args(["config", "--all"])
        .assert()
        .success()
        .stdout(contains("site 'first'"))
        .stdout(contains("site 'second'"));
}

// ---------------------------------------------------------------------------
// Fatal errors
// ---------------------------------------------------------------------------

#[test]
fn unknown_site_is_fatal() {
    let home = TempDir::new().expect("home");
    add_site(&home, "blog", &["wss://relay.blog"]);

    nostrpress_cmd(home.path())
        .args(["config", "--site", "nope"])
        .assert()
        .code(3)
        .stderr(contains("nope"));
}

#[test]
fn publish_without_a_private_key_is_fatal() {
    let home = TempDir::new().expect("home");
    add_site(&home, "blog", &["wss://relay.blog"]);
    fs::write(
        posts_dir(&home).join("hello.md"),
        "---\ntitle: Hello\n---\nBody\n",
    )
    .expect("write post");

    nostrpress_cmd(home.path())
        .arg("publish")
        .assert()
        .code(3)
        .stderr(contains("NOSTR_PRIVATE_KEY"));
}

#[test]
fn publish_without_relays_is_fatal() {
    let home = TempDir::new().expect("home");
    posts_dir(&home);
    nostrpress_cmd(home.path())
        .env("POSTS_DIR", home.path().join("blog/posts"))
        .env("NOSTR_PRIVATE_KEY", SECRET)
        .arg("publish")
        .assert()
        .code(3);
}

// ---------------------------------------------------------------------------
// Offline runs
// ---------------------------------------------------------------------------

#[test]
fn dry_run_publish_signs_but_writes_nothing() {
    let home = TempDir::new().expect("home");
    add_site(&home, "blog", &["wss://relay.blog"]);
    let post = posts_dir(&home).join("hello.md");
    let original = "---\ntitle: Hello\n---\nBody\n";
    fs::write(&post, original).expect("write post");

    nostrpress_cmd(home.path())
        .env("NOSTR_PRIVATE_KEY", SECRET)
        .args(["publish", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("[dry-run]"))
        .stdout(contains("would publish"));

    assert_eq!(fs::read_to_string(&post).expect("read post"), original);
}

#[test]
fn drafts_only_publish_is_a_success_with_nothing_sent() {
    let home = TempDir::new().expect("home");
    add_site(&home, "blog", &["wss://relay.blog"]);
    fs::write(
        posts_dir(&home).join("wip.md"),
        "---\ntitle: WIP\ndraft: true\n---\nBody\n",
    )
    .expect("write post");

    nostrpress_cmd(home.path())
        .env("NOSTR_PRIVATE_KEY", SECRET)
        .args(["publish", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("0 published, 0 skipped, 1 drafts, 0 failed"));
}

#[test]
fn update_rewrites_relay_hints_without_network() {
    let home = TempDir::new().expect("home");
    add_site(&home, "blog", &["wss://relay.new"]);
    let stale = nip19::encode_article(EVENT_ID, &["wss://relay.old".to_owned()]).expect("encode");
    let fresh = nip19::encode_article(EVENT_ID, &["wss://relay.new".to_owned()]).expect("encode");
    let post = posts_dir(&home).join("hello.md");
    fs::write(
        &post,
        format!("---\ntitle: Hello\nnostr_id: {stale}\n---\nBody\n"),
    )
    .expect("write post");

    nostrpress_cmd(home.path())
        .arg("update")
        .assert()
        .success()
        .stdout(contains("1 updated"));

    let content = fs::read_to_string(&post).expect("read post");
    assert!(content.contains(&fresh), "nostr_id not rewritten:\n{content}");
    assert!(!content.contains(&stale));

    nostrpress_cmd(home.path())
        .arg("update")
        .assert()
        .success()
        .stdout(contains("0 updated, 1 skipped"));
}

#[test]
fn delete_with_nothing_marked_never_prompts() {
    let home = TempDir::new().expect("home");
    add_site(&home, "blog", &["wss://relay.blog"]);
    fs::write(
        posts_dir(&home).join("hello.md"),
        "---\ntitle: Hello\n---\nBody\n",
    )
    .expect("write post");

    let mut cmd = nostrpress_cmd(home.path());
    cmd.env("NOSTR_PRIVATE_KEY", SECRET).arg("delete");
    assert_cmd::Command::from_std(cmd)
        .write_stdin("")
        .assert()
        .success()
        .stdout(contains("nothing to do"))
        .stdout(contains("[y/N]").not());
}

#[test]
fn declining_the_delete_prompt_cancels() {
    let home = TempDir::new().expect("home");
    add_site(&home, "blog", &["wss://relay.blog"]);
    let nostr_id = nip19::encode_article(EVENT_ID, &["wss://relay.blog".to_owned()]).expect("encode");
    let post = posts_dir(&home).join("gone.md");
    fs::write(
        &post,
        format!("---\ntitle: Gone\ndelete: true\nnostr_id: {nostr_id}\n---\nBody\n"),
    )
    .expect("write post");

    let mut cmd = nostrpress_cmd(home.path());
    cmd.env("NOSTR_PRIVATE_KEY", SECRET).arg("delete");
    assert_cmd::Command::from_std(cmd)
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(contains("[y/N]"))
        .stdout(contains("Cancelled."));

    assert!(post.exists());
}
