//! Interactive console host.
//!
//! A small in-process stand-in for a real game server, used to exercise the
//! party system end to end from a terminal. Players are simulated with
//! `join`/`quit` lines; everything a player "says" is either dispatched as a
//! command or routed as a chat post.

use crate::commands::{CommandDispatcher, Dispatch};
use async_trait::async_trait;
use dashmap::DashMap;
use party_system::{
    Capability, ChatSink, HostServices, MuteProvider, PartySystem, PermissionProvider,
    PlayerId, PresenceProvider,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

struct Record {
    name: String,
    online: bool,
    admin: bool,
    muted: bool,
}

/// Presence, permissions, mutes and delivery for the console world.
///
/// Every known player holds the user, leader and NSFW capabilities; the
/// admin capability is granted per player at join time.
#[derive(Default)]
pub struct ConsoleHost {
    by_name: DashMap<String, PlayerId>,
    records: DashMap<PlayerId, Record>,
}

impl ConsoleHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Connects a player, creating them on first sight.
    pub fn connect(&self, name: &str, admin: bool) -> PlayerId {
        let key = name.to_lowercase();
        let id = *self
            .by_name
            .entry(key)
            .or_insert_with(PlayerId::new)
            .value();
        let mut record = self.records.entry(id).or_insert_with(|| Record {
            name: name.to_string(),
            online: false,
            admin: false,
            muted: false,
        });
        record.online = true;
        record.admin = record.admin || admin;
        id
    }

    pub fn disconnect(&self, name: &str) -> Option<PlayerId> {
        let id = self.lookup(name)?;
        self.records.get_mut(&id)?.online = false;
        Some(id)
    }

    pub fn lookup(&self, name: &str) -> Option<PlayerId> {
        self.by_name.get(&name.to_lowercase()).map(|e| *e.value())
    }

    pub fn set_muted(&self, name: &str, muted: bool) -> bool {
        match self.lookup(name).and_then(|id| self.records.get_mut(&id)) {
            Some(mut record) => {
                record.muted = muted;
                true
            }
            None => false,
        }
    }

    pub fn services(self: &Arc<Self>, templates: Arc<dyn party_system::TemplateProvider>) -> HostServices {
        HostServices {
            presence: self.clone(),
            permissions: self.clone(),
            mutes: self.clone(),
            templates,
            sink: self.clone(),
        }
    }
}

#[async_trait]
impl PresenceProvider for ConsoleHost {
    async fn is_online(&self, player: PlayerId) -> bool {
        self.records.get(&player).map(|r| r.online).unwrap_or(false)
    }

    async fn online_players(&self) -> Vec<PlayerId> {
        self.records
            .iter()
            .filter(|e| e.value().online)
            .map(|e| *e.key())
            .collect()
    }

    async fn display_name(&self, player: PlayerId) -> Option<String> {
        self.records.get(&player).map(|r| r.name.clone())
    }

    async fn find_by_name(&self, name: &str) -> Option<PlayerId> {
        let id = self.lookup(name)?;
        if self.records.get(&id).map(|r| r.online).unwrap_or(false) {
            Some(id)
        } else {
            None
        }
    }

    async fn is_known(&self, player: PlayerId) -> bool {
        self.records.contains_key(&player)
    }
}

#[async_trait]
impl PermissionProvider for ConsoleHost {
    async fn has_capability(&self, player: PlayerId, capability: Capability) -> bool {
        match self.records.get(&player) {
            Some(record) => match capability {
                Capability::User | Capability::Leader | Capability::Nsfw => true,
                Capability::Admin => record.admin,
            },
            None => false,
        }
    }
}

#[async_trait]
impl MuteProvider for ConsoleHost {
    async fn is_muted(&self, player: PlayerId) -> bool {
        self.records.get(&player).map(|r| r.muted).unwrap_or(false)
    }
}

#[async_trait]
impl ChatSink for ConsoleHost {
    async fn send(&self, player: PlayerId, text: &str) {
        let name = self
            .records
            .get(&player)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| player.to_string());
        println!("-> {name}: {text}");
    }
}

const HELP: &str = "\
console commands:
  join <name> [admin]   connect a player
  quit <name>           disconnect a player
  mute <name>           mute a player
  unmute <name>         unmute a player
  save                  write the state file
  exit                  save and leave
  <name>: <text>        the player talks; /commands work here";

/// Reads console lines until `exit` or end of input.
pub async fn run(
    system: Arc<PartySystem>,
    dispatcher: CommandDispatcher,
    host: Arc<ConsoleHost>,
) -> anyhow::Result<()> {
    println!("{HELP}");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some((speaker, text)) = line.split_once(':') {
            let speaker = speaker.trim();
            let text = text.trim();
            let Some(player) = host.lookup(speaker) else {
                println!("unknown player '{speaker}', use: join {speaker}");
                continue;
            };
            post_line(&system, &dispatcher, &host, player, text).await;
            continue;
        }

        let mut words = line.split_whitespace();
        match words.next() {
            Some("help") => println!("{HELP}"),
            Some("join") => {
                let Some(name) = words.next() else {
                    println!("usage: join <name> [admin]");
                    continue;
                };
                let admin = words.next() == Some("admin");
                let player = host.connect(name, admin);
                system.player_connected(player).await;
                println!("{name} is online{}", if admin { " (admin)" } else { "" });
            }
            Some("quit") => {
                let Some(name) = words.next() else {
                    println!("usage: quit <name>");
                    continue;
                };
                match host.disconnect(name) {
                    Some(player) => {
                        system.player_disconnected(player).await;
                        println!("{name} is offline");
                    }
                    None => println!("unknown player '{name}'"),
                }
            }
            Some("mute") | Some("unmute") => {
                let muted = line.starts_with("mute");
                match words.next() {
                    Some(name) if host.set_muted(name, muted) => {
                        println!("{name} is {}", if muted { "muted" } else { "unmuted" });
                    }
                    _ => println!("usage: mute <name> | unmute <name>"),
                }
            }
            Some("save") => match system.save().await {
                Ok(()) => println!("state saved"),
                Err(e) => error!("save failed: {e:#}"),
            },
            Some("exit") => break,
            _ => println!("unrecognized input, try: help"),
        }
    }

    system.save().await?;
    Ok(())
}

async fn post_line(
    system: &Arc<PartySystem>,
    dispatcher: &CommandDispatcher,
    host: &Arc<ConsoleHost>,
    player: PlayerId,
    text: &str,
) {
    let message = match dispatcher.dispatch(player, text).await {
        Dispatch::Handled => return,
        Dispatch::Repost(message) => message,
        Dispatch::NotACommand => text.to_string(),
    };

    let recipients = host.online_players().await;
    let outcome = system.router().route_chat(player, &message, &recipients).await;

    if let party_system::RouteOutcome::Global { recipients } = outcome {
        let name = system_name(host, player).await;
        for recipient in recipients {
            host.send(recipient, &format!("<{name}> {message}")).await;
        }
    }
}

async fn system_name(host: &Arc<ConsoleHost>, player: PlayerId) -> String {
    host.display_name(player)
        .await
        .unwrap_or_else(|| player.to_string())
}
