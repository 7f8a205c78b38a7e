use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use rvoip_session_arbiter::{CoordinatorSnapshot, EventPriority, SessionId, SessionRole, StatusEvent};

pub fn status_line(event: &StatusEvent) -> String {
    let time = event.timestamp.format("%H:%M:%S%.3f").to_string();
    let line = event.to_string();
    let line = match event.priority {
        EventPriority::Low => line.dimmed(),
        EventPriority::Normal => line.normal(),
        EventPriority::High => line.yellow(),
        EventPriority::Critical => line.red().bold(),
    };
    format!("{} {}", time.dimmed(), line)
}

#[derive(Tabled)]
struct SessionRow {
    session: String,
    role: String,
    state: String,
    slot: String,
    peer: String,
    alive: bool,
}

pub fn snapshot_table(snapshot: &CoordinatorSnapshot) -> String {
    let arbiter = &snapshot.arbiter;
    let slot_or_dash = |id: Option<&SessionId>| {
        id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
    };

    let mut out = format!(
        "registration: {}\ncurrent: {}  incoming: {}  outgoing: {}\nlocal: {}  remote: {}\n",
        snapshot.registration.state,
        slot_or_dash(arbiter.slots.current()),
        slot_or_dash(arbiter.slots.candidate(SessionRole::Incoming)),
        slot_or_dash(arbiter.slots.candidate(SessionRole::Outgoing)),
        arbiter.local_source.as_ref().map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
        arbiter.remote_source.as_ref().map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
    );

    if !arbiter.sessions.is_empty() {
        let rows = arbiter.sessions.iter().map(|s| SessionRow {
            session: s.session_id.to_string(),
            role: s.role.to_string(),
            state: s.state.to_string(),
            slot: s.slot.map(|slot| format!("{:?}", slot)).unwrap_or_else(|| "-".into()),
            peer: s.peer.as_ref().map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
            alive: s.alive,
        });
        out.push_str(&Table::new(rows).with(Style::rounded()).to_string());
        out.push('\n');
    }
    out
}
