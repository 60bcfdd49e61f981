//! Handlers for the activation-core CLI's operational commands.
//!
//! A thin layer over the library's public API — not part of the activation
//! core's specified contract, just a convenience surface over it.

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};

use crate::services::{BotLifecycleManager, EventBus};

pub async fn bots_list(lifecycle: &BotLifecycleManager) {
    let mut states = lifecycle.get_all_states().await;
    states.sort_by(|a, b| a.name.cmp(&b.name));

    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(["NAME", "STATUS", "RUNS TODAY", "COOLDOWN UNTIL"].map(Cell::new));

    for state in &states {
        table.add_row([
            Cell::new(&state.name),
            Cell::new(format!("{:?}", state.status)).set_alignment(CellAlignment::Left),
            Cell::new(state.runs_today),
            Cell::new(
                state
                    .cooldown_until
                    .map_or_else(|| "-".to_string(), |t| t.to_rfc3339()),
            ),
        ]);
    }
    println!("{table}");
}

pub async fn bots_show(lifecycle: &BotLifecycleManager, name: &str) {
    match lifecycle.get_bot_state(name).await {
        Some(state) => {
            println!("name:              {}", state.name);
            println!("status:            {:?}", state.status);
            println!("enabled:           {}", state.enabled);
            println!("runs_today:        {}", state.runs_today);
            println!("total_runs:        {}", state.total_runs);
            println!(
                "last_run_at:       {}",
                state.last_run_at.map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
            );
            println!(
                "cooldown_until:    {}",
                state.cooldown_until.map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
            );
            println!(
                "last_activated_by: {}",
                state.last_activated_by.as_deref().unwrap_or("-")
            );
        }
        None => eprintln!("unknown bot: {name}"),
    }
}

pub async fn events_tail(bus: &EventBus, json: bool, count: usize) {
    let mut sub = bus.subscribe(None, true).await;
    let mut seen = 0usize;
    while let Some(event) = sub.recv().await {
        if json {
            println!("{}", serde_json::to_string(&event).unwrap_or_default());
        } else {
            println!(
                "[{}] #{} {} source={}",
                event.timestamp.to_rfc3339(),
                event.event_id,
                event.event_type,
                event.source
            );
        }
        seen += 1;
        if count != 0 && seen >= count {
            break;
        }
    }
}

pub async fn run_bot(lifecycle: &BotLifecycleManager, bot: &str) {
    match lifecycle.start_bot(bot, "manual:cli", None).await {
        Ok(()) => println!("started {bot}"),
        Err(err) => eprintln!("could not start {bot}: {err}"),
    }
}
