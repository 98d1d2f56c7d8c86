use docket_core::render::{render_agenda, AgendaView};

use crate::commands::{open_store, CommandResult};

pub fn run(unsorted: bool) -> CommandResult {
    let session = match open_store("list") {
        Ok(session) => session,
        Err(result) => return result,
    };

    let items = match session.runtime.block_on(session.repo.list(!unsorted)) {
        Ok(items) => items,
        Err(error) => {
            return CommandResult::failure("list", error.kind(), format!("listing failed: {error}"), 4)
        }
    };

    match render_agenda(&items) {
        Ok(view) => CommandResult::success("list", render_text(&view)),
        Err(error) => CommandResult::failure("list", error.kind(), format!("listing failed: {error}"), 5),
    }
}

fn render_text(view: &AgendaView) -> String {
    std::iter::once(view.header.clone())
        .chain(view.entries.iter().map(|entry| entry.text.clone()))
        .collect::<Vec<_>>()
        .join("\n")
}
