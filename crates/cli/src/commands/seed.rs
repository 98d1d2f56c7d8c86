use chrono::Utc;
use docket_db::{AgendaRepository, DemoAgenda, RedisStore};

use crate::commands::{open_store, CommandResult};

pub fn run(clean: bool) -> CommandResult {
    let session = match open_store("seed") {
        Ok(session) => session,
        Err(result) => return result,
    };
    let result = session.runtime.block_on(seed(&session.repo, clean));

    match result {
        Ok(message) => CommandResult::success("seed", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

/// Error class, message and exit code of a failed run.
type Failure = (&'static str, String, u8);

async fn seed(repo: &AgendaRepository<RedisStore>, clean: bool) -> Result<String, Failure> {
    repo.ping().await.map_err(|error| ("store_connectivity", error.to_string(), 4u8))?;

    if clean {
        DemoAgenda::clean(repo).await.map_err(|error| ("seed_clean", error.to_string(), 5u8))?;
        return Ok("demo agenda items removed".to_string());
    }

    let seeded = DemoAgenda::load(repo, Utc::now())
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
    let verification = DemoAgenda::verify(repo)
        .await
        .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

    if !verification.all_present {
        let failed = failed_checks(&verification.checks);
        return Err(("seed_verification", verification_message(&failed), 6u8));
    }

    Ok(seed_message(&seeded.items_seeded, &seeded.items_skipped))
}

fn failed_checks<'a>(checks: &[(&'a str, bool)]) -> Vec<&'a str> {
    checks.iter().filter_map(|(name, present)| (!present).then_some(*name)).collect()
}

fn verification_message(failed: &[&str]) -> String {
    if failed.is_empty() {
        "Some demo items failed to load".to_string()
    } else {
        format!("Demo agenda missing items: {}", failed.join(", "))
    }
}

fn seed_message(seeded: &[&str], skipped: &[&str]) -> String {
    let mut lines = vec![format!(
        "demo agenda ready ({} added, {} already present):",
        seeded.len(),
        skipped.len()
    )];
    lines.extend(DemoAgenda::EXPECTED_ORDER.iter().map(|name| format!("  - {name}")));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{failed_checks, seed_message, verification_message};

    #[test]
    fn verification_message_names_missing_items() {
        let checks = [("Release checklist", true), ("Incident review", false), ("Team lunch", false)];

        assert_eq!(
            verification_message(&failed_checks(&checks)),
            "Demo agenda missing items: Incident review, Team lunch"
        );
    }

    #[test]
    fn verification_message_falls_back_when_nothing_is_named() {
        assert_eq!(verification_message(&[]), "Some demo items failed to load");
    }

    #[test]
    fn seed_message_lists_items_in_display_order() {
        let message = seed_message(&["Team lunch"], &["Release checklist"]);

        assert!(message.starts_with("demo agenda ready (1 added, 1 already present):"));
        assert!(message.ends_with("  - Onboarding docs\n  - Team lunch"));
    }
}
